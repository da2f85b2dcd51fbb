//! Anthropic (Claude) Messages API client.

use marina_common::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Anthropic API client.
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    /// Create a new client against the official endpoint.
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.anthropic.com", model)
    }

    /// Create with custom base URL.
    pub fn with_base_url(
        api_key: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request a completion for the given turns.
    ///
    /// Returns the first `text` content block of the reply.
    pub async fn complete(
        &self,
        system: Option<&str>,
        turns: &[Turn],
        max_tokens: i64,
    ) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);

        let request = MessagesRequest {
            model: self.model.clone(),
            messages: turns
                .iter()
                .map(|t| WireMessage {
                    role: t.role.as_str().to_string(),
                    content: t.content.clone(),
                })
                .collect(),
            max_tokens,
            system: system.map(str::to_string),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Request failed: {e}")))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status.as_u16(), body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("Failed to parse response: {e}")))?;

        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = ?parsed.stop_reason,
                "Completion received"
            );
        }

        parsed
            .content
            .iter()
            .find(|block| block.content_type == "text")
            .map(|block| block.text.clone())
            .ok_or_else(|| Error::MalformedResponse("No text block in response".into()))
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: i64,
    output_tokens: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![WireMessage {
                role: "user".into(),
                content: "Salut".into(),
            }],
            max_tokens: 500,
            system: Some("Fii prietenos".into()),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("claude-sonnet-4-20250514"));
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("Fii prietenos"));
    }

    #[test]
    fn test_request_skips_absent_system() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![],
            max_tokens: 100,
            system: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("system"));
    }

    #[test]
    fn test_response_first_text_block() {
        let json = r#"{
            "content": [
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "primul"},
                {"type": "text", "text": "al doilea"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;

        let parsed: MessagesResponse = serde_json::from_str(json).unwrap();
        let first = parsed
            .content
            .iter()
            .find(|block| block.content_type == "text")
            .map(|block| block.text.clone());
        assert_eq!(first.as_deref(), Some("primul"));
    }

    #[test]
    fn test_response_tolerates_missing_usage() {
        let json = r#"{"content": [{"type": "text", "text": "ok"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.usage.is_none());
        assert_eq!(parsed.content.len(), 1);
    }

    #[test]
    fn test_turn_constructors() {
        let turn = Turn::user("întrebare");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.role.as_str(), "user");
        assert_eq!(Turn::assistant("răspuns").role.as_str(), "assistant");
    }
}
