//! Backend bridge for the Marina relay.
//!
//! Handles the message flow for one update:
//! 1. Resolve the backend session id for the sender
//! 2. POST `{message, session_id}` to the hosted backend `/chat` endpoint
//! 3. Read the `response` field, substituting a fixed line when it is absent
//!
//! Every failure on this path is absorbed into a fixed apology line; a user
//! never sees a raw error and the relay loop never stops because of one
//! message.

use crate::session::SessionStore;
use marina_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Reply used when the backend answers without a `response` field.
pub const MISSING_REPLY: &str = "Îmi pare rău, nu am putut procesa mesajul.";

/// Reply used when the backend call fails entirely.
pub const ERROR_REPLY: &str =
    "Îmi pare rău, am întâmpinat o eroare. Te rog încearcă din nou. 🙏";

// ============================================================================
// Backend API Types
// ============================================================================

/// Request to the backend chat API.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// User message content
    pub message: String,
    /// Conversation identity, stable per Telegram user
    pub session_id: String,
}

/// Response from the backend chat API.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    /// Assistant reply text. The backend may omit it.
    #[serde(default)]
    pub response: Option<String>,
}

// ============================================================================
// Retry policy
// ============================================================================

/// How many times one message is attempted against the backend.
///
/// The default is a single attempt: the backend keeps its own conversation
/// state per session, and a blind retry after an ambiguous failure could
/// feed it the same message twice.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Base delay between attempts. Grows linearly with the attempt number.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(1000),
        }
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// Bridge between the Telegram relay and the hosted conversational backend.
pub struct BackendBridge {
    /// HTTP client for API calls
    client: reqwest::Client,
    /// Backend base URL
    base_url: String,
    /// Per-request timeout
    timeout: Duration,
    /// Attempt budget per message
    retry: RetryPolicy,
    /// User id to session id map
    sessions: Arc<SessionStore>,
}

impl BackendBridge {
    /// Create a new bridge.
    pub fn new(base_url: impl Into<String>, sessions: Arc<SessionStore>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            sessions,
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Relay one user message and return the text to send back.
    ///
    /// This is the main entry point for the bridge. It always returns a
    /// sendable reply; failures are logged and replaced with [`ERROR_REPLY`].
    pub async fn handle_incoming(&self, user_id: i64, text: &str) -> String {
        let session_id = self.sessions.get_or_create(user_id);

        match self.call_backend(&session_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, user_id, "Backend call failed");
                ERROR_REPLY.to_string()
            }
        }
    }

    /// Call the backend, retrying per the configured policy.
    async fn call_backend(&self, session_id: &str, text: &str) -> Result<String> {
        let request = ChatRequest {
            message: text.to_string(),
            session_id: session_id.to_string(),
        };
        let budget = self.retry.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_chat(&request).await {
                Ok(reply) => return Ok(reply),
                Err(e) if attempt < budget => {
                    tracing::warn!(error = %e, attempt, "Backend call failed, retrying");
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One POST to the backend chat endpoint.
    async fn send_chat(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat", self.base_url);

        tracing::debug!(
            endpoint = %url,
            session_id = %request.session_id,
            "Calling chat backend"
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "backend returned {status}: {error_text}"
            )));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;

        Ok(reply.response.unwrap_or_else(|| MISSING_REPLY.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
