//! Telegram channel adapter.
//!
//! Long-polls the Bot API for updates and sends replies. Only plain text
//! messages are surfaced; stickers, photos, and other update kinds are
//! skipped at parse time.

use marina_common::{Error, Result};

/// Telegram's hard limit on message length.
const MAX_MESSAGE_LEN: usize = 4096;

/// A text message pulled from one `getUpdates` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Chat the reply must go to
    pub chat_id: i64,
    /// Sender identity, used for session derivation
    pub user_id: i64,
    /// Message text
    pub text: String,
}

/// Telegram channel - long-polls the Bot API for updates.
pub struct TelegramChannel {
    bot_token: String,
    base_url: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// Create a new Telegram channel.
    pub fn new(bot_token: String) -> Self {
        Self::with_base_url(bot_token, "https://api.telegram.org".to_string())
    }

    /// Create a channel that talks to `base_url` instead of the production API.
    pub fn with_base_url(bot_token: String, base_url: String) -> Self {
        Self {
            bot_token,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.bot_token)
    }

    /// Verify the bot token by calling getMe.
    pub async fn init(&self) -> Result<()> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("Invalid bot token: {err}")));
        }

        tracing::info!("Telegram channel initialized");
        Ok(())
    }

    /// Send a text reply, chunked to fit Telegram's message limit.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk
            });

            let resp = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await?;

            if !resp.status().is_success() {
                let error_text = resp.text().await.unwrap_or_default();
                anyhow::bail!("Telegram sendMessage failed: {error_text}");
            }
        }

        Ok(())
    }

    /// Show the "typing..." indicator in a chat.
    pub async fn send_typing(&self, chat_id: i64) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "action": "typing"
        });

        let resp = self
            .client
            .post(self.api_url("sendChatAction"))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram sendChatAction failed: {error_text}");
        }

        Ok(())
    }

    /// Poll for updates forever, invoking `callback` for each text message.
    ///
    /// Poll and decode failures are logged and retried after a short pause;
    /// this loop does not return under normal operation.
    pub async fn listen<F>(&self, callback: F) -> anyhow::Result<()>
    where
        F: Fn(IncomingMessage) + Send + Sync + 'static,
    {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages...");

        loop {
            let url = self.api_url("getUpdates");
            let body = serde_json::json!({
                "offset": offset,
                "timeout": 30,
                "allowed_updates": ["message"]
            });

            let resp = match self.client.post(&url).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            let data: serde_json::Value = match resp.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Telegram parse error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                        offset = uid + 1;
                    }

                    if let Some(message) = parse_update(update) {
                        tracing::info!(
                            chat_id = message.chat_id,
                            user_id = message.user_id,
                            "Telegram message received"
                        );
                        callback(message);
                    }
                }
            }
        }
    }
}

/// Extract a text message from one update, if it carries one.
pub fn parse_update(update: &serde_json::Value) -> Option<IncomingMessage> {
    let message = update.get("message")?;

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)?;

    let user_id = message
        .get("from")
        .and_then(|f| f.get("id"))
        .and_then(serde_json::Value::as_i64)?;

    let text = message.get("text").and_then(|t| t.as_str())?;
    if text.is_empty() {
        return None;
    }

    Some(IncomingMessage {
        chat_id,
        user_id,
        text: text.to_string(),
    })
}

/// True for the /start command, with or without a bot mention.
pub fn is_start_command(text: &str) -> bool {
    let text = text.trim();
    text == "/start" || text.starts_with("/start@")
}

/// True for any bot command.
pub fn is_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}

/// Split a message into chunks that fit within Telegram's limit.
///
/// Prefers paragraph, line, sentence, then word boundaries. Falls back to a
/// character boundary so multi-byte text never splits mid-character.
fn split_message(message: &str, max_len: usize) -> Vec<String> {
    if message.len() <= max_len {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut boundary = max_len;
        while !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }
        if boundary == 0 {
            boundary = remaining
                .chars()
                .next()
                .map_or(remaining.len(), char::len_utf8);
        }

        let window = &remaining[..boundary];
        let split_pos = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(". "))
            .or_else(|| window.rfind(' '))
            .unwrap_or(boundary);

        let actual_split = if split_pos == 0 { boundary } else { split_pos };

        chunks.push(remaining[..actual_split].to_string());
        remaining = remaining[actual_split..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telegram_api_url() {
        let ch = TelegramChannel::new("123:ABC".to_string());
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );

        let local =
            TelegramChannel::with_base_url("123:ABC".to_string(), "http://127.0.0.1:1".to_string());
        assert_eq!(local.api_url("getMe"), "http://127.0.0.1:1/bot123:ABC/getMe");
    }

    #[test]
    fn parse_update_extracts_text_message() {
        let update = serde_json::json!({
            "update_id": 10,
            "message": {
                "chat": {"id": 100},
                "from": {"id": 42, "username": "mama"},
                "text": "Bună!"
            }
        });

        let message = parse_update(&update).unwrap();
        assert_eq!(message.chat_id, 100);
        assert_eq!(message.user_id, 42);
        assert_eq!(message.text, "Bună!");
    }

    #[test]
    fn parse_update_skips_non_text() {
        let sticker = serde_json::json!({
            "update_id": 11,
            "message": {
                "chat": {"id": 100},
                "from": {"id": 42},
                "sticker": {"file_id": "abc"}
            }
        });
        assert!(parse_update(&sticker).is_none());

        let edited = serde_json::json!({
            "update_id": 12,
            "edited_message": {"chat": {"id": 100}}
        });
        assert!(parse_update(&edited).is_none());
    }

    #[test]
    fn parse_update_skips_empty_text() {
        let update = serde_json::json!({
            "message": {
                "chat": {"id": 1},
                "from": {"id": 2},
                "text": ""
            }
        });
        assert!(parse_update(&update).is_none());
    }

    #[test]
    fn start_command_detection() {
        assert!(is_start_command("/start"));
        assert!(is_start_command("  /start  "));
        assert!(is_start_command("/start@marina_bot"));
        assert!(!is_start_command("/stop"));
        assert!(!is_start_command("start"));
    }

    #[test]
    fn command_detection() {
        assert!(is_command("/help"));
        assert!(is_command("  /settings"));
        assert!(!is_command("Cum diversific?"));
    }

    #[test]
    fn split_message_short() {
        let chunks = split_message("short", 4096);
        assert_eq!(chunks, vec!["short".to_string()]);
    }

    #[test]
    fn split_message_long() {
        let text = format!("{}\n\n{}", "a".repeat(90), "b".repeat(90));
        let chunks = split_message(&text, 100);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(90));
        assert_eq!(chunks[1], "b".repeat(90));
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        // Multi-byte Romanian text must never split mid-character.
        let text = "ă".repeat(300);
        let chunks = split_message(&text, 100);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks.concat(), text);
    }
}
