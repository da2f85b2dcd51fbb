//! Marina Bot - Telegram relay for the Marina assistant.
//!
//! The bot long-polls Telegram for updates, forwards each text message to the
//! hosted conversational backend, and sends the backend's reply back to the
//! chat. Conversation context lives entirely in the backend, keyed by a
//! session id derived from the Telegram user id.
//!
//! ```text
//! User → Telegram → marina-bot → backend /chat
//! User ←── sendMessage ←── reply ←──┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod bridge;
pub mod session;
pub mod telegram;

// Re-export commonly used types
pub use bridge::{BackendBridge, ChatReply, ChatRequest, RetryPolicy, ERROR_REPLY, MISSING_REPLY};
pub use session::SessionStore;
pub use telegram::{IncomingMessage, TelegramChannel};

use marina_common::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Greeting sent in reply to /start.
pub const GREETING: &str = "Bună! 👋 Sunt asistentul virtual al Dr. Marina Cociug.\n\nTe pot ajuta cu informații despre:\n• Alăptare\n• Diversificare\n• Înțărcare\n\nScrie-mi întrebarea ta! 😊";

/// Run the relay until the listen loop fails or a shutdown signal arrives.
pub async fn start_relay(config: &Config) -> anyhow::Result<()> {
    if config.telegram.bot_token.is_empty() {
        anyhow::bail!(
            "telegram.bot_token is not configured (set TELEGRAM_TOKEN or edit {})",
            marina_common::config::config_path().display()
        );
    }

    let channel = Arc::new(TelegramChannel::new(config.telegram.bot_token.clone()));
    channel.init().await?;

    let sessions = Arc::new(SessionStore::new(
        config.sessions.capacity,
        Duration::from_secs(config.sessions.ttl_secs),
    ));

    let bridge = Arc::new(
        BackendBridge::new(config.backend.base_url.clone(), sessions.clone())
            .with_timeout(Duration::from_secs(config.backend.timeout_secs))
            .with_retry(RetryPolicy {
                max_attempts: config.backend.max_attempts,
                backoff: Duration::from_millis(config.backend.backoff_ms),
            }),
    );

    let (tx, rx) = mpsc::channel::<IncomingMessage>(64);

    // Spawn the message processor
    let processor_handle = spawn_processor(channel.clone(), bridge, rx);

    // Spawn cleanup task for expired sessions
    let cleanup_sessions = sessions.clone();
    let cleanup_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));

        loop {
            interval.tick().await;
            let removed = cleanup_sessions.cleanup_expired();
            if removed > 0 {
                tracing::debug!(removed, "Expired sessions dropped");
            }
        }
    });

    tracing::info!(backend = %config.backend.base_url, "Starting Marina relay");

    let result = tokio::select! {
        result = channel.listen(move |message| {
            if tx.try_send(message).is_err() {
                tracing::warn!("Message queue full, dropping update");
            }
        }) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    };

    // Clean up on shutdown
    cleanup_handle.abort();
    processor_handle.abort();

    result
}

/// Start a background processor that answers messages from the queue.
pub fn spawn_processor(
    channel: Arc<TelegramChannel>,
    bridge: Arc<BackendBridge>,
    mut rx: mpsc::Receiver<IncomingMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Relay processor started");

        while let Some(message) = rx.recv().await {
            let channel = channel.clone();
            let bridge = bridge.clone();

            // Answer each message in its own task
            tokio::spawn(async move {
                handle_message(channel, bridge, message).await;
            });
        }

        tracing::info!("Relay processor stopped");
    })
}

/// Answer one incoming message.
async fn handle_message(
    channel: Arc<TelegramChannel>,
    bridge: Arc<BackendBridge>,
    message: IncomingMessage,
) {
    if telegram::is_start_command(&message.text) {
        if let Err(e) = channel.send_message(message.chat_id, GREETING).await {
            tracing::error!(error = %e, chat_id = message.chat_id, "Failed to send greeting");
        }
        return;
    }

    // Only /start is handled; other commands never reach the backend.
    if telegram::is_command(&message.text) {
        tracing::debug!(text = %message.text, "Ignoring unsupported command");
        return;
    }

    // Typing indicator is best effort and must not delay the reply path.
    let typing_channel = channel.clone();
    let typing_chat = message.chat_id;
    tokio::spawn(async move {
        if let Err(e) = typing_channel.send_typing(typing_chat).await {
            tracing::debug!(error = %e, "Typing indicator failed");
        }
    });

    let reply = bridge.handle_incoming(message.user_id, &message.text).await;

    if let Err(e) = channel.send_message(message.chat_id, &reply).await {
        tracing::error!(error = %e, chat_id = message.chat_id, "Failed to send reply");
    }
}
