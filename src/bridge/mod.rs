//! Human-in-the-loop chat channel.
//!
//! `CommunicationBridge` sends notifications and blocks the calling task until the
//! operator replies. The wire protocol sits behind the `Transport` trait so the
//! orchestrator can be driven by a scripted transport in tests.
//!
//! Reply correlation works on update ids: the latest id is captured as a baseline
//! *before* a prompt is sent, and only messages with a higher id from the configured
//! chat count as the answer.

pub mod command;
pub mod messages;
#[cfg(test)]
pub(crate) mod scripted;
pub mod telegram;

pub use command::{Command, parse_command};
pub use telegram::{RetryPolicy, TelegramTransport};

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Config;
use crate::errors::BridgeError;
use crate::util::truncate_chars;

/// Longest message the channel accepts from us, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// One inbound update from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub update_id: i64,
    pub chat_id: Option<String>,
    pub text: Option<String>,
}

/// Wire-level access to the chat service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `text` to `chat_id`.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), BridgeError>;

    /// Updates with id >= `offset` (all pending updates when `None`), in channel order.
    async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<InboundMessage>, BridgeError>;

    /// Highest update id currently visible, if any.
    async fn latest_update_id(&self) -> Result<Option<i64>, BridgeError> {
        let updates = self.get_updates(None).await?;
        Ok(updates.iter().map(|u| u.update_id).max())
    }
}

/// Outbound notifications plus blocking reply waits for a single chat.
pub struct CommunicationBridge {
    transport: Arc<dyn Transport>,
    chat_id: String,
    poll_interval: Duration,
    last_update_id: AtomicI64,
}

impl std::fmt::Debug for CommunicationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommunicationBridge")
            .field("chat_id", &self.chat_id)
            .field("poll_interval", &self.poll_interval)
            .field("last_update_id", &self.last_update_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl CommunicationBridge {
    pub fn new(transport: Arc<dyn Transport>, chat_id: &str, poll_interval: Duration) -> Self {
        Self {
            transport,
            chat_id: chat_id.to_string(),
            poll_interval,
            last_update_id: AtomicI64::new(0),
        }
    }

    /// Bridge over the Telegram transport using the configured credentials.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let credentials = config
            .credentials
            .as_ref()
            .ok_or(BridgeError::MissingCredentials)?;
        let transport = TelegramTransport::new(&config.api_base, credentials)?;
        Ok(Self::new(
            Arc::new(transport),
            &credentials.chat_id,
            config.poll_interval,
        ))
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Send a notification. Text longer than the channel limit is cut with `...`.
    /// Returns false (and logs) on failure; never waits for a reply.
    pub async fn send_message(&self, text: &str) -> bool {
        let text = messages::truncate_markup(text, MAX_MESSAGE_CHARS, "...");
        match self.transport.send_message(&self.chat_id, &text).await {
            Ok(()) => {
                tracing::debug!(chars = text.chars().count(), "Message sent");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send message");
                false
            }
        }
    }

    /// Refresh the baseline from the channel, keeping the last known id on failure.
    async fn capture_baseline(&self) -> i64 {
        match self.transport.latest_update_id().await {
            Ok(Some(id)) => {
                self.last_update_id.fetch_max(id, Ordering::SeqCst);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read latest update id"),
        }
        self.last_update_id.load(Ordering::SeqCst)
    }

    /// Send `prompt` and wait for the first reply from our chat that arrives after it.
    ///
    /// Fails with `BridgeError::SendFailed` if the prompt cannot be delivered and
    /// `BridgeError::Timeout` when nothing qualifying arrives within `timeout`.
    /// Transport errors that survive the transport's own retries are returned as is.
    pub async fn request_reply(&self, prompt: &str, timeout: Duration) -> Result<String, BridgeError> {
        let baseline = self.capture_baseline().await;
        tracing::debug!(baseline, "Captured reply baseline");

        if !self.send_message(prompt).await {
            return Err(BridgeError::SendFailed);
        }

        let minutes = timeout.as_secs() / 60;
        tracing::info!(timeout_minutes = minutes, "Waiting for operator reply");
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            let cursor = self.last_update_id.load(Ordering::SeqCst);
            let offset = (cursor > 0).then_some(cursor + 1);
            match self.transport.get_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        if update.update_id <= baseline {
                            continue;
                        }
                        self.last_update_id.fetch_max(update.update_id, Ordering::SeqCst);
                        if update.chat_id.as_deref() != Some(self.chat_id.as_str()) {
                            continue;
                        }
                        if let Some(text) = update.text {
                            tracing::info!(
                                reply = %truncate_chars(&text, 50, "..."),
                                "Received operator reply"
                            );
                            return Ok(text);
                        }
                    }
                }
                Err(BridgeError::Api { description }) => {
                    tracing::warn!(%description, "Chat API error while polling");
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(BridgeError::Timeout { minutes })
    }
}
