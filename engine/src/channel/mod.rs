//! Outbound messaging
//!
//! Replies leave the engine through [`MessageChannel`]. Delivery is
//! fire-and-forget from the conversation's point of view: failures are logged
//! by the caller and never retried.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod webhook;
pub mod whatsapp;

pub use whatsapp::WhatsAppChannel;

/// Largest text body the WhatsApp Cloud API accepts
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Errors that can occur while delivering a message
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel is not configured: {0}")]
    NotConfigured(String),

    #[error("Delivery rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),
}

/// Transport that delivers text replies to a recipient
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), ChannelError>;
}

/// Truncate to at most `max_chars` characters, marking the cut
pub fn truncate_message(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let marker = "...";
    let keep = max_chars.saturating_sub(marker.chars().count());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(marker);
    truncated
}

/// One message captured by a [`RecordingChannel`]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SentMessage {
    pub recipient: String,
    pub text: String,
}

/// Channel that keeps every outbound message in memory.
///
/// Used by `nudge simulate`, the admin simulate route and the tests.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Texts sent to one recipient, in order
    pub async fn texts_for(&self, recipient: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.recipient == recipient)
            .map(|m| m.text.clone())
            .collect()
    }

    /// Drain captured messages
    pub async fn take(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.sent.lock().await)
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        self.sent.lock().await.push(SentMessage {
            recipient: recipient.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
