use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use crate::sessions::UserId;

/// MIME type of every delivered document.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Identifier of a message sent through a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A text message received from a channel.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Stable identity of the sender; sessions are keyed by it.
    pub user: UserId,
    /// Where replies go (the chat the message came from).
    pub chat_id: String,
    pub message_id: Option<MessageId>,
    pub text: String,
    pub channel: String,
    pub received_at: DateTime<Utc>,
}

/// A file attachment to deliver.
#[derive(Debug, Clone)]
pub struct OutboundDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub caption: Option<String>,
}

impl OutboundDocument {
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            mime_type: PDF_MIME_TYPE,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Core channel trait; implement for any messaging platform
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name
    fn name(&self) -> &str;

    /// Send a plain-text message, returning its id.
    async fn send_text(&self, chat_id: &str, text: &str) -> anyhow::Result<MessageId>;

    /// Send a file attachment.
    async fn send_document(&self, chat_id: &str, document: OutboundDocument)
        -> anyhow::Result<()>;

    /// Delete a message previously sent by the bot.
    async fn delete_message(&self, chat_id: &str, message: &MessageId) -> anyhow::Result<()>;

    /// Start listening for incoming messages (long-running)
    async fn listen(&self, tx: tokio::sync::mpsc::Sender<InboundEvent>) -> anyhow::Result<()>;

    /// Check if channel is healthy
    async fn health_check(&self) -> bool {
        true
    }
}
