//! Chat transport: where updates come from and replies go to.

pub mod recording;
pub mod telegram;

use crate::models::UserIdentity;
use async_trait::async_trait;
use thiserror::Error;

pub use recording::RecordingTransport;
pub use telegram::TelegramTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Chat API rejected the call ({status}): {description}")]
    Api { status: u16, description: String },

    #[error("Malformed chat API response: {0}")]
    Malformed(String),
}

/// One inbound event. `message` is `None` for anything that is not a text
/// message; the update still counts for offset bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<InboundMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub user: UserIdentity,
    pub text: String,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Updates with an id of at least `offset`, blocking up to the transport's
    /// long-poll timeout when none are pending.
    async fn poll(&self, offset: i64) -> Result<Vec<Update>, TransportError>;

    async fn send(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;
}
