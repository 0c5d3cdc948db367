// src/notify/mod.rs
pub mod discord;
pub mod dispatcher;
pub mod format;
pub mod log;

use std::fmt;
use std::time::Duration;

pub use dispatcher::{ChannelHealth, ChannelOutcome, DeliveryPolicy, DeliveryReport, Dispatcher};
pub use format::format_message;

/// A configured notification destination (a Discord channel snowflake).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network error, 5xx, timeout. Worth retrying.
    #[error("transient send failure: {0}")]
    Transient(String),

    /// The endpoint asked us to slow down.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Will not succeed on retry (missing permission, unknown channel).
    #[error("rejected by endpoint: {0}")]
    Rejected(String),
}

impl TransportError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// `send(text, channel_id) -> ok|error`: the only thing the pipeline needs
/// from a chat backend.
#[async_trait::async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn send(&self, text: &str, channel: &ChannelId) -> Result<(), TransportError>;

    /// Longest message the backend accepts, in characters.
    fn max_message_len(&self) -> usize {
        2000
    }

    fn name(&self) -> &'static str;
}
