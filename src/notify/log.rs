// src/notify/log.rs
use super::{ChannelId, ChannelTransport, TransportError};

/// Dry-run transport: logs each message instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait::async_trait]
impl ChannelTransport for LogTransport {
    async fn send(&self, text: &str, channel: &ChannelId) -> Result<(), TransportError> {
        tracing::info!(target: "dry_run", %channel, chars = text.chars().count(), "\n{text}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
