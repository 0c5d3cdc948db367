// src/notify/discord.rs
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChannelId, ChannelTransport, TransportError};

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Posts messages to Discord channels through the bot REST API.
/// One HTTP attempt per `send`; retries belong to the dispatcher.
#[derive(Clone)]
pub struct DiscordTransport {
    token: String,
    api_base: String,
    client: Client,
    timeout: Duration,
}

impl DiscordTransport {
    pub fn new(token: String) -> Self {
        Self {
            token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Point at a different API root (proxies, local test servers).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self, channel: &ChannelId) -> String {
        format!("{}/channels/{}/messages", self.api_base, channel)
    }
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
}

fn retry_after_header(rsp: &reqwest::Response) -> Option<Duration> {
    ["Retry-After", "X-RateLimit-Reset-After"]
        .iter()
        .find_map(|h| rsp.headers().get(*h)?.to_str().ok()?.parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

fn classify(status: StatusCode, body: &str) -> TransportError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            TransportError::Rejected(format!("{status}: {body}"))
        }
        _ => TransportError::Transient(format!("{status}: {body}")),
    }
}

#[async_trait::async_trait]
impl ChannelTransport for DiscordTransport {
    async fn send(&self, text: &str, channel: &ChannelId) -> Result<(), TransportError> {
        let rsp = self
            .client
            .post(self.messages_url(channel))
            .timeout(self.timeout)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&CreateMessage { content: text })
            .send()
            .await
            .map_err(|e| TransportError::Transient(format!("discord request failed: {e}")))?;

        let status = rsp.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let header = retry_after_header(&rsp);
            let body = rsp.json::<RateLimitBody>().await.ok();
            let retry_after = header.or_else(|| {
                body.and_then(|b| b.retry_after)
                    .filter(|s| s.is_finite() && *s >= 0.0)
                    .map(Duration::from_secs_f64)
            });
            return Err(TransportError::RateLimited { retry_after });
        }

        let body = rsp.text().await.unwrap_or_default();
        Err(classify(status, body.trim()))
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_and_missing_channel_are_permanent() {
        assert!(classify(StatusCode::FORBIDDEN, "").is_permanent());
        assert!(classify(StatusCode::NOT_FOUND, "Unknown Channel").is_permanent());
        assert!(classify(StatusCode::UNAUTHORIZED, "").is_permanent());
        assert!(!classify(StatusCode::BAD_GATEWAY, "").is_permanent());
    }

    #[test]
    fn url_is_built_from_base_and_channel() {
        let t = DiscordTransport::new("tok".into()).with_api_base("http://localhost:8080/api/");
        assert_eq!(
            t.messages_url(&ChannelId::new("123")),
            "http://localhost:8080/api/channels/123/messages"
        );
    }
}
