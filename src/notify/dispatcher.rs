// src/notify/dispatcher.rs
//! # Delivery Engine
//! Sends one formatted message to every configured channel, one channel at a
//! time, with bounded retries, per-channel health tracking and a global
//! minimum gap between sends.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::format::truncate_chars;
use super::{ChannelId, ChannelTransport, TransportError};
use crate::listing::ListingKey;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Extra attempts after the first one fails.
    pub max_retries: u32,
    /// Consecutive failed entries before a channel is disabled for the cycle.
    pub failure_threshold: u32,
    /// First retry delay; doubles on each further attempt.
    pub retry_base_delay: Duration,
    /// Minimum gap between any two sends.
    pub send_interval: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            failure_threshold: 3,
            retry_base_delay: Duration::from_millis(500),
            send_interval: Duration::from_secs(1),
        }
    }
}

impl DeliveryPolicy {
    fn retry_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.retry_base_delay
            .saturating_mul(1u32 << shift)
            .min(MAX_RETRY_DELAY)
    }
}

/// In-memory only; resets on restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelHealth {
    pub consecutive_failures: u32,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32, error: String },
    /// Channel was disabled earlier in this cycle.
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub outcomes: Vec<(ChannelId, ChannelOutcome)>,
}

impl DeliveryReport {
    /// An entry counts as delivered once any channel accepted it.
    pub fn any_delivered(&self) -> bool {
        self.outcomes
            .iter()
            .any(|(_, o)| matches!(o, ChannelOutcome::Delivered { .. }))
    }

    pub fn outcome(&self, channel: &ChannelId) -> Option<&ChannelOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| c == channel)
            .map(|(_, o)| o)
    }
}

pub struct Dispatcher {
    transport: Arc<dyn ChannelTransport>,
    channels: Vec<(ChannelId, ChannelHealth)>,
    policy: DeliveryPolicy,
    last_send: Option<Instant>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        channels: impl IntoIterator<Item = ChannelId>,
        policy: DeliveryPolicy,
    ) -> Self {
        let mut list: Vec<(ChannelId, ChannelHealth)> = Vec::new();
        for id in channels {
            if !list.iter().any(|(c, _)| *c == id) {
                list.push((id, ChannelHealth::default()));
            }
        }
        Self {
            transport,
            channels: list,
            policy,
            last_send: None,
        }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    pub fn health(&self, channel: &ChannelId) -> Option<&ChannelHealth> {
        self.channels
            .iter()
            .find(|(c, _)| c == channel)
            .map(|(_, h)| h)
    }

    pub fn channels(&self) -> impl Iterator<Item = (&ChannelId, &ChannelHealth)> {
        self.channels.iter().map(|(c, h)| (c, h))
    }

    pub fn all_disabled(&self) -> bool {
        self.channels.iter().all(|(_, h)| h.disabled)
    }

    /// Re-enable channels disabled during the previous cycle. Failure counts
    /// are kept, so a still-broken channel is disabled again quickly.
    pub fn begin_cycle(&mut self) {
        for (id, health) in self.channels.iter_mut() {
            if health.disabled {
                tracing::info!(channel = %id, failures = health.consecutive_failures, "re-enabling channel");
                health.disabled = false;
            }
        }
    }

    /// Send `text` to every enabled channel. Mutates channel health only;
    /// recording the key as delivered is up to the caller.
    pub async fn deliver(&mut self, text: &str, key: &ListingKey) -> DeliveryReport {
        let text = truncate_chars(text, self.transport.max_message_len());
        let mut report = DeliveryReport::default();

        for idx in 0..self.channels.len() {
            let channel = self.channels[idx].0.clone();
            if self.channels[idx].1.disabled {
                tracing::debug!(%channel, %key, "skipping disabled channel");
                report.outcomes.push((channel, ChannelOutcome::Skipped));
                continue;
            }

            let outcome = self.send_with_retry(&text, &channel, key).await;
            self.update_health(idx, &outcome);
            report.outcomes.push((channel, outcome_summary(outcome)));
        }

        report
    }

    async fn send_with_retry(
        &mut self,
        text: &str,
        channel: &ChannelId,
        key: &ListingKey,
    ) -> Attempted {
        let max_attempts = self.policy.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.pace().await;
            let res = self.transport.send(text, channel).await;
            self.last_send = Some(Instant::now());

            let err = match res {
                Ok(()) => {
                    tracing::debug!(%channel, %key, attempt, "sent");
                    return Attempted::Ok { attempts: attempt };
                }
                Err(e) => e,
            };

            if err.is_permanent() {
                tracing::error!(%channel, %key, attempt, error = %err, "channel rejected message");
                return Attempted::Permanent {
                    attempts: attempt,
                    error: err,
                };
            }
            if attempt >= max_attempts {
                tracing::warn!(%channel, %key, attempt, error = %err, "giving up on channel for this entry");
                return Attempted::Exhausted {
                    attempts: attempt,
                    error: err,
                };
            }

            let delay = match &err {
                TransportError::RateLimited {
                    retry_after: Some(d),
                } => (*d).min(MAX_RETRY_DELAY),
                _ => self.policy.retry_delay(attempt),
            };
            tracing::warn!(%channel, %key, attempt, error = %err, ?delay, "send failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }

    async fn pace(&self) {
        if let Some(last) = self.last_send {
            match last.checked_add(self.policy.send_interval) {
                Some(at) => tokio::time::sleep_until(at).await,
                None => tokio::time::sleep(self.policy.send_interval).await,
            }
        }
    }

    fn update_health(&mut self, idx: usize, outcome: &Attempted) {
        let threshold = self.policy.failure_threshold.max(1);
        let (id, health) = &mut self.channels[idx];
        match outcome {
            Attempted::Ok { .. } => health.consecutive_failures = 0,
            Attempted::Exhausted { .. } => {
                health.consecutive_failures += 1;
                if health.consecutive_failures >= threshold && !health.disabled {
                    tracing::warn!(channel = %id, failures = health.consecutive_failures, "disabling channel until next cycle");
                    health.disabled = true;
                    counter!("notifier_channel_disabled_total").increment(1);
                }
            }
            Attempted::Permanent { .. } => {
                health.consecutive_failures += 1;
                if !health.disabled {
                    tracing::warn!(channel = %id, "disabling channel until next cycle");
                    health.disabled = true;
                    counter!("notifier_channel_disabled_total").increment(1);
                }
            }
        }
    }
}

enum Attempted {
    Ok { attempts: u32 },
    Exhausted { attempts: u32, error: TransportError },
    Permanent { attempts: u32, error: TransportError },
}

fn outcome_summary(a: Attempted) -> ChannelOutcome {
    match a {
        Attempted::Ok { attempts } => ChannelOutcome::Delivered { attempts },
        Attempted::Exhausted { attempts, error } | Attempted::Permanent { attempts, error } => {
            ChannelOutcome::Failed {
                attempts,
                error: error.to_string(),
            }
        }
    }
}
