// tests/common/mod.rs
#![allow(dead_code)]

use chrono::{DateTime, Days, Utc};
use listings_notifier::notify::{ChannelId, ChannelTransport, DeliveryPolicy, Dispatcher, TransportError};
use listings_notifier::store::SnapshotStore;
use listings_notifier::sync::FileSource;
use listings_notifier::{Watcher, WatcherSettings};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Records every send; channels in `failing` always fail transiently.
#[derive(Default)]
pub struct MockTransport {
    pub sent: Mutex<Vec<(String, String)>>,
    pub failing: Mutex<HashSet<String>>,
    /// Cancel this token once `cancel_after` successful sends happened.
    pub cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl MockTransport {
    pub fn fail(&self, channel: &str) {
        self.failing.lock().insert(channel.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }

    pub fn sent_to(&self, channel: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn total_sent(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait::async_trait]
impl ChannelTransport for MockTransport {
    async fn send(&self, text: &str, channel: &ChannelId) -> Result<(), TransportError> {
        if self.failing.lock().contains(channel.as_str()) {
            return Err(TransportError::Transient("mock outage".into()));
        }
        let n = {
            let mut sent = self.sent.lock();
            sent.push((channel.as_str().to_string(), text.to_string()));
            sent.len()
        };
        if let Some((after, token)) = self.cancel_after.lock().as_ref() {
            if n >= *after {
                token.cancel();
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub fn fast_policy() -> DeliveryPolicy {
    DeliveryPolicy {
        max_retries: 1,
        failure_threshold: 3,
        retry_base_delay: std::time::Duration::ZERO,
        send_interval: std::time::Duration::ZERO,
    }
}

pub fn posted_days_ago(now: DateTime<Utc>, days: u64) -> i64 {
    now.checked_sub_days(Days::new(days)).unwrap().timestamp()
}

pub fn entry(company: &str, title: &str, date_posted: i64) -> serde_json::Value {
    serde_json::json!({
        "company_name": company,
        "title": title,
        "locations": ["Remote"],
        "date_posted": date_posted,
        "is_visible": true,
        "active": true,
        "url": format!("https://jobs.example/{}", company.to_lowercase()),
        "terms": ["Summer 2026"],
        "sponsorship": "Other"
    })
}

pub fn write_listings(path: &Path, entries: &[serde_json::Value]) {
    std::fs::write(path, serde_json::to_vec_pretty(entries).unwrap()).unwrap();
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub transport: Arc<MockTransport>,
    pub channels: Vec<ChannelId>,
}

impl Harness {
    pub fn new(channels: &[&str]) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            transport: Arc::new(MockTransport::default()),
            channels: channels.iter().map(|c| ChannelId::new(*c)).collect(),
        }
    }

    pub fn listings_path(&self) -> PathBuf {
        self.dir.path().join("listings.json")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// A fresh watcher over the same files, as after a process restart.
    pub fn watcher(&self, seed_on_first_run: bool) -> Watcher {
        Watcher::new(
            Box::new(FileSource::new(self.listings_path())),
            SnapshotStore::open(self.state_dir()).unwrap(),
            Dispatcher::new(self.transport.clone(), self.channels.clone(), fast_policy()),
            WatcherSettings {
                recency_window_days: 5,
                seed_on_first_run,
            },
        )
        .unwrap()
    }
}
