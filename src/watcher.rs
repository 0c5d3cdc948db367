// src/watcher.rs
//! The long-lived context that owns everything one check cycle needs and runs
//! the cycle end to end: sync → parse → diff → select → deliver → commit.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;

use crate::diff::{diff, DiffStats};
use crate::listing::{ListingKey, Snapshot};
use crate::notify::{format_message, Dispatcher};
use crate::select::select;
use crate::store::SnapshotStore;
use crate::sync::ListingSource;

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("sync failed: {0:#}")]
    Sync(anyhow::Error),

    #[error("listings file is malformed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("state store: {0:#}")]
    Store(anyhow::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Sync said nothing changed and no earlier cycle was left unfinished.
    pub skipped: bool,
    pub stats: DiffStats,
    pub deliverable: usize,
    pub delivered: usize,
    /// Entries no channel accepted; retried next cycle.
    pub failed: usize,
    /// The previous snapshot was advanced to the current one.
    pub committed: bool,
    /// Stopped early because shutdown was requested.
    pub interrupted: bool,
    /// First run with seeding: snapshot committed without sending.
    pub seeded: bool,
}

#[derive(Debug, Clone)]
pub struct WatcherSettings {
    pub recency_window_days: u32,
    pub seed_on_first_run: bool,
}

pub struct Watcher {
    source: Box<dyn ListingSource>,
    store: SnapshotStore,
    dispatcher: Dispatcher,
    settings: WatcherSettings,
    previous: Snapshot,
    delivered: BTreeSet<ListingKey>,
    /// Fetched content exists that has not been fully processed yet.
    pending: bool,
}

impl Watcher {
    /// Load persisted state and build the context. A corrupt store is an
    /// error here rather than an empty snapshot, which would re-announce
    /// everything.
    pub fn new(
        source: Box<dyn ListingSource>,
        store: SnapshotStore,
        dispatcher: Dispatcher,
        settings: WatcherSettings,
    ) -> anyhow::Result<Self> {
        let state = store.load()?;
        let pending = match state.current.as_deref().map(Snapshot::parse) {
            Some(Ok(current)) => current != state.previous,
            Some(Err(_)) | None => false,
        };
        if pending {
            tracing::info!("unfinished cycle found in state, will re-process");
        }
        tracing::info!(
            previous = state.previous.len(),
            delivered = state.delivered.len(),
            "state loaded"
        );
        Ok(Self {
            source,
            store,
            dispatcher,
            settings,
            previous: state.previous,
            delivered: state.delivered,
            pending,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn delivered_keys(&self) -> &BTreeSet<ListingKey> {
        &self.delivered
    }

    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Run one full check cycle at wall-clock time `now`.
    ///
    /// Nothing is mutated on sync or parse failure. Shutdown is honored
    /// between entries only, so the in-flight send always completes.
    pub async fn run_cycle(
        &mut self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, CycleError> {
        counter!("notifier_cycles_total").increment(1);
        gauge!("notifier_last_cycle_ts").set(now.timestamp() as f64);
        self.dispatcher.begin_cycle();

        let synced = match self.source.sync().await {
            Ok(s) => s,
            Err(e) => {
                counter!("notifier_sync_errors_total").increment(1);
                return Err(CycleError::Sync(e));
            }
        };
        if !synced.changed && !self.pending {
            tracing::debug!("no updates to listings file, skipping check");
            return Ok(CycleReport {
                skipped: true,
                ..CycleReport::default()
            });
        }
        // The source has already moved past this content; only a commit
        // may clear the flag, so any failure below is retried next tick.
        self.pending = true;

        let current = Snapshot::parse(&synced.content).inspect_err(|_| {
            counter!("notifier_parse_errors_total").increment(1);
        })?;
        self.store
            .stage_current(&synced.content)
            .map_err(CycleError::Store)?;

        let mut report = CycleReport::default();

        if self.settings.seed_on_first_run && self.store.is_first_run() {
            tracing::info!(entries = current.len(), "first run, seeding snapshot without sending");
            self.commit(current, &[])?;
            report.seeded = true;
            report.committed = true;
            return Ok(report);
        }

        let diffed = diff(&self.previous, &current, now, self.settings.recency_window_days);
        report.stats = diffed.stats;
        let queue = select(diffed.candidates, &self.delivered);
        report.deliverable = queue.len();
        counter!("notifier_candidates_total").increment(queue.len() as u64);
        tracing::info!(
            new = diffed.stats.new,
            changed = diffed.stats.changed,
            removed = diffed.stats.removed,
            stale = diffed.stats.stale,
            deliverable = queue.len(),
            "listings diffed"
        );

        let mut newly: Vec<ListingKey> = Vec::with_capacity(queue.len());
        for entry in queue {
            if cancel.is_cancelled() {
                tracing::info!("shutdown requested, stopping before next entry");
                report.interrupted = true;
                break;
            }

            let text = format_message(&entry.listing);
            let outcome = self.dispatcher.deliver(&text, &entry.key).await;
            if outcome.any_delivered() {
                self.delivered.insert(entry.key.clone());
                // Persist before moving on: a crash after this point must not resend.
                self.store
                    .record_delivered(&entry.key)
                    .map_err(CycleError::Store)?;
                newly.push(entry.key);
                report.delivered += 1;
                counter!("notifier_delivered_total").increment(1);
            } else {
                tracing::warn!(key = %entry.key, "no channel accepted entry, will retry next cycle");
                report.failed += 1;
                counter!("notifier_delivery_failures_total").increment(1);
            }
        }

        if report.failed == 0 && !report.interrupted {
            self.commit(current, &newly)?;
            report.committed = true;
        }

        Ok(report)
    }

    /// Keys sent in earlier cycles whose append failed are only in memory,
    /// so the whole in-memory set is written, not just this cycle's keys.
    fn commit(&mut self, current: Snapshot, newly: &[ListingKey]) -> Result<(), CycleError> {
        self.delivered.extend(newly.iter().cloned());
        self.store
            .commit(&current, &self.delivered)
            .map_err(CycleError::Store)?;
        self.previous = current;
        self.pending = false;
        Ok(())
    }
}
