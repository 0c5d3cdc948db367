// src/scheduler.rs
use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::watcher::{CycleError, Watcher};

/// Run check cycles every `interval` until `cancel` fires. The first check
/// runs immediately. A cycle always finishes before the next tick is awaited,
/// so cycles never overlap; a slow cycle delays the schedule instead of
/// bunching up ticks.
pub async fn run(watcher: &mut Watcher, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        run_once_logged(watcher, &cancel).await;
    }
    tracing::info!("scheduler stopped");
}

/// One cycle with outcome logging. Errors never escape: the next tick retries.
pub async fn run_once_logged(watcher: &mut Watcher, cancel: &CancellationToken) {
    match watcher.run_cycle(Utc::now(), cancel).await {
        Ok(r) if r.skipped => tracing::debug!("cycle skipped, nothing changed"),
        Ok(r) => tracing::info!(
            target: "cycle",
            deliverable = r.deliverable,
            delivered = r.delivered,
            failed = r.failed,
            committed = r.committed,
            interrupted = r.interrupted,
            seeded = r.seeded,
            "check cycle finished"
        ),
        Err(e @ CycleError::Sync(_)) => tracing::warn!(error = %e, "check cycle aborted"),
        Err(e) => tracing::error!(error = %e, "check cycle aborted"),
    }
}

/// Resolve on SIGINT or SIGTERM (Ctrl-C elsewhere).
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(t), Ok(i)) => (t, i),
            _ => {
                tracing::warn!("could not register unix signal handlers, falling back to ctrl_c");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Cancel `token` when a shutdown signal arrives.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received, finishing current send");
        token.cancel();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{log::LogTransport, DeliveryPolicy, Dispatcher, ChannelId};
    use crate::store::SnapshotStore;
    use crate::sync::{ListingSource, SyncOutcome};
    use crate::watcher::WatcherSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl ListingSource for Counting {
        async fn sync(&mut self) -> anyhow::Result<SyncOutcome> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(SyncOutcome {
                changed: false,
                content: b"[]".to_vec(),
            })
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_until_cancelled() {
        let tmp = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut watcher = Watcher::new(
            Box::new(Counting(calls.clone())),
            SnapshotStore::open(tmp.path()).unwrap(),
            Dispatcher::new(
                Arc::new(LogTransport),
                [ChannelId::new("1")],
                DeliveryPolicy::default(),
            ),
            WatcherSettings {
                recency_window_days: 5,
                seed_on_first_run: false,
            },
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(150)).await;
            stopper.cancel();
        });

        run(&mut watcher, Duration::from_secs(60), cancel).await;
        // t = 0, 60, 120
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn already_cancelled_runs_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut watcher = Watcher::new(
            Box::new(Counting(calls.clone())),
            SnapshotStore::open(tmp.path()).unwrap(),
            Dispatcher::new(Arc::new(LogTransport), [ChannelId::new("1")], DeliveryPolicy::default()),
            WatcherSettings {
                recency_window_days: 5,
                seed_on_first_run: false,
            },
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        run(&mut watcher, Duration::from_secs(60), cancel).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
