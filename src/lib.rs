// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod diff;
pub mod listing;
pub mod logging;
pub mod metrics;
pub mod scheduler;
pub mod select;
pub mod store;
pub mod sync;
pub mod watcher;

// Chat transports, formatting and the multi-channel dispatcher
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::config::Config;
pub use crate::listing::{Listing, ListingKey, Snapshot};
pub use crate::notify::{ChannelId, ChannelTransport, Dispatcher};
pub use crate::watcher::{CycleError, CycleReport, Watcher, WatcherSettings};

use std::sync::Arc;
use tracing::info;

use crate::config::SourceKind;
use crate::notify::{discord::DiscordTransport, log::LogTransport};
use crate::store::SnapshotStore;
use crate::sync::{FileSource, GitSource, ListingSource};

/// Wire source, store, transport and dispatcher from configuration.
/// Fails on anything that would make the scheduling loop useless
/// (unwritable state dir, corrupt persisted state).
pub fn build_watcher(cfg: &Config) -> anyhow::Result<Watcher> {
    let source: Box<dyn ListingSource> = match cfg.source {
        SourceKind::Git => Box::new(GitSource::new(
            cfg.repo_url.clone(),
            cfg.local_repo_path.clone(),
            cfg.listings_file.clone(),
        )),
        SourceKind::File => Box::new(FileSource::new(cfg.listings_file.clone())),
    };

    let transport: Arc<dyn ChannelTransport> = match (&cfg.discord_token, cfg.dry_run) {
        (Some(token), false) => Arc::new(DiscordTransport::new(token.clone())),
        _ => {
            info!("dry run: messages are logged, not sent");
            Arc::new(LogTransport)
        }
    };

    let dispatcher = Dispatcher::new(transport, cfg.channel_ids.clone(), cfg.delivery.clone());
    let store = SnapshotStore::open(&cfg.state_dir)?;
    info!(
        source = source.name(),
        channels = cfg.channel_ids.len(),
        state_dir = %cfg.state_dir.display(),
        "watcher configured"
    );

    Watcher::new(
        source,
        store,
        dispatcher,
        WatcherSettings {
            recency_window_days: cfg.recency_window_days,
            seed_on_first_run: cfg.seed_on_first_run,
        },
    )
}
