// src/sync/mod.rs
pub mod file;
pub mod git;

use anyhow::Result;

pub use file::FileSource;
pub use git::GitSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Content differs from the previous successful sync.
    pub changed: bool,
    pub content: Vec<u8>,
}

/// Where listings come from. A failed `sync` must leave previously fetched
/// content untouched so the next attempt starts from a known state.
#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    async fn sync(&mut self) -> Result<SyncOutcome>;
    fn name(&self) -> &'static str;
}
