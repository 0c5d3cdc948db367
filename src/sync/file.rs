// src/sync/file.rs
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use super::{ListingSource, SyncOutcome};

/// Reads listings from a local file; change detection by SHA-256 digest.
pub struct FileSource {
    path: PathBuf,
    last_digest: Option<[u8; 32]>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_digest: None,
        }
    }
}

#[async_trait::async_trait]
impl ListingSource for FileSource {
    async fn sync(&mut self) -> Result<SyncOutcome> {
        let content = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading listings from {}", self.path.display()))?;
        let digest: [u8; 32] = Sha256::digest(&content).into();
        let changed = self.last_digest != Some(digest);
        self.last_digest = Some(digest);
        Ok(SyncOutcome { changed, content })
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
