// src/sync/git.rs
//! Keeps a local working copy of the listings repository up to date through
//! the `git` CLI. Change detection compares the blob id of the listings file
//! before and after a pull, which is cheap and ignores unrelated commits.

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::{ListingSource, SyncOutcome};

pub struct GitSource {
    repo_url: String,
    workdir: PathBuf,
    /// Listings file, relative to the repository root.
    file: PathBuf,
}

impl GitSource {
    pub fn new(repo_url: impl Into<String>, workdir: impl Into<PathBuf>, file: impl Into<PathBuf>) -> Self {
        Self {
            repo_url: repo_url.into(),
            workdir: workdir.into(),
            file: file.into(),
        }
    }

    pub fn listings_path(&self) -> PathBuf {
        self.workdir.join(&self.file)
    }

    async fn git(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("git");
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let out = cmd
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .with_context(|| format!("spawning git {}", args.join(" ")))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            bail!("git {} failed ({}): {}", args.join(" "), out.status, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Blob id of the listings file at HEAD, if it exists there.
    async fn blob_id(&self) -> Option<String> {
        let spec = format!("HEAD:{}", self.file.to_string_lossy().replace('\\', "/"));
        self.git(Some(&self.workdir), &["rev-parse", &spec]).await.ok()
    }

    async fn is_repo(&self) -> bool {
        self.workdir.join(".git").exists()
            && self
                .git(Some(&self.workdir), &["rev-parse", "--git-dir"])
                .await
                .is_ok()
    }

    async fn clone_fresh(&self) -> Result<()> {
        if self.workdir.exists() {
            // Only clear out an empty leftover; never wipe unknown content.
            let mut rd = tokio::fs::read_dir(&self.workdir).await?;
            if rd.next_entry().await?.is_some() {
                bail!(
                    "{} exists but is not a git repository",
                    self.workdir.display()
                );
            }
            tokio::fs::remove_dir(&self.workdir).await?;
        }
        let dest = self.workdir.to_string_lossy().to_string();
        self.git(None, &["clone", "--quiet", &self.repo_url, &dest])
            .await?;
        tracing::info!(repo = %self.repo_url, dir = %dest, "repository cloned");
        Ok(())
    }

    /// Returns whether the listings file changed.
    async fn update(&self) -> Result<bool> {
        if !self.is_repo().await {
            self.clone_fresh().await?;
            return Ok(true);
        }

        let before = self.blob_id().await;
        self.git(Some(&self.workdir), &["pull", "--ff-only", "--quiet"])
            .await?;
        let after = self.blob_id().await;

        Ok(match (before, after) {
            (Some(b), Some(a)) => b != a,
            _ => {
                tracing::warn!("could not determine whether listings changed, assuming updated");
                true
            }
        })
    }
}

#[async_trait::async_trait]
impl ListingSource for GitSource {
    async fn sync(&mut self) -> Result<SyncOutcome> {
        let changed = self.update().await?;
        let path = self.listings_path();
        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| anyhow!("reading {}: {e}", path.display()))?;
        if changed {
            tracing::info!(file = %path.display(), "listings file updated");
        } else {
            tracing::debug!("repository pulled, listings unchanged");
        }
        Ok(SyncOutcome { changed, content })
    }

    fn name(&self) -> &'static str {
        "git"
    }
}
