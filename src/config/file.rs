// src/config/file.rs
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Optional TOML file with the same keys as the environment, lowercased:
///
/// ```toml
/// channel_ids = [123456789, 987654321]
/// check_interval_minutes = 5
/// dry_run = true
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    table: toml::Table,
}

impl FileConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(s)?;
        Ok(Self { table })
    }

    /// Value for an env-style key (`CHECK_INTERVAL_MINUTES`), as a string.
    /// Arrays are joined with commas.
    pub fn get(&self, key: &str) -> Option<String> {
        let v = self.table.get(&key.to_ascii_lowercase())?;
        Some(match v {
            toml::Value::String(s) => s.clone(),
            toml::Value::Array(items) => items
                .iter()
                .map(|i| match i {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            other => other.to_string(),
        })
    }
}
