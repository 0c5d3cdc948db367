// src/config/mod.rs
//! Runtime configuration: process env (after `.env`) > optional TOML file
//! named by `NOTIFIER_CONFIG_PATH` > built-in defaults.

pub mod file;

use anyhow::{anyhow, bail, Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::diff::DEFAULT_RECENCY_DAYS;
use crate::notify::{ChannelId, DeliveryPolicy};
pub use file::FileConfig;

pub const ENV_CONFIG_PATH: &str = "NOTIFIER_CONFIG_PATH";

const DEFAULT_REPO_URL: &str = "https://github.com/SimplifyJobs/Summer2026-Internships.git";
const DEFAULT_LOCAL_REPO_PATH: &str = "Summer2026-Internships";
const DEFAULT_LISTINGS_FILE: &str = ".github/scripts/listings.json";
const DEFAULT_STATE_DIR: &str = "state";
/// One week.
const MAX_CHECK_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
const MAX_DELAY_MS: u64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Clone/pull `repo_url` into `local_repo_path`, read `listings_file` inside it.
    Git,
    /// Read `listings_file` directly from disk.
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: Option<String>,
    pub channel_ids: Vec<ChannelId>,
    pub source: SourceKind,
    pub repo_url: String,
    pub local_repo_path: PathBuf,
    pub listings_file: PathBuf,
    pub state_dir: PathBuf,
    pub check_interval: Duration,
    pub recency_window_days: u32,
    pub delivery: DeliveryPolicy,
    pub seed_on_first_run: bool,
    pub dry_run: bool,
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    /// Read the process environment, plus the TOML file from
    /// `$NOTIFIER_CONFIG_PATH` when set.
    pub fn from_env() -> Result<Self> {
        let file = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) if !p.trim().is_empty() => FileConfig::load_from(&PathBuf::from(p))?,
            _ => FileConfig::default(),
        };
        Self::from_lookup(|k| std::env::var(k).ok(), &file)
    }

    pub fn from_lookup<F>(env: F, file: &FileConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Option<String> {
            env(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .or_else(|| file.get(key))
        };

        let dry_run = parse_bool(&get, "DRY_RUN", false)?;

        let raw_ids = get("CHANNEL_IDS").ok_or_else(|| anyhow!("missing required CHANNEL_IDS"))?;
        let channel_ids = parse_channel_ids(&raw_ids)?;

        let discord_token = get("DISCORD_TOKEN");
        if discord_token.is_none() && !dry_run {
            bail!("missing required DISCORD_TOKEN (set DRY_RUN=1 to run without sending)");
        }

        let source = match get("LISTINGS_SOURCE").as_deref().map(str::to_ascii_lowercase) {
            None => SourceKind::Git,
            Some(s) if s == "git" => SourceKind::Git,
            Some(s) if s == "file" => SourceKind::File,
            Some(other) => bail!("LISTINGS_SOURCE must be `git` or `file`, got `{other}`"),
        };

        let max_retries: u32 = parse_num(&get, "MAX_RETRIES", 3)?;
        let failure_threshold: u32 = parse_num(&get, "FAILURE_THRESHOLD", max_retries.max(1))?;
        let interval_min: u64 = parse_num(&get, "CHECK_INTERVAL_MINUTES", 1)?;
        if interval_min == 0 {
            bail!("CHECK_INTERVAL_MINUTES must be at least 1");
        }
        let check_secs = interval_min
            .checked_mul(60)
            .filter(|_| interval_min <= MAX_CHECK_INTERVAL_MINUTES)
            .ok_or_else(|| {
                anyhow!("CHECK_INTERVAL_MINUTES must be at most {MAX_CHECK_INTERVAL_MINUTES}, got {interval_min}")
            })?;

        let delivery = DeliveryPolicy {
            max_retries,
            failure_threshold: failure_threshold.max(1),
            retry_base_delay: Duration::from_millis(parse_bounded_ms(&get, "RETRY_BASE_DELAY_MS", 500)?),
            send_interval: Duration::from_millis(parse_bounded_ms(&get, "SEND_INTERVAL_MS", 1000)?),
        };

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            Some(s) if s == "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        let metrics_addr = get("METRICS_ADDR")
            .map(|s| {
                s.parse::<SocketAddr>()
                    .with_context(|| format!("METRICS_ADDR `{s}` is not a socket address"))
            })
            .transpose()?;

        Ok(Self {
            discord_token,
            channel_ids,
            source,
            repo_url: get("REPO_URL").unwrap_or_else(|| DEFAULT_REPO_URL.to_string()),
            local_repo_path: get("LOCAL_REPO_PATH")
                .unwrap_or_else(|| DEFAULT_LOCAL_REPO_PATH.to_string())
                .into(),
            listings_file: get("LISTINGS_FILE")
                .unwrap_or_else(|| DEFAULT_LISTINGS_FILE.to_string())
                .into(),
            state_dir: get("STATE_DIR")
                .unwrap_or_else(|| DEFAULT_STATE_DIR.to_string())
                .into(),
            check_interval: Duration::from_secs(check_secs),
            recency_window_days: parse_num(&get, "RECENCY_WINDOW_DAYS", DEFAULT_RECENCY_DAYS)?,
            delivery,
            seed_on_first_run: parse_bool(&get, "SEED_ON_FIRST_RUN", false)?,
            dry_run,
            log_level: get("LOG_LEVEL")
                .map(|s| s.to_ascii_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            log_format,
            metrics_addr,
        })
    }
}

/// Comma-separated numeric channel ids; duplicates collapse, order is kept.
pub fn parse_channel_ids(raw: &str) -> Result<Vec<ChannelId>> {
    let mut out: Vec<ChannelId> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        part.parse::<u64>()
            .map_err(|_| anyhow!("CHANNEL_IDS must be comma-separated integers, got `{part}`"))?;
        let id = ChannelId::new(part);
        if !out.contains(&id) {
            out.push(id);
        }
    }
    if out.is_empty() {
        bail!("CHANNEL_IDS contains no channel ids");
    }
    Ok(out)
}

fn parse_num<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|_| anyhow!("{key} must be a non-negative integer, got `{v}`")),
    }
}

/// Millisecond delays above one hour are a typo, not a policy.
fn parse_bounded_ms<G>(get: &G, key: &str, default: u64) -> Result<u64>
where
    G: Fn(&str) -> Option<String>,
{
    let ms: u64 = parse_num(get, key, default)?;
    if ms > MAX_DELAY_MS {
        bail!("{key} must be at most {MAX_DELAY_MS}, got {ms}");
    }
    Ok(ms)
}

fn parse_bool<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("{key} must be a boolean, got `{other}`"),
    }
}
