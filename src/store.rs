// src/store.rs
//! Snapshot Store: the only durable state.
//!
//! Layout under the state directory:
//! - `previous.jsonl`: last fully processed snapshot, one listing per line
//! - `current.json`: raw listings bytes as last fetched
//! - `delivered_keys.txt`: one delivered key per line
//!
//! Whole-file writes go through a temp file + rename so a crash never leaves a
//! torn file behind. Delivered keys are also appended one at a time as they
//! are sent; a torn trailing line at worst adds one bogus key.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::listing::{Listing, ListingKey, Snapshot};

const PREVIOUS_FILE: &str = "previous.jsonl";
const CURRENT_FILE: &str = "current.json";
const DELIVERED_FILE: &str = "delivered_keys.txt";

#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub previous: Snapshot,
    /// Raw bytes of the last fetched listings file, if any.
    pub current: Option<Vec<u8>>,
    pub delivered: BTreeSet<ListingKey>,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating state dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// No snapshot has ever been committed.
    pub fn is_first_run(&self) -> bool {
        !self.path(PREVIOUS_FILE).exists()
    }

    pub fn load(&self) -> Result<StoreState> {
        let previous = self.load_previous()?;
        let current = match fs::read(self.path(CURRENT_FILE)) {
            Ok(b) => Some(b),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e).context("reading current listings"),
        };
        let delivered = self.load_delivered()?;
        Ok(StoreState {
            previous,
            current,
            delivered,
        })
    }

    fn load_previous(&self) -> Result<Snapshot> {
        let path = self.path(PREVIOUS_FILE);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => return Err(e).with_context(|| format!("opening {}", path.display())),
        };
        let mut entries = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let listing: Listing = serde_json::from_str(&line)
                .with_context(|| format!("{}:{} is not a listing", path.display(), n + 1))?;
            entries.push(listing);
        }
        Ok(Snapshot::new(entries))
    }

    fn load_delivered(&self) -> Result<BTreeSet<ListingKey>> {
        let path = self.path(DELIVERED_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(ListingKey::from_persisted)
            .collect())
    }

    /// Replace `current.json` with freshly fetched, already parsed content.
    pub fn stage_current(&self, raw: &[u8]) -> Result<()> {
        write_atomic(&self.path(CURRENT_FILE), raw)
    }

    /// Durably note one delivered key right after it was sent.
    pub fn record_delivered(&self, key: &ListingKey) -> Result<()> {
        let path = self.path(DELIVERED_FILE);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        writeln!(f, "{key}").with_context(|| format!("appending to {}", path.display()))?;
        f.sync_data()
            .with_context(|| format!("syncing {}", path.display()))?;
        Ok(())
    }

    /// End of a fully processed cycle: `new_current` becomes the previous
    /// snapshot and the delivered set is rewritten with `newly_delivered`
    /// merged in.
    pub fn commit<'a>(
        &self,
        new_current: &Snapshot,
        newly_delivered: impl IntoIterator<Item = &'a ListingKey>,
    ) -> Result<()> {
        let mut delivered = self.load_delivered()?;
        delivered.extend(newly_delivered.into_iter().cloned());

        let mut keys = String::new();
        for k in &delivered {
            keys.push_str(k.as_str());
            keys.push('\n');
        }
        write_atomic(&self.path(DELIVERED_FILE), keys.as_bytes())?;

        let mut buf = Vec::with_capacity(new_current.len() * 256);
        for listing in new_current.entries() {
            serde_json::to_writer(&mut buf, listing).context("serializing listing")?;
            buf.push(b'\n');
        }
        write_atomic(&self.path(PREVIOUS_FILE), &buf)?;
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut f = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(bytes)
        .with_context(|| format!("writing {}", tmp.display()))?;
    f.sync_all()
        .with_context(|| format!("syncing {}", tmp.display()))?;
    drop(f);
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
