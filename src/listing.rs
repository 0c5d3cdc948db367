// src/listing.rs
//! Listing records as they appear in the upstream `listings.json`, plus the
//! derived identity key used for diffing and de-duplication.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

fn default_visible() -> bool {
    true
}

/// `null` and a missing field both mean "empty".
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// One posting from the listings file. Unknown upstream fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(default, deserialize_with = "null_as_default")]
    pub company_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locations: Vec<String>,
    /// Unix seconds.
    pub date_posted: i64,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub terms: Vec<String>,
    #[serde(default)]
    pub sponsorship: Option<String>,
}

impl Listing {
    /// Stable identity derived from company, title and location set.
    pub fn key(&self) -> ListingKey {
        ListingKey::derive(&self.company_name, &self.title, &self.locations)
    }

    /// Posting timestamp (UTC). Out-of-range values collapse to the epoch.
    pub fn posted_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.date_posted, 0).unwrap_or_default()
    }

    /// Posting date at day precision, which is all the source guarantees.
    pub fn posted_on(&self) -> NaiveDate {
        self.posted_at().date_naive()
    }

    /// Only visible and open postings are ever announced.
    pub fn is_eligible(&self) -> bool {
        self.is_visible && self.active
    }
}

/// Normalized identity of a listing: `company__title__loc1|loc2`.
///
/// Every part is lowercased with whitespace collapsed; locations are a sorted
/// set, so reordering them upstream does not produce a new key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingKey(String);

impl ListingKey {
    pub fn derive<S: AsRef<str>>(company: &str, title: &str, locations: &[S]) -> Self {
        let locs: BTreeSet<String> = locations
            .iter()
            .map(|l| normalize_part(l.as_ref()))
            .filter(|l| !l.is_empty())
            .collect();
        let locs: Vec<String> = locs.into_iter().collect();
        Self(format!(
            "{}__{}__{}",
            normalize_part(company),
            normalize_part(title),
            locs.join("|")
        ))
    }

    /// Wrap a key read back from persisted state.
    pub fn from_persisted(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_part(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The full parsed listings file at one point in time, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<Listing>,
}

impl Snapshot {
    pub fn new(entries: Vec<Listing>) -> Self {
        Self { entries }
    }

    /// Parse raw `listings.json` bytes (a top-level JSON array).
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let entries: Vec<Listing> = serde_json::from_slice(raw)?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Listing] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Listing> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
