// src/select.rs
//! Ordering & dedup: turns diff candidates into the final send queue.

use std::collections::{BTreeSet, HashSet};

use crate::diff::{Candidate, ChangeKind};
use crate::listing::{Listing, ListingKey};

/// A candidate that has not been delivered yet, in final send order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deliverable {
    pub key: ListingKey,
    pub kind: ChangeKind,
    pub listing: Listing,
}

impl From<Candidate> for Deliverable {
    fn from(c: Candidate) -> Self {
        Self {
            key: c.key,
            kind: c.kind,
            listing: c.listing,
        }
    }
}

/// Oldest posting day first; equal days keep source order. Keys already in
/// `delivered` are dropped, as is any repeat of a key within the batch.
/// `delivered` is only read here; keys are recorded after a successful send.
pub fn select(mut candidates: Vec<Candidate>, delivered: &BTreeSet<ListingKey>) -> Vec<Deliverable> {
    candidates.sort_by_key(|c| (c.listing.posted_on(), c.index));

    let mut batch: HashSet<ListingKey> = HashSet::with_capacity(candidates.len());
    candidates
        .into_iter()
        .filter(|c| {
            if delivered.contains(&c.key) {
                tracing::debug!(key = %c.key, "already delivered, skipping");
                return false;
            }
            batch.insert(c.key.clone())
        })
        .map(Deliverable::from)
        .collect()
}
