// src/diff.rs
//! # Diff Engine
//! Pure comparison of two snapshots. No I/O; `now` is passed in so recency is
//! testable.
//!
//! An entry whose identity fields change gets a new key and therefore shows
//! up as NEW. Edited postings may be announced twice; this is accepted.

use chrono::{DateTime, Days, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};

use crate::listing::{Listing, ListingKey, Snapshot};

pub const DEFAULT_RECENCY_DAYS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Changed,
}

/// A listing that passed classification and all filters, pending dedup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: ListingKey,
    pub kind: ChangeKind,
    /// Position in the current snapshot; tie-break for ordering.
    pub index: usize,
    pub listing: Listing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// NEW/CHANGED but outside the recency window.
    pub stale: usize,
    /// NEW/CHANGED but hidden or closed.
    pub ineligible: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DiffReport {
    pub candidates: Vec<Candidate>,
    pub stats: DiffStats,
}

/// Oldest posting day still considered recent.
pub fn recency_cutoff(now: DateTime<Utc>, window_days: u32) -> NaiveDate {
    let today = now.date_naive();
    today
        .checked_sub_days(Days::new(u64::from(window_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Fields whose change re-announces an otherwise known listing.
fn tracked_fields_differ(old: &Listing, new: &Listing) -> bool {
    old.locations != new.locations
        || old.active != new.active
        || old.is_visible != new.is_visible
        || old.url != new.url
}

pub fn diff(
    previous: &Snapshot,
    current: &Snapshot,
    now: DateTime<Utc>,
    window_days: u32,
) -> DiffReport {
    // Later duplicates overwrite earlier ones.
    let old_by_key: HashMap<ListingKey, &Listing> =
        previous.entries().iter().map(|l| (l.key(), l)).collect();
    let cutoff = recency_cutoff(now, window_days);

    let mut report = DiffReport::default();
    let mut seen: HashSet<ListingKey> = HashSet::with_capacity(current.len());

    for (index, listing) in current.entries().iter().enumerate() {
        let key = listing.key();
        seen.insert(key.clone());

        let kind = match old_by_key.get(&key) {
            None => ChangeKind::New,
            Some(old) if tracked_fields_differ(old, listing) => ChangeKind::Changed,
            Some(_) => {
                report.stats.unchanged += 1;
                continue;
            }
        };
        match kind {
            ChangeKind::New => report.stats.new += 1,
            ChangeKind::Changed => report.stats.changed += 1,
        }

        if !listing.is_eligible() {
            report.stats.ineligible += 1;
            continue;
        }
        if listing.posted_on() < cutoff {
            tracing::trace!(%key, posted = %listing.posted_on(), "outside recency window");
            report.stats.stale += 1;
            continue;
        }

        report.candidates.push(Candidate {
            key,
            kind,
            index,
            listing: listing.clone(),
        });
    }

    report.stats.removed = old_by_key.keys().filter(|k| !seen.contains(*k)).count();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 20, 15, 0, 0).unwrap()
    }

    fn listing(company: &str, title: &str, days_ago: u64) -> Listing {
        let posted = now().checked_sub_days(Days::new(days_ago)).unwrap();
        Listing {
            company_name: company.into(),
            title: title.into(),
            locations: vec!["Remote".into()],
            date_posted: posted.timestamp(),
            is_visible: true,
            active: true,
            url: Some(format!("https://jobs.example/{company}")),
            terms: vec![],
            sponsorship: None,
        }
    }

    #[test]
    fn new_entries_are_set_difference_by_key() {
        let prev = Snapshot::new(vec![listing("A", "Intern", 1), listing("B", "Intern", 1)]);
        let cur = Snapshot::new(vec![
            listing("A", "Intern", 1),
            listing("C", "Intern", 0),
            listing("B", "Intern", 1),
            listing("D", "Intern", 2),
        ]);
        let report = diff(&prev, &cur, now(), DEFAULT_RECENCY_DAYS);
        let keys: Vec<_> = report.candidates.iter().map(|c| c.key.clone()).collect();
        assert_eq!(keys, vec![cur.entries()[1].key(), cur.entries()[3].key()]);
        assert!(report.candidates.iter().all(|c| c.kind == ChangeKind::New));
        assert_eq!(report.candidates[0].index, 1);
        assert_eq!(report.stats.unchanged, 2);
        assert_eq!(report.stats.removed, 0);
    }

    #[test]
    fn tracked_field_change_is_changed_cosmetic_is_not() {
        let old = listing("A", "Intern", 1);
        let mut url_changed = old.clone();
        url_changed.url = Some("https://jobs.example/new".into());
        let mut cosmetic = listing("B", "Intern", 1);
        let prev = Snapshot::new(vec![old, cosmetic.clone()]);
        cosmetic.sponsorship = Some("Offers Sponsorship".into());
        cosmetic.company_name = "  b ".into();

        let report = diff(
            &prev,
            &Snapshot::new(vec![url_changed, cosmetic]),
            now(),
            DEFAULT_RECENCY_DAYS,
        );
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].kind, ChangeKind::Changed);
        assert_eq!(report.stats.unchanged, 1);
    }

    #[test]
    fn recency_boundary_is_inclusive() {
        let cur = Snapshot::new(vec![listing("Edge", "Intern", 5), listing("Old", "Intern", 6)]);
        let report = diff(&Snapshot::default(), &cur, now(), 5);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].listing.company_name, "Edge");
        assert_eq!(report.stats.stale, 1);
    }

    #[test]
    fn hidden_or_closed_entries_are_dropped() {
        let mut hidden = listing("H", "Intern", 0);
        hidden.is_visible = false;
        let mut closed = listing("C", "Intern", 0);
        closed.active = false;
        let report = diff(
            &Snapshot::default(),
            &Snapshot::new(vec![hidden, closed]),
            now(),
            DEFAULT_RECENCY_DAYS,
        );
        assert!(report.candidates.is_empty());
        assert_eq!(report.stats.ineligible, 2);
    }

    #[test]
    fn closing_a_known_listing_is_classified_but_not_emitted() {
        let open = listing("A", "Intern", 0);
        let mut closed = open.clone();
        closed.active = false;
        let report = diff(
            &Snapshot::new(vec![open]),
            &Snapshot::new(vec![closed]),
            now(),
            DEFAULT_RECENCY_DAYS,
        );
        assert!(report.candidates.is_empty());
        assert_eq!(report.stats.changed, 1);
        assert_eq!(report.stats.ineligible, 1);
    }

    #[test]
    fn removed_entries_are_counted() {
        let prev = Snapshot::new(vec![listing("A", "Intern", 0), listing("B", "Intern", 0)]);
        let cur = Snapshot::new(vec![listing("A", "Intern", 0)]);
        let report = diff(&prev, &cur, now(), DEFAULT_RECENCY_DAYS);
        assert_eq!(report.stats.removed, 1);
        assert!(report.candidates.is_empty());
    }

    #[test]
    fn renamed_title_is_treated_as_new() {
        let prev = Snapshot::new(vec![listing("A", "Intern", 0)]);
        let cur = Snapshot::new(vec![listing("A", "Intern (Summer)", 0)]);
        let report = diff(&prev, &cur, now(), DEFAULT_RECENCY_DAYS);
        assert_eq!(report.candidates[0].kind, ChangeKind::New);
        assert_eq!(report.stats.removed, 1);
    }
}
