//! Prints the messages a listings file would produce, without sending.
//! With no window every eligible entry is printed, oldest first.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use listings_notifier::diff::diff;
use listings_notifier::notify::format_message;
use listings_notifier::select::select;
use listings_notifier::Snapshot;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listings JSON file to preview
    path: PathBuf,

    /// Only show entries posted within this many days
    window_days: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_target(false).init();

    let raw = std::fs::read(&args.path)
        .with_context(|| format!("reading {}", args.path.display()))?;
    let current = Snapshot::parse(&raw)?;
    let window = args.window_days.unwrap_or(u32::MAX);
    let report = diff(&Snapshot::default(), &current, Utc::now(), window);
    let queue = select(report.candidates, &BTreeSet::new());

    for entry in &queue {
        println!("{}\n", format_message(&entry.listing));
    }
    tracing::info!(
        total = current.len(),
        shown = queue.len(),
        stale = report.stats.stale,
        ineligible = report.stats.ineligible,
        "preview done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn window_is_optional_and_typed() {
        let a = Args::try_parse_from(["listings-preview", "listings.json"]).unwrap();
        assert_eq!(a.path, PathBuf::from("listings.json"));
        assert_eq!(a.window_days, None);

        let a = Args::try_parse_from(["listings-preview", "l.json", "7"]).unwrap();
        assert_eq!(a.window_days, Some(7));

        assert!(Args::try_parse_from(["listings-preview", "l.json", "week"]).is_err());
        assert!(Args::try_parse_from(["listings-preview"]).is_err());
    }
}
