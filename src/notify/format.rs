// src/notify/format.rs
//! Pure message formatting (Discord markdown).

use crate::listing::Listing;

const NOT_SPECIFIED: &str = "Not specified";

/// Render a listing as a chat message. No side effects.
pub fn format_message(listing: &Listing) -> String {
    let company = listing.company_name.trim();
    let title = listing.title.trim();
    let url = listing.url.as_deref().map(str::trim).unwrap_or_default();

    let locations = if listing.locations.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        listing.locations.join(" | ")
    };

    let mut parts = Vec::with_capacity(7);
    parts.push(format!(">>> ## {company}"));
    // Angle brackets suppress Discord's link preview.
    if url.is_empty() {
        parts.push(format!("## {title}"));
    } else {
        parts.push(format!("## [{title}](<{url}>)"));
    }
    parts.push("### Locations:".to_string());
    parts.push(locations);

    if !listing.terms.is_empty() {
        parts.push(format!("### Terms: `{}`", listing.terms.join(" | ")));
    }

    if let Some(s) = listing.sponsorship.as_deref().map(str::trim) {
        if !s.is_empty() && !s.eq_ignore_ascii_case("other") {
            parts.push(format!("### Sponsorship: `{s}`"));
        }
    }

    parts.push(format!(
        "Posted on: {}",
        listing.posted_on().format("%B %d, %Y")
    ));

    parts.join("\n")
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}
