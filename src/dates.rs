//! Expiry-date text parsing.
//!
//! Sites render expiration dates in a handful of shapes: "12/31/2025",
//! "08/06/25", "December 31, 2025", occasionally an ISO date. Parsing is
//! best-effort; anything unrecognized degrades to `None` with a warning
//! rather than failing the ingestion.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

static MDY_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());

static MDY_SHORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2})$").unwrap());

static MONTH_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+)\s+(\d{1,2}),?\s+(\d{4})$").unwrap());

/// Generic formats tried before the site-specific patterns. A parse from
/// this list is only trusted when the year is plausible (> 2020), which
/// guards against short numeric strings landing on nonsense dates.
const GENERIC_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m-%d-%Y", "%d %B %Y", "%d %b %Y"];

/// Parse varied expiry-date text into a calendar date. Returns `None` (with
/// a warning) when nothing matches; never panics.
pub fn parse_expiration_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for format in GENERIC_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            if date.year() > 2020 {
                return Some(date);
            }
        }
    }

    if let Some(caps) = MDY_FULL.captures(text) {
        return numeric_date(&caps[1], &caps[2], caps[3].parse().ok()?, text);
    }

    if let Some(caps) = MDY_SHORT.captures(text) {
        let two_digit: i32 = caps[3].parse().ok()?;
        // Pivot rule for 2-digit years: 00-49 -> 2000s, 50-99 -> 1900s.
        let year = if two_digit < 50 {
            two_digit + 2000
        } else {
            two_digit + 1900
        };
        return numeric_date(&caps[1], &caps[2], year, text);
    }

    if MONTH_NAME.is_match(text) {
        let normalized = text.replace(',', "");
        for format in ["%B %d %Y", "%b %d %Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(&normalized, format) {
                return Some(date);
            }
        }
    }

    warn!(text, "could not parse expiration date");
    None
}

fn numeric_date(month: &str, day: &str, year: i32, original: &str) -> Option<NaiveDate> {
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => Some(date),
        None => {
            warn!(text = original, "expiration date is not a valid calendar date");
            None
        }
    }
}
