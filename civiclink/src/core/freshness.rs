//! Timeliness check for sources answering questions about the current state of things.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::Serialize;

/// Default age after which a source is considered stale (two years).
pub const DEFAULT_STALE_AFTER_DAYS: i64 = 730;

static CURRENT_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(current|currently|now|today|latest|still|recent|recently|this year|as of)\b",
    )
    .expect("current-state pattern is valid")
});

static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:19|20)\d{2})-(\d{2})-(\d{2})\b").expect("iso date pattern is valid")
});

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:19|20)\d{2})\b").expect("year pattern is valid")
});

/// Outcome of the timeliness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Freshness {
    /// The query does not ask about the current state; age is irrelevant.
    NotApplicable,
    /// No date could be read from the timestamp.
    Undated,
    Fresh { age_days: i64 },
    Stale { age_days: i64 },
}

impl Freshness {
    pub fn is_stale(self) -> bool {
        matches!(self, Freshness::Stale { .. })
    }
}

/// True when the query asks about how things are right now.
pub fn implies_current_state(query: &str) -> bool {
    CURRENT_STATE_RE.is_match(query)
}

/// Best-effort date extraction from a free-form timestamp.
///
/// A bare year resolves to the last day of that year so partial dates are never
/// judged older than they could be.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%b. %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    if let Some(caps) = ISO_DATE_RE.captures(raw) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }
    YEAR_RE
        .captures_iter(raw)
        .filter_map(|caps| caps[1].parse::<i32>().ok())
        .max()
        .and_then(|year| NaiveDate::from_ymd_opt(year, 12, 31))
}

/// Judge the age of a source relative to `today`.
pub fn assess(query: &str, timestamp: &str, today: NaiveDate, stale_after_days: i64) -> Freshness {
    if !implies_current_state(query) {
        return Freshness::NotApplicable;
    }
    let Some(published) = parse_timestamp(timestamp) else {
        return Freshness::Undated;
    };
    let age_days = (today - published).num_days().max(0);
    if age_days > stale_after_days {
        Freshness::Stale { age_days }
    } else {
        Freshness::Fresh { age_days }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn detects_current_state_queries() {
        assert!(implies_current_state("What are the burn ban rules right now?"));
        assert!(implies_current_state("Latest zoning changes in County X"));
        assert!(!implies_current_state("History of the 1998 zoning act"));
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        assert_eq!(parse_timestamp("2024-03-05"), Some(day(2024, 3, 5)));
        assert_eq!(parse_timestamp("2024-03-05T10:00:00Z"), Some(day(2024, 3, 5)));
        assert_eq!(parse_timestamp("March 5, 2024"), Some(day(2024, 3, 5)));
        assert_eq!(parse_timestamp("Last updated: 2023-11-30 by staff"), Some(day(2023, 11, 30)));
        assert_eq!(parse_timestamp("Copyright 2019-2022"), Some(day(2022, 12, 31)));
        assert_eq!(parse_timestamp("unknown"), None);
    }

    #[test]
    fn old_sources_are_stale_only_for_current_state_queries() {
        let today = day(2026, 1, 1);
        assert!(assess("current permit rules", "2020-01-01", today, 730).is_stale());
        assert_eq!(
            assess("current permit rules", "2025-06-01", today, 730),
            Freshness::Fresh { age_days: 214 }
        );
        assert_eq!(
            assess("permit rules in 2010", "2010-01-01", today, 730),
            Freshness::NotApplicable
        );
        assert_eq!(assess("rules today", "", today, 730), Freshness::Undated);
    }
}
