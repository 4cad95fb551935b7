//! Time rounding and path parsing helpers.
//!
//! Segments are hour-aligned, so requested windows round outward to hour
//! boundaries: start floors, end ceils.

use chrono::{DateTime, DurationRound, TimeDelta, TimeZone, Utc};

/// Floor a timestamp to the start of its hour.
pub fn floor_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    // Truncation only fails at the edges of the representable range.
    t.duration_trunc(TimeDelta::hours(1)).unwrap_or(t)
}

/// Ceil a timestamp to the next hour boundary; already-aligned values are
/// unchanged.
pub fn ceil_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    let floored = floor_to_hour(t);
    if floored == t {
        t
    } else {
        floored + TimeDelta::hours(1)
    }
}

/// Host part of a URL, with scheme and path stripped.
///
/// Total: malformed input falls back to the input itself, and mismatches
/// then surface as a host comparison failure rather than a parse error.
pub fn host_of(url: &str) -> &str {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or(url)
}

/// Parse the timestamp encoded in a segment manifest path of the form
/// `idx/segments/YYYY/MM/DD/HHMM/meta.json`.
pub fn parse_segment_timestamp(path: &str) -> Option<DateTime<Utc>> {
    let mut parts = path.split('/');
    if parts.next() != Some("idx") || parts.next() != Some("segments") {
        return None;
    }
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    let hhmm: u32 = parts.next()?.parse().ok()?;
    Utc.with_ymd_and_hms(year, month, day, hhmm / 100, hhmm % 100, 0)
        .single()
}
