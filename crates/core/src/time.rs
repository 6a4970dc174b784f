//! Timestamp helpers
//!
//! Relative age labels for "last saved" style status lines.

use chrono::{DateTime, Datelike, Utc};

/// Whole calendar months between two instants (`then <= now`)
fn months_between(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let mut months = (now.year() as i64 - then.year() as i64) * 12
        + (now.month() as i64 - then.month() as i64);
    if now.day() < then.day() {
        months -= 1;
    }
    months.max(0)
}

/// Label the age of `then` relative to `now`
///
/// Produces `"just now"` under a minute, then `"5m ago"`, `"3h ago"`,
/// `"2d ago"`, `"4mo ago"`, `"1y ago"`. Future instants read as
/// `"just now"`.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);

    if elapsed.num_seconds() < 60 {
        return "just now".to_string();
    }
    let minutes = elapsed.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    let days = elapsed.num_days();
    if days < 30 {
        return format!("{}d ago", days);
    }
    let months = months_between(then, now).max(1);
    if months < 12 {
        return format!("{}mo ago", months);
    }
    format!("{}y ago", months / 12)
}
