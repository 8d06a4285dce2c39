//! Time-of-day and calendar helpers.
//!
//! Times of day are carried as minutes since midnight (`u32`) inside the
//! planner and rendered as `HH:MM` strings at the itinerary boundary.

use chrono::{Duration, NaiveDate};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parse an `HH:MM` (or `HH:MM:SS`) string into minutes since midnight.
///
/// Returns `None` for anything malformed or out of range. `24:00` is accepted
/// as end-of-day.
pub fn time_to_minutes(value: &str) -> Option<u32> {
    let mut parts = value.trim().split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    if let Some(seconds) = parts.next() {
        let seconds: u32 = seconds.parse().ok()?;
        if seconds >= 60 {
            return None;
        }
    }
    if parts.next().is_some() || minutes >= 60 {
        return None;
    }
    if hours > 24 || (hours == 24 && minutes > 0) {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Render minutes since midnight as `HH:MM`, wrapping past midnight.
pub fn minutes_to_time(minutes: u32) -> String {
    let wrapped = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", wrapped / 60, wrapped % 60)
}

/// Render a window bound. Unlike [`minutes_to_time`], end-of-day stays
/// `24:00` so the bound parses back to the same minute.
pub fn window_bound_to_time(minutes: u32) -> String {
    if minutes == MINUTES_PER_DAY {
        return "24:00".to_string();
    }
    minutes_to_time(minutes)
}

/// Every date from `start` to `end`, inclusive. Empty when `end < start`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(current);
        current += Duration::days(1);
    }
    dates
}

/// Half-open interval overlap check on minute ranges.
pub fn intervals_overlap(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 < b.1 && b.0 < a.1
}
