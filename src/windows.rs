//! Per-day active windows.
//!
//! Middle days use the trip's daily window (or the configured default). The
//! first day cannot start before the trip's start time and the last day ends
//! no later than the trip's end time. Per-date overrides replace the base
//! window before those clamps apply.

use chrono::NaiveDate;

use crate::config::DayWindowConfig;
use crate::error::PlanError;
use crate::model::Trip;
use crate::time_utils::{date_range, time_to_minutes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// 1-based.
    pub day_number: u32,
    pub date: NaiveDate,
    pub start_minute: u32,
    pub end_minute: u32,
}

impl DayWindow {
    pub fn max_minutes(&self) -> u32 {
        self.end_minute.saturating_sub(self.start_minute)
    }

    pub fn contains(&self, minute: u32) -> bool {
        minute >= self.start_minute && minute < self.end_minute
    }
}

fn parse_time(value: &str, what: &str) -> Result<u32, PlanError> {
    time_to_minutes(value)
        .ok_or_else(|| PlanError::MalformedTimeWindow(format!("{} '{}' is not HH:MM", what, value)))
}

fn parse_window(start: &str, end: &str, what: &str) -> Result<(u32, u32), PlanError> {
    let start_minute = parse_time(start, what)?;
    let end_minute = parse_time(end, what)?;
    if start_minute >= end_minute {
        return Err(PlanError::MalformedTimeWindow(format!(
            "{} {}-{} ends before it starts",
            what, start, end
        )));
    }
    Ok((start_minute, end_minute))
}

/// One window per trip date, in date order.
pub fn day_windows(trip: &Trip, defaults: &DayWindowConfig) -> Result<Vec<DayWindow>, PlanError> {
    if trip.end_date < trip.start_date {
        return Err(PlanError::InvalidDateRange {
            start: trip.start_date,
            end: trip.end_date,
        });
    }

    let base = parse_window(
        trip.daily_start_time.as_deref().unwrap_or(&defaults.start_time),
        trip.daily_end_time.as_deref().unwrap_or(&defaults.end_time),
        "daily window",
    )?;
    let trip_start = trip
        .start_time
        .as_deref()
        .map(|value| parse_time(value, "trip start time"))
        .transpose()?;
    let trip_end = trip
        .end_time
        .as_deref()
        .map(|value| parse_time(value, "trip end time"))
        .transpose()?;

    let dates = date_range(trip.start_date, trip.end_date);
    let last_index = dates.len().saturating_sub(1);
    let mut windows = Vec::with_capacity(dates.len());

    for (index, date) in dates.into_iter().enumerate() {
        let (mut start_minute, mut end_minute) = match trip.day_overrides.iter().find(|o| o.date == date) {
            Some(custom) => parse_window(&custom.start_time, &custom.end_time, "day override")?,
            None => base,
        };

        if index == 0 {
            if let Some(trip_start) = trip_start {
                start_minute = start_minute.max(trip_start);
            }
        }
        if index == last_index {
            if let Some(trip_end) = trip_end {
                end_minute = end_minute.min(trip_end);
            }
        }

        windows.push(DayWindow {
            day_number: index as u32 + 1,
            date,
            start_minute,
            end_minute: end_minute.max(start_minute),
        });
    }

    Ok(windows)
}
