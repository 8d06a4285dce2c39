//! Input validation. Everything here runs before any routing work starts.

use std::collections::HashMap;

use tracing::warn;

use crate::error::PlanError;
use crate::model::{FixedSchedule, FixedSlot, Place};
use crate::time_utils::{intervals_overlap, minutes_to_time, time_to_minutes};
use crate::windows::DayWindow;

pub fn validate_place_count(places: &[Place], min_places: usize) -> Result<(), PlanError> {
    if places.len() < min_places {
        return Err(PlanError::InsufficientPlaces {
            required: min_places,
            found: places.len(),
        });
    }
    Ok(())
}

/// Resolve fixed schedules into slots keyed by place id.
///
/// The end of each slot is start + the place's stay duration. A place with
/// more than one fixed schedule keeps the first.
pub fn validate_fixed_schedules(
    schedules: &[FixedSchedule],
    places: &[Place],
    windows: &[DayWindow],
) -> Result<HashMap<String, FixedSlot>, PlanError> {
    let stays: HashMap<&str, u32> = places
        .iter()
        .map(|place| (place.id.as_str(), place.stay_duration_minutes))
        .collect();

    let mut slots: HashMap<String, FixedSlot> = HashMap::new();
    let mut ordered: Vec<(&str, FixedSlot)> = Vec::new();

    for schedule in schedules {
        let Some(&stay) = stays.get(schedule.place_id.as_str()) else {
            return Err(PlanError::UnknownFixedPlace(schedule.place_id.clone()));
        };
        if !windows.iter().any(|window| window.date == schedule.date) {
            return Err(PlanError::FixedScheduleOutOfRange {
                place_id: schedule.place_id.clone(),
                date: schedule.date,
            });
        }
        let start_minute = time_to_minutes(&schedule.start_time).ok_or_else(|| {
            PlanError::MalformedTimeWindow(format!(
                "fixed start '{}' for {} is not HH:MM",
                schedule.start_time, schedule.place_id
            ))
        })?;

        if slots.contains_key(&schedule.place_id) {
            warn!(place_id = %schedule.place_id, "ignoring extra fixed schedule for place");
            continue;
        }

        let slot = FixedSlot {
            date: schedule.date,
            start_minute,
            end_minute: start_minute + stay,
        };
        slots.insert(schedule.place_id.clone(), slot);
        ordered.push((schedule.place_id.as_str(), slot));
    }

    for (index, (first_id, first)) in ordered.iter().enumerate() {
        for (second_id, second) in &ordered[index + 1..] {
            if first.date == second.date
                && intervals_overlap(
                    (first.start_minute, first.end_minute),
                    (second.start_minute, second.end_minute),
                )
            {
                return Err(PlanError::FixedScheduleOverlap {
                    date: first.date,
                    first: format!(
                        "{} ({}-{})",
                        first_id,
                        minutes_to_time(first.start_minute),
                        minutes_to_time(first.end_minute)
                    ),
                    second: format!(
                        "{} ({}-{})",
                        second_id,
                        minutes_to_time(second.start_minute),
                        minutes_to_time(second.end_minute)
                    ),
                });
            }
        }
    }

    Ok(slots)
}
