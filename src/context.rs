//! Per-run trip context: node arena, day windows and lodging lookups.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::model::{
    Accommodation, FixedSchedule, Node, NodeTable, Place, TravelMode, Trip, DESTINATION_ID, ORIGIN_ID,
};
use crate::time_utils::{date_range, time_to_minutes};
use crate::validate::{validate_fixed_schedules, validate_place_count};
use crate::windows::{day_windows, DayWindow};

/// A check-in happening on a given date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckIn {
    pub accommodation: usize,
    pub minute: u32,
}

/// date → accommodation lookups.
#[derive(Debug, Clone, Default)]
pub struct LodgingTable {
    nights: HashMap<NaiveDate, usize>,
    check_ins: HashMap<NaiveDate, CheckIn>,
}

impl LodgingTable {
    pub fn from_accommodations(accommodations: &[Accommodation]) -> Result<Self, PlanError> {
        let mut table = Self::default();
        for (index, stay) in accommodations.iter().enumerate() {
            if stay.check_out_date <= stay.check_in_date {
                return Err(PlanError::InvalidDateRange {
                    start: stay.check_in_date,
                    end: stay.check_out_date,
                });
            }
            // the check-out morning is not a night at this accommodation
            let nights = date_range(stay.check_in_date, stay.check_out_date);
            for night in &nights[..nights.len() - 1] {
                table.nights.entry(*night).or_insert(index);
            }
            if let Some(time) = &stay.check_in_time {
                let minute = time_to_minutes(time).ok_or_else(|| {
                    PlanError::MalformedTimeWindow(format!(
                        "check-in time '{}' for {} is not HH:MM",
                        time, stay.name
                    ))
                })?;
                table.check_ins.entry(stay.check_in_date).or_insert(CheckIn {
                    accommodation: index,
                    minute,
                });
            }
        }
        Ok(table)
    }

    /// Accommodation slept at on the night of `date`.
    pub fn night(&self, date: NaiveDate) -> Option<usize> {
        self.nights.get(&date).copied()
    }

    pub fn check_in(&self, date: NaiveDate) -> Option<CheckIn> {
        self.check_ins.get(&date).copied()
    }
}

/// Everything the engines need for one trip, built once per run.
#[derive(Debug, Clone)]
pub struct TripContext {
    pub trip_id: String,
    pub mode: TravelMode,
    pub nodes: NodeTable,
    pub windows: Vec<DayWindow>,
    pub lodging: LodgingTable,
    pub origin_id: Option<String>,
    pub destination_id: Option<String>,
    pub check_in_duration: u32,
}

impl TripContext {
    /// Validate the inputs and build the arena. No partial context is ever
    /// returned.
    pub fn build(
        trip: &Trip,
        places: &[Place],
        fixed_schedules: &[FixedSchedule],
        config: &PlannerConfig,
    ) -> Result<Self, PlanError> {
        validate_place_count(places, config.min_places)?;
        let windows = day_windows(trip, &config.day_window)?;
        let slots = validate_fixed_schedules(fixed_schedules, places, &windows)?;
        let lodging = LodgingTable::from_accommodations(&trip.accommodations)?;

        let mut nodes = Vec::with_capacity(places.len() + trip.accommodations.len() + 2);
        if let Some(origin) = &trip.origin {
            nodes.push(Node::origin(origin.name.clone(), origin.coordinate));
        }
        if let Some(destination) = &trip.destination {
            nodes.push(Node::destination(destination.name.clone(), destination.coordinate));
        }
        for (index, stay) in trip.accommodations.iter().enumerate() {
            nodes.push(Node::accommodation(index, stay.name.clone(), stay.coordinate));
        }
        for place in places {
            let mut node = Node::place(
                place.id.clone(),
                place.name.clone(),
                place.coordinate,
                place.stay_duration_minutes,
            )
            .with_priority(place.priority);
            if let Some(slot) = slots.get(&place.id) {
                node = node.with_fixed(*slot);
            }
            nodes.push(node);
        }

        Ok(Self {
            trip_id: trip.id.clone(),
            mode: trip.transport_mode,
            nodes: NodeTable::from_nodes(nodes)?,
            windows,
            lodging,
            origin_id: trip.origin.as_ref().map(|_| ORIGIN_ID.to_string()),
            destination_id: trip.destination.as_ref().map(|_| DESTINATION_ID.to_string()),
            check_in_duration: config.check_in_duration_minutes,
        })
    }

    pub fn window_for(&self, date: NaiveDate) -> Option<&DayWindow> {
        self.windows.iter().find(|window| window.date == date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinate, TripEndpoint, TripStatus};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, day).unwrap()
    }

    fn hotel(check_in: u32, check_out: u32, time: Option<&str>) -> Accommodation {
        Accommodation {
            name: format!("Hotel {}", check_in),
            coordinate: Coordinate::new(37.56, 126.98),
            check_in_date: date(check_in),
            check_out_date: date(check_out),
            check_in_time: time.map(String::from),
        }
    }

    #[test]
    fn test_lodging_nights_exclude_checkout() {
        let table = LodgingTable::from_accommodations(&[hotel(1, 3, Some("15:00")), hotel(3, 4, None)])
            .unwrap();
        assert_eq!(table.night(date(1)), Some(0));
        assert_eq!(table.night(date(2)), Some(0));
        assert_eq!(table.night(date(3)), Some(1));
        assert_eq!(table.night(date(4)), None);
        assert_eq!(
            table.check_in(date(1)),
            Some(CheckIn {
                accommodation: 0,
                minute: 900
            })
        );
        assert_eq!(table.check_in(date(3)), None, "no check-in time given");
    }

    #[test]
    fn test_lodging_rejects_inverted_stay() {
        assert!(LodgingTable::from_accommodations(&[hotel(3, 3, None)]).is_err());
    }

    #[test]
    fn test_build_registers_anchors() {
        let trip = Trip {
            id: "t".into(),
            start_date: date(1),
            end_date: date(2),
            start_time: None,
            end_time: None,
            origin: Some(TripEndpoint {
                name: "Seoul Station".into(),
                coordinate: Coordinate::new(37.5547, 126.9707),
            }),
            destination: None,
            transport_mode: TravelMode::Public,
            accommodations: vec![hotel(1, 2, Some("15:00"))],
            daily_start_time: None,
            daily_end_time: None,
            day_overrides: Vec::new(),
            status: TripStatus::Draft,
        };
        let places = vec![
            Place {
                id: "p1".into(),
                name: "Palace".into(),
                coordinate: Coordinate::new(37.5796, 126.9770),
                stay_duration_minutes: 90,
                priority: 0,
            },
            Place {
                id: "p2".into(),
                name: "Tower".into(),
                coordinate: Coordinate::new(37.5512, 126.9882),
                stay_duration_minutes: 60,
                priority: 1,
            },
        ];
        let context = TripContext::build(&trip, &places, &[], &PlannerConfig::default()).unwrap();
        assert_eq!(context.origin_id.as_deref(), Some(ORIGIN_ID));
        assert!(context.destination_id.is_none());
        assert!(context.nodes.contains("__accommodation_0__"));
        assert_eq!(context.nodes.places().count(), 2);
        assert_eq!(context.windows.len(), 2);
    }
}
