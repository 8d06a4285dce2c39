//! Arrival/departure arithmetic for one day.
//!
//! Distribution and assembly both walk a day through [`DayClock`], so the times
//! the distributor packed against are the times the itinerary shows.

use crate::model::Node;

/// Times for one stop, minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timed {
    pub arrival: u32,
    pub departure: u32,
    /// For fixed stops: the earliest possible arrival when it is after the
    /// pinned start.
    pub late_arrival: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct DayClock {
    time: u32,
    check_in_duration: u32,
}

impl DayClock {
    pub fn new(start_minute: u32, check_in_duration: u32) -> Self {
        Self {
            time: start_minute,
            check_in_duration,
        }
    }

    pub fn now(&self) -> u32 {
        self.time
    }

    /// Where a visit would land without moving the clock.
    pub fn peek_visit(&self, travel: u32, node: &Node) -> Timed {
        let earliest = self.time + travel;
        match node.fixed {
            // fixed stops snap to their slot even when the traveller is late
            Some(slot) => Timed {
                arrival: slot.start_minute,
                departure: slot.end_minute,
                late_arrival: (earliest > slot.start_minute).then_some(earliest),
            },
            None => Timed {
                arrival: earliest,
                departure: earliest + node.stay_duration_minutes,
                late_arrival: None,
            },
        }
    }

    pub fn visit(&mut self, travel: u32, node: &Node) -> Timed {
        let timed = self.peek_visit(travel, node);
        self.time = timed.departure;
        timed
    }

    pub fn peek_check_in(&self, travel: u32, check_in_minute: u32) -> Timed {
        let arrival = (self.time + travel).max(check_in_minute);
        Timed {
            arrival,
            departure: arrival + self.check_in_duration,
            late_arrival: None,
        }
    }

    pub fn check_in(&mut self, travel: u32, check_in_minute: u32) -> Timed {
        let timed = self.peek_check_in(travel, check_in_minute);
        self.time = timed.departure;
        timed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinate, FixedSlot};
    use chrono::NaiveDate;

    fn place(stay: u32) -> Node {
        Node::place("p", "P", Coordinate::new(37.5, 127.0), stay)
    }

    #[test]
    fn test_visit_accumulates() {
        let mut clock = DayClock::new(600, 30);
        let first = clock.visit(15, &place(60));
        assert_eq!((first.arrival, first.departure), (615, 675));
        let second = clock.visit(10, &place(30));
        assert_eq!((second.arrival, second.departure), (685, 715));
        assert_eq!(clock.now(), 715);
    }

    #[test]
    fn test_fixed_snaps_and_flags_lateness() {
        let fixed = place(60).with_fixed(FixedSlot {
            date: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            start_minute: 840,
            end_minute: 900,
        });

        let mut early = DayClock::new(600, 30);
        let timed = early.visit(20, &fixed);
        assert_eq!(timed.arrival, 840);
        assert_eq!(timed.late_arrival, None);
        assert_eq!(early.now(), 900);

        let mut late = DayClock::new(830, 30);
        let timed = late.visit(20, &fixed);
        assert_eq!(timed.arrival, 840, "arrival stays pinned");
        assert_eq!(timed.late_arrival, Some(850));
    }

    #[test]
    fn test_check_in_waits_for_check_in_time() {
        let mut clock = DayClock::new(600, 30);
        let timed = clock.check_in(20, 900);
        assert_eq!((timed.arrival, timed.departure), (900, 930));

        let mut clock = DayClock::new(950, 30);
        let timed = clock.check_in(10, 900);
        assert_eq!(timed.arrival, 960);
    }
}
