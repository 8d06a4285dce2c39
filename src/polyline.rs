//! Polyline representation for route geometries.
//!
//! Paths are kept as decoded coordinate sequences while being built and
//! stored in the compact encoded form (Google polyline algorithm, 5 decimal
//! places) on `TravelCostEntry`.

use serde::{Deserialize, Serialize};

use crate::model::Coordinate;

const PRECISION: f64 = 1e5;

/// A polyline representing a route geometry as decoded coordinates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

impl Polyline {
    /// Each point is a (latitude, longitude) tuple.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn from_coordinates(coordinates: &[Coordinate]) -> Self {
        Self::new(coordinates.iter().map(Coordinate::as_tuple).collect())
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn into_points(self) -> Vec<(f64, f64)> {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append another path, dropping its first point when it repeats our last.
    pub fn extend(&mut self, other: &Polyline) {
        let mut rest = other.points.as_slice();
        if let (Some(last), Some(first)) = (self.points.last(), rest.first()) {
            if encode_value(last.0) == encode_value(first.0)
                && encode_value(last.1) == encode_value(first.1)
            {
                rest = &rest[1..];
            }
        }
        self.points.extend_from_slice(rest);
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        let mut prev_lat = 0i64;
        let mut prev_lng = 0i64;
        for &(lat, lng) in &self.points {
            let lat = encode_value(lat);
            let lng = encode_value(lng);
            push_signed(&mut out, lat - prev_lat);
            push_signed(&mut out, lng - prev_lng);
            prev_lat = lat;
            prev_lng = lng;
        }
        out
    }

    /// Decode an encoded polyline. Returns `None` on truncated input.
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = encoded.as_bytes();
        let mut cursor = 0;
        let mut lat = 0i64;
        let mut lng = 0i64;
        let mut points = Vec::new();
        while cursor < bytes.len() {
            lat += read_signed(bytes, &mut cursor)?;
            lng += read_signed(bytes, &mut cursor)?;
            points.push((lat as f64 / PRECISION, lng as f64 / PRECISION));
        }
        Some(Self { points })
    }
}

fn encode_value(value: f64) -> i64 {
    (value * PRECISION).round() as i64
}

fn push_signed(out: &mut String, delta: i64) {
    let shifted = if delta < 0 { !(delta << 1) } else { delta << 1 };
    let mut value = shifted as u64;
    while value >= 0x20 {
        out.push(((0x20 | (value & 0x1f)) as u8 + 63) as char);
        value >>= 5;
    }
    out.push((value as u8 + 63) as char);
}

fn read_signed(bytes: &[u8], cursor: &mut usize) -> Option<i64> {
    let mut result = 0u64;
    let mut shift = 0;
    loop {
        let byte = (*bytes.get(*cursor)?).checked_sub(63)? as u64;
        *cursor += 1;
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
        if shift > 60 {
            return None;
        }
    }
    let value = (result >> 1) as i64;
    Some(if result & 1 == 1 { !value } else { value })
}
