//! Planner configuration.
//!
//! Every struct deserializes with defaults filled in, so a partial TOML/JSON
//! document is enough.

use serde::Deserialize;

pub use crate::haversine::EstimateSpeeds;
use crate::traits::RoutePriority;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Weight per kilometer.
    pub distance_weight: f64,
    /// Weight per minute.
    pub time_weight: f64,
    /// Maximum number of 2-opt sweeps.
    pub max_iterations: usize,
    /// Stop after this many consecutive sweeps without an improving move.
    pub no_improvement_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            distance_weight: 0.3,
            time_weight: 0.7,
            max_iterations: 1000,
            no_improvement_limit: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatrixOptions {
    pub use_external_provider: bool,
    /// Concurrent provider calls per batch.
    pub batch_size: usize,
    /// Pause between batches, milliseconds.
    pub batch_delay_ms: u64,
    pub car_priority: RoutePriority,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            use_external_provider: false,
            batch_size: 3,
            batch_delay_ms: 100,
            car_priority: RoutePriority::Recommended,
        }
    }
}

/// Default active window for days without trip start/end or an override.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DayWindowConfig {
    pub start_time: String,
    pub end_time: String,
}

impl Default for DayWindowConfig {
    fn default() -> Self {
        Self {
            start_time: "10:00".to_string(),
            end_time: "20:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub search: SearchConfig,
    pub matrix: MatrixOptions,
    pub day_window: DayWindowConfig,
    pub speeds: EstimateSpeeds,
    pub check_in_duration_minutes: u32,
    /// Fewer places than this is rejected before any work is done.
    pub min_places: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            matrix: MatrixOptions::default(),
            day_window: DayWindowConfig::default(),
            speeds: EstimateSpeeds::default(),
            check_in_duration_minutes: 30,
            min_places: 2,
        }
    }
}
