use std::fmt;

use serde::{Deserialize, Serialize};

/// One reading of the page's loop counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub time: f64,
    pub distance: f64,
}

impl Observation {
    pub const fn new(time: f64, distance: f64) -> Self {
        Self { time, distance }
    }

    /// True when both counters are strictly below `baseline`.
    pub fn both_decreased_from(&self, baseline: &Observation) -> bool {
        self.time < baseline.time && self.distance < baseline.distance
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "time={} distance={}", self.time, self.distance)
    }
}

/// Renders a counter the way the page reports it: integral values without a trailing `.0`.
pub fn format_reading(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
