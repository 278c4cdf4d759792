//! Completed-cycle records.

use serde::{Deserialize, Serialize};

/// Result of one completed cycle.
///
/// Created once, appended to the history store, never mutated. Cycle numbers
/// start at 1 and increase by exactly 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle: u64,
    /// Mean of the window's readings (°C)
    pub avg_temp: f64,
    /// Forecast for one horizon past the window (°C)
    pub predicted_temp: f64,
    /// Whether the prediction exceeded the threshold
    #[serde(default)]
    pub breach: bool,
}

impl CycleRecord {
    pub fn new(cycle: u64, avg_temp: f64, predicted_temp: f64, threshold: f64) -> Self {
        Self {
            cycle,
            avg_temp,
            predicted_temp,
            breach: predicted_temp > threshold,
        }
    }
}
