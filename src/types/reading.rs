//! Sensor frames and scalar readings.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One frame from the thermal array, row-major, °C per cell.
///
/// Serializes as a bare nested array so helper processes can emit
/// `[[30.1, 30.4, ...], ...]` directly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThermalGrid {
    cells: Vec<Vec<f64>>,
}

impl ThermalGrid {
    pub fn new(cells: Vec<Vec<f64>>) -> Self {
        Self { cells }
    }

    /// Grid of `rows` x `cols` cells all at `value`.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            cells: vec![vec![value; cols]; rows],
        }
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.cells
    }

    pub fn cell_count(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    /// `(rows, cols)` of the first row; ragged grids report their first row.
    pub fn dims(&self) -> (usize, usize) {
        (self.cells.len(), self.cells.first().map_or(0, Vec::len))
    }

    fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.cells.iter().flatten().copied()
    }

    /// Arithmetic mean over every cell, `None` for an empty grid.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<f64> {
        let n = self.cell_count();
        if n == 0 {
            return None;
        }
        Some(self.values().sum::<f64>() / n as f64)
    }

    /// True when at least one cell exists and every cell is finite.
    pub fn is_usable(&self) -> bool {
        self.cell_count() > 0 && self.values().all(f64::is_finite)
    }

    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.values().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Min-max normalise every cell into 0..=255 for heat-map display.
    ///
    /// A flat grid maps to all zeros.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn intensities(&self) -> Vec<Vec<u8>> {
        let Some((lo, hi)) = self.min_max() else {
            return Vec::new();
        };
        let span = hi - lo;
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| {
                        if span <= f64::EPSILON {
                            0
                        } else {
                            ((v - lo) / span * 255.0).round().clamp(0.0, 255.0) as u8
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// Scalar reduction of one grid, stamped with local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Local>,
    /// Mean cell temperature (°C)
    pub value: f64,
}

impl Reading {
    pub fn new(value: f64) -> Self {
        Self {
            timestamp: Local::now(),
            value,
        }
    }
}

/// Arithmetic mean of a slice, `None` when empty.
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
