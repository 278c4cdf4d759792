//! Synthetic 8x8 thermal array.

use super::{SensorFault, SensorSource};
use crate::types::ThermalGrid;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

/// Frames per full drift oscillation.
const DRIFT_PERIOD_FRAMES: f64 = 1800.0;

/// Peak drift above and below the base temperature (°C).
const DRIFT_AMPLITUDE_C: f64 = 6.0;

/// Per-cell noise standard deviation (°C).
const CELL_NOISE_SD: f64 = 0.25;

/// Extra heat at the centre of the array (°C), fades towards the edges.
const HOTSPOT_C: f64 = 1.5;

/// Simulated AMG88xx-style array.
///
/// Temperature follows a slow sine around `base_c` with Gaussian per-cell
/// noise and a mild central hot spot, so the loop sees both activations and
/// resets over a long run.
pub struct SimulatedSensor {
    rows: usize,
    cols: usize,
    base_c: f64,
    frame: u64,
    rng: StdRng,
}

impl SimulatedSensor {
    pub fn new(rows: usize, cols: usize, base_c: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rows,
            cols,
            base_c,
            frame: 0,
            rng,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn drift(&self) -> f64 {
        let phase = self.frame as f64 / DRIFT_PERIOD_FRAMES * std::f64::consts::TAU;
        DRIFT_AMPLITUDE_C * phase.sin()
    }

    #[allow(clippy::cast_precision_loss)]
    fn hotspot(&self, row: usize, col: usize) -> f64 {
        let cy = (self.rows as f64 - 1.0) / 2.0;
        let cx = (self.cols as f64 - 1.0) / 2.0;
        let dist = ((row as f64 - cy).powi(2) + (col as f64 - cx).powi(2)).sqrt();
        let max_dist = (cy.powi(2) + cx.powi(2)).sqrt().max(1.0);
        HOTSPOT_C * (1.0 - dist / max_dist)
    }
}

#[async_trait]
impl SensorSource for SimulatedSensor {
    async fn read_grid(&mut self) -> Result<ThermalGrid, SensorFault> {
        let level = self.base_c + self.drift();
        let mut cells = Vec::with_capacity(self.rows);
        for r in 0..self.rows {
            let mut row = Vec::with_capacity(self.cols);
            for c in 0..self.cols {
                let z: f64 = StandardNormal.sample(&mut self.rng);
                row.push(level + self.hotspot(r, c) + z * CELL_NOISE_SD);
            }
            cells.push(row);
        }
        self.frame = self.frame.wrapping_add(1);
        Ok(ThermalGrid::new(cells))
    }

    fn source_name(&self) -> &str {
        "simulated"
    }
}
