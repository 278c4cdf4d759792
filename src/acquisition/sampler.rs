//! Timed sampling of a sensor source.

use super::{SensorFault, SensorSource};
use crate::types::{Reading, ThermalGrid};
use std::time::Duration;

/// Pulls one grid per call under a timeout and reduces it to its mean.
///
/// No retries: a failed sample is reported to the caller, which skips the
/// tick.
pub struct Sampler {
    source: Box<dyn SensorSource>,
    read_timeout: Duration,
    latest_grid: Option<ThermalGrid>,
}

impl Sampler {
    pub fn new(source: Box<dyn SensorSource>, read_timeout: Duration) -> Self {
        Self {
            source,
            read_timeout,
            latest_grid: None,
        }
    }

    pub async fn connect(&mut self) -> Result<(), SensorFault> {
        self.source.connect().await
    }

    /// Take one reading.
    pub async fn sample(&mut self) -> Result<Reading, SensorFault> {
        let grid = match tokio::time::timeout(self.read_timeout, self.source.read_grid()).await {
            Ok(result) => result?,
            Err(_) => return Err(SensorFault::Timeout),
        };

        let (reading, grid) = Self::reduce(grid)?;
        self.latest_grid = Some(grid);
        Ok(reading)
    }

    fn reduce(grid: ThermalGrid) -> Result<(Reading, ThermalGrid), SensorFault> {
        if !grid.is_usable() {
            return Err(SensorFault::InvalidGrid);
        }
        let value = grid.mean().ok_or(SensorFault::InvalidGrid)?;
        Ok((Reading::new(value), grid))
    }

    /// Grid behind the most recent successful reading.
    pub fn latest_grid(&self) -> Option<&ThermalGrid> {
        self.latest_grid.as_ref()
    }

    pub fn source_name(&self) -> &str {
        self.source.source_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{ScriptStep, ScriptedSensor};

    fn sampler(steps: Vec<ScriptStep>) -> Sampler {
        Sampler::new(Box::new(ScriptedSensor::new(steps)), Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_sample_reduces_to_mean() {
        let grid = ThermalGrid::new(vec![vec![30.0, 32.0], vec![34.0, 36.0]]);
        let mut s = sampler(vec![ScriptStep::Grid(grid.clone())]);
        let reading = s.sample().await.unwrap();
        assert_eq!(reading.value, 33.0);
        assert_eq!(s.latest_grid(), Some(&grid));
    }

    #[tokio::test]
    async fn test_empty_grid_is_invalid() {
        let mut s = sampler(vec![ScriptStep::Grid(ThermalGrid::default())]);
        assert_eq!(s.sample().await, Err(SensorFault::InvalidGrid));
        assert!(s.latest_grid().is_none());
    }

    #[tokio::test]
    async fn test_non_finite_cell_is_invalid() {
        let grid = ThermalGrid::new(vec![vec![30.0, f64::INFINITY]]);
        let mut s = sampler(vec![ScriptStep::Grid(grid)]);
        assert_eq!(s.sample().await, Err(SensorFault::InvalidGrid));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let mut s = sampler(vec![ScriptStep::Stall(
            Duration::from_secs(5),
            ThermalGrid::filled(1, 1, 30.0),
        )]);
        assert_eq!(s.sample().await, Err(SensorFault::Timeout));
        assert!(s.latest_grid().is_none());
    }

    #[tokio::test]
    async fn test_source_fault_passes_through() {
        let mut s = sampler(vec![ScriptStep::Fault(SensorFault::Source("i2c nack".into()))]);
        assert_eq!(s.sample().await, Err(SensorFault::Source("i2c nack".into())));
        // Exhausted script
        assert_eq!(s.sample().await, Err(SensorFault::Closed));
    }
}
