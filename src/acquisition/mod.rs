//! Thermal sensor acquisition
//!
//! A [`SensorSource`] yields one 2-D temperature grid per call. The
//! [`Sampler`] wraps a source with a read timeout and reduces each grid to a
//! timestamped scalar [`Reading`](crate::types::Reading).
//!
//! Sources:
//! - [`SimulatedSensor`]: 8x8 synthetic array for bench runs
//! - [`ProcessSensor`]: helper process printing one JSON grid per line
//! - [`ScriptedSensor`]: fixed sequence of frames and faults

mod process_source;
mod sampler;
mod scripted;
mod simulated;

pub use process_source::ProcessSensor;
pub use sampler::Sampler;
pub use scripted::{ScriptStep, ScriptedSensor};
pub use simulated::SimulatedSensor;

use crate::types::ThermalGrid;
use async_trait::async_trait;
use thiserror::Error;

/// Transient sensor failures. The scheduler skips the tick on any of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensorFault {
    #[error("Sensor read timed out")]
    Timeout,

    #[error("Sensor returned an empty or non-finite grid")]
    InvalidGrid,

    #[error("Sensor source error: {0}")]
    Source(String),

    #[error("Sensor source closed")]
    Closed,
}

/// Where thermal frames come from.
///
/// Implementations own their transport. Timeouts are applied by the caller,
/// so `read_grid` may block for as long as the device takes.
#[async_trait]
pub trait SensorSource: Send + Sync + 'static {
    /// Prepare the source. Failure here is a startup error.
    async fn connect(&mut self) -> Result<(), SensorFault> {
        Ok(())
    }

    /// Read one frame.
    async fn read_grid(&mut self) -> Result<ThermalGrid, SensorFault>;

    /// Human-readable name for logging (e.g. "simulated", "process").
    fn source_name(&self) -> &str;
}
