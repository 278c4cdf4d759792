//! thermowatch - thermal array monitor
//!
//! Samples an 8x8 thermal array once per tick, averages each gathering
//! window, forecasts the trend ten minutes ahead and drives an actuator when
//! the temperature crosses a threshold. Completed cycles are appended to a
//! durable CSV log and served to a small dashboard.
//!
//! This library crate exposes the modules for integration tests; the binary
//! in `main.rs` wires them together.

pub mod acquisition;
pub mod actuator;
pub mod api;
pub mod background;
pub mod config;
pub mod control;
pub mod forecast;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use acquisition::{Sampler, SensorFault, SensorSource};
pub use actuator::{ActuatorFault, ActuatorLink};
pub use config::MonitorConfig;
pub use control::{ActuatorDriver, ThresholdController};
pub use forecast::Forecaster;
pub use pipeline::{CycleScheduler, MonitorState, StatusSnapshot};
pub use storage::{HistoryStore, PersistenceFault};
pub use types::{ActuatorCommand, ActuatorState, CycleRecord, Reading, ThermalGrid};
