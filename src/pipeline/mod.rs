//! Sampling-and-control pipeline
//!
//! ```text
//! SensorSource → Sampler → ThresholdController → ActuatorLink
//!                    ↓
//!               Forecaster → HistoryStore → MonitorState → StatusAPI
//! ```
//!
//! [`CycleScheduler`] runs on a single task and owns every mutable part of
//! the loop. It publishes into [`MonitorState`] behind `Arc<RwLock<>>`.

mod state;
pub mod scheduler;

pub use scheduler::{remaining, CycleOutcome, CycleScheduler, SchedulerStats};
pub use state::*;
