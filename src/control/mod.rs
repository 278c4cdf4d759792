//! Threshold control
//!
//! [`ThresholdController`] is the pure debounce rule; [`ActuatorDriver`]
//! owns the actuator state and dispatches the commands the rule emits.

mod driver;
mod threshold;

pub use driver::{ActuatorDriver, DispatchStats};
pub use threshold::ThresholdController;
