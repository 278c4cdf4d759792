//! Shared data structures for the thermal monitoring loop
//!
//! - `ThermalGrid`, `Reading`: one sensor frame and its scalar reduction
//! - `CycleRecord`: the immutable result of one completed cycle
//! - `ActuatorState`, `ActuatorCommand`: the debounced actuator model

mod actuator;
mod cycle;
mod reading;

pub use actuator::*;
pub use cycle::*;
pub use reading::*;
