//! Actuator state and commands.

use serde::{Deserialize, Serialize};

/// Whether the external device (fan, relay) is currently switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuatorState {
    pub active: bool,
}

impl ActuatorState {
    pub const INACTIVE: Self = Self { active: false };
    pub const ACTIVE: Self = Self { active: true };
}

/// Edge command sent to the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActuatorCommand {
    Activate,
    Deactivate,
}

impl ActuatorCommand {
    /// State the actuator is in once this command has been dispatched.
    pub fn resulting_state(self) -> ActuatorState {
        match self {
            ActuatorCommand::Activate => ActuatorState::ACTIVE,
            ActuatorCommand::Deactivate => ActuatorState::INACTIVE,
        }
    }
}

impl std::fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActuatorCommand::Activate => write!(f, "activate"),
            ActuatorCommand::Deactivate => write!(f, "deactivate"),
        }
    }
}
