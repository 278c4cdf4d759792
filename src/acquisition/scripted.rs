//! Scripted sensor for tests and replays.

use super::{SensorFault, SensorSource};
use crate::types::ThermalGrid;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

/// One scripted sensor response.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Grid(ThermalGrid),
    Fault(SensorFault),
    /// Wait before answering with the grid, to exercise read timeouts.
    Stall(Duration, ThermalGrid),
}

/// Plays back a fixed sequence of steps, then reports [`SensorFault::Closed`].
pub struct ScriptedSensor {
    steps: VecDeque<ScriptStep>,
}

impl ScriptedSensor {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SensorSource for ScriptedSensor {
    async fn read_grid(&mut self) -> Result<ThermalGrid, SensorFault> {
        match self.steps.pop_front() {
            Some(ScriptStep::Grid(grid)) => Ok(grid),
            Some(ScriptStep::Fault(fault)) => Err(fault),
            Some(ScriptStep::Stall(delay, grid)) => {
                tokio::time::sleep(delay).await;
                Ok(grid)
            }
            None => Err(SensorFault::Closed),
        }
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}
