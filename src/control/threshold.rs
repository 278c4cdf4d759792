use crate::types::{ActuatorCommand, ActuatorState};

/// Edge-triggered threshold rule.
///
/// A command is emitted only when the reading crosses the threshold relative
/// to the current actuator state, so a sustained condition never repeats it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdController {
    threshold: f64,
}

impl ThresholdController {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Next state and the command to get there, if any.
    ///
    /// `reading > threshold` activates; `reading <= threshold` deactivates.
    pub fn evaluate(
        &self,
        reading: f64,
        state: ActuatorState,
    ) -> (ActuatorState, Option<ActuatorCommand>) {
        let exceeded = reading > self.threshold;
        match (exceeded, state.active) {
            (true, false) => (ActuatorState::ACTIVE, Some(ActuatorCommand::Activate)),
            (false, true) => (ActuatorState::INACTIVE, Some(ActuatorCommand::Deactivate)),
            _ => (state, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_activate_then_hold() {
        let c = ThresholdController::new(35.0);
        let (state, cmd) = c.evaluate(36.2, ActuatorState::INACTIVE);
        assert_eq!(cmd, Some(ActuatorCommand::Activate));
        assert!(state.active);

        let (state, cmd) = c.evaluate(37.0, state);
        assert_eq!(cmd, None);
        assert!(state.active);
    }

    #[test]
    fn test_exactly_threshold_is_not_exceeded() {
        let c = ThresholdController::new(35.0);
        assert_eq!(c.evaluate(35.0, ActuatorState::INACTIVE), (ActuatorState::INACTIVE, None));
        assert_eq!(
            c.evaluate(35.0, ActuatorState::ACTIVE),
            (ActuatorState::INACTIVE, Some(ActuatorCommand::Deactivate))
        );
    }

    #[test]
    fn test_commands_only_on_edges() {
        let c = ThresholdController::new(35.0);
        let mut rng = StdRng::seed_from_u64(0x7e57);

        for _ in 0..200 {
            let readings: Vec<f64> = (0..50).map(|_| rng.gen_range(30.0..40.0)).collect();
            let mut state = ActuatorState::INACTIVE;
            let mut prev_exceeded = false;

            for r in readings {
                let exceeded = r > 35.0;
                let (next, cmd) = c.evaluate(r, state);
                // A command fires iff the exceeded-ness flips
                assert_eq!(cmd.is_some(), exceeded != prev_exceeded, "reading {r}");
                if let Some(cmd) = cmd {
                    assert_eq!(next, cmd.resulting_state());
                }
                assert_eq!(next.active, exceeded);
                state = next;
                prev_exceeded = exceeded;
            }
        }
    }

    #[test]
    fn test_commands_alternate() {
        let c = ThresholdController::new(35.0);
        let mut state = ActuatorState::INACTIVE;
        let mut emitted = Vec::new();
        for r in [30.0, 36.0, 36.0, 34.0, 34.0, 40.0, 20.0] {
            let (next, cmd) = c.evaluate(r, state);
            emitted.extend(cmd);
            state = next;
        }
        assert_eq!(
            emitted,
            vec![
                ActuatorCommand::Activate,
                ActuatorCommand::Deactivate,
                ActuatorCommand::Activate,
                ActuatorCommand::Deactivate,
            ]
        );
    }
}
