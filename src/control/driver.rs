//! Actuator driver: debounce rule + command dispatch.

use super::ThresholdController;
use crate::actuator::{ActuatorFault, ActuatorLink, CommandSet};
use crate::types::{ActuatorCommand, ActuatorState};
use serde::Serialize;
use std::time::Duration;

/// Upper bound on re-opening the link inside a dispatch, settle delay included.
const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Dispatch counters, published with the status snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub commands_sent: u64,
    pub dispatch_failures: u64,
    pub responses: u64,
}

/// Owns the single [`ActuatorState`] and the link it is driven over.
///
/// State changes only when a command is written successfully. A failed
/// dispatch leaves the state as it was, so the next evaluation issues the
/// same command again.
pub struct ActuatorDriver {
    controller: ThresholdController,
    link: Box<dyn ActuatorLink>,
    commands: CommandSet,
    state: ActuatorState,
    write_timeout: Duration,
    response_timeout: Duration,
    reconnect_timeout: Duration,
    stats: DispatchStats,
}

impl ActuatorDriver {
    pub fn new(
        controller: ThresholdController,
        link: Box<dyn ActuatorLink>,
        commands: CommandSet,
        write_timeout: Duration,
        response_timeout: Duration,
    ) -> Self {
        Self {
            controller,
            link,
            commands,
            state: ActuatorState::INACTIVE,
            write_timeout,
            response_timeout,
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
            stats: DispatchStats::default(),
        }
    }

    /// Bound a reconnect attempt made while dispatching.
    pub fn with_reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.reconnect_timeout = timeout;
        self
    }

    pub async fn connect(&mut self) -> Result<(), ActuatorFault> {
        self.link.connect().await
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn threshold(&self) -> f64 {
        self.controller.threshold()
    }

    /// Evaluate `value` and dispatch the resulting command, if any.
    ///
    /// Returns the command that was delivered, `Ok(None)` when the rule
    /// emitted nothing.
    pub async fn evaluate(&mut self, value: f64) -> Result<Option<ActuatorCommand>, ActuatorFault> {
        let (next, command) = self.controller.evaluate(value, self.state);
        let Some(command) = command else {
            return Ok(None);
        };

        if let Err(fault) = self.dispatch(command).await {
            self.stats.dispatch_failures += 1;
            tracing::warn!(
                command = %command,
                value = value,
                error = %fault,
                "Actuator dispatch failed, state unchanged"
            );
            return Err(fault);
        }

        self.state = next;
        self.stats.commands_sent += 1;
        tracing::info!(
            command = %command,
            value = value,
            threshold = self.controller.threshold(),
            active = self.state.active,
            "Actuator command sent"
        );

        self.read_response(command).await;
        Ok(Some(command))
    }

    async fn dispatch(&mut self, command: ActuatorCommand) -> Result<(), ActuatorFault> {
        if !self.link.is_connected() {
            match tokio::time::timeout(self.reconnect_timeout, self.link.reconnect()).await {
                Ok(result) => result?,
                Err(_) => {
                    self.drop_link().await;
                    return Err(ActuatorFault::ConnectionFailed(format!(
                        "{} reconnect timed out",
                        self.link.link_name()
                    )));
                }
            }
        }

        let line = self.commands.line(command);
        match tokio::time::timeout(self.write_timeout, self.link.send_line(line)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(fault)) => {
                self.drop_link().await;
                Err(fault)
            }
            Err(_) => {
                self.drop_link().await;
                Err(ActuatorFault::Timeout)
            }
        }
    }

    /// Close the link so the next dispatch reconnects. A close that cannot
    /// finish within the write timeout is abandoned.
    async fn drop_link(&mut self) {
        if tokio::time::timeout(self.write_timeout, self.link.disconnect())
            .await
            .is_err()
        {
            tracing::warn!(link = self.link.link_name(), "Actuator close timed out");
        }
    }

    /// Wait briefly for one response line. Responses are informational only.
    async fn read_response(&mut self, command: ActuatorCommand) {
        match tokio::time::timeout(self.response_timeout, self.link.read_response()).await {
            Ok(Ok(Some(line))) => {
                self.stats.responses += 1;
                tracing::info!(command = %command, response = %line, "Actuator response");
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                tracing::debug!(command = %command, error = %e, "Actuator response read failed");
            }
            Err(_) => {
                tracing::debug!(command = %command, "No actuator response");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{ActuatorFaultKind, Endpoint, LineLink, RecordingLink};

    fn driver(link: &RecordingLink) -> ActuatorDriver {
        ActuatorDriver::new(
            ThresholdController::new(35.0),
            Box::new(link.clone()),
            CommandSet::default(),
            Duration::from_millis(200),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_sends_on_edges_only() {
        let link = RecordingLink::new();
        let mut d = driver(&link);

        for v in [30.0, 36.0, 37.0, 38.0, 34.0, 33.0] {
            d.evaluate(v).await.unwrap();
        }

        assert_eq!(link.sent(), vec!["THRESHOLD_EXCEEDED", "RESET_DEVICE"]);
        assert_eq!(d.stats().commands_sent, 2);
        assert!(!d.state().active);
    }

    #[tokio::test]
    async fn test_failed_dispatch_leaves_state_and_retries() {
        let link = RecordingLink::new();
        link.fail_next(ActuatorFaultKind::Timeout);
        let mut d = driver(&link);

        assert!(d.evaluate(36.0).await.is_err());
        assert!(!d.state().active);
        assert!(link.sent().is_empty());

        // Same condition on the next evaluation re-issues the command
        assert_eq!(d.evaluate(36.0).await.unwrap(), Some(ActuatorCommand::Activate));
        assert!(d.state().active);
        assert_eq!(link.sent(), vec!["THRESHOLD_EXCEEDED"]);
        assert_eq!(d.stats().dispatch_failures, 1);
    }

    #[tokio::test]
    async fn test_response_does_not_change_state() {
        let link = RecordingLink::new().with_response("Reset command received");
        let mut d = driver(&link);

        d.evaluate(36.0).await.unwrap();
        assert!(d.state().active);
        assert_eq!(d.stats().responses, 1);

        // Still active, so no repeat
        assert_eq!(d.evaluate(36.5).await.unwrap(), None);
        assert_eq!(link.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_silent_device_never_stalls_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = crate::actuator::make_fifo(dir.path());

        // Drain commands so the controller never sees its own line echoed
        let drain_path = fifo.clone();
        std::thread::spawn(move || {
            use std::io::Read;
            if let Ok(mut f) = std::fs::File::open(drain_path) {
                let mut buf = [0u8; 256];
                while matches!(f.read(&mut buf), Ok(n) if n > 0) {}
            }
        });

        let link = LineLink::new(Endpoint::Device(fifo), Duration::ZERO, Duration::from_secs(1));
        let mut d = ActuatorDriver::new(
            ThresholdController::new(35.0),
            Box::new(link),
            CommandSet::default(),
            Duration::from_millis(200),
            Duration::from_millis(200),
        );
        d.connect().await.unwrap();

        let bound = Duration::from_secs(5);
        let up = tokio::time::timeout(bound, d.evaluate(36.0)).await.unwrap();
        assert_eq!(up.unwrap(), Some(ActuatorCommand::Activate));
        let down = tokio::time::timeout(bound, d.evaluate(30.0)).await.unwrap();
        assert_eq!(down.unwrap(), Some(ActuatorCommand::Deactivate));
        assert_eq!(d.stats().commands_sent, 2);
    }
}
