//! Actuator transport
//!
//! The actuator is a microcontroller that switches a fan or relay when it
//! receives one of two literal command lines. [`ActuatorLink`] is the
//! line-oriented duplex channel to it; timeouts are applied by the caller.
//!
//! Transports, selected from `actuator.endpoint`:
//! - `tcp://host:port`: networked controller
//! - `/dev/...` or any other path: pre-configured serial character device
//! - `null`: log commands without sending them

mod device;
mod line_link;
mod null_link;
mod recording;

#[cfg(test)]
pub(crate) use device::make_fifo;
pub use line_link::{Endpoint, LineLink};
pub use null_link::NullLink;
pub use recording::{ActuatorFaultKind, RecordingLink};

use crate::config::ActuatorConfig;
use crate::types::ActuatorCommand;
use async_trait::async_trait;
use thiserror::Error;

/// Failures talking to the actuator. Actuator state is never changed by one.
#[derive(Debug, Error)]
pub enum ActuatorFault {
    #[error("Actuator not connected")]
    NotConnected,

    #[error("Actuator I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Actuator write timed out")]
    Timeout,

    #[error("Actuator connection failed: {0}")]
    ConnectionFailed(String),
}

/// Line-oriented command channel to the actuator.
#[async_trait]
pub trait ActuatorLink: Send + Sync + 'static {
    /// Open the channel. Failure at startup aborts the process.
    async fn connect(&mut self) -> Result<(), ActuatorFault>;

    /// Try to restore a dropped channel. Links may refuse with
    /// [`ActuatorFault::NotConnected`] while backing off.
    async fn reconnect(&mut self) -> Result<(), ActuatorFault> {
        self.connect().await
    }

    /// Drop the channel so the next dispatch reconnects.
    async fn disconnect(&mut self) {}

    fn is_connected(&self) -> bool {
        true
    }

    /// Write one command followed by `\n`.
    async fn send_line(&mut self, line: &str) -> Result<(), ActuatorFault>;

    /// Read one response line, `None` if the peer closed the channel.
    async fn read_response(&mut self) -> Result<Option<String>, ActuatorFault>;

    /// Human-readable name for logging.
    fn link_name(&self) -> &str;
}

/// Wire strings for the two commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSet {
    pub activate: String,
    pub deactivate: String,
}

impl CommandSet {
    pub fn from_config(config: &ActuatorConfig) -> Self {
        Self {
            activate: config.activate_command.clone(),
            deactivate: config.deactivate_command.clone(),
        }
    }

    pub fn line(&self, command: ActuatorCommand) -> &str {
        match command {
            ActuatorCommand::Activate => &self.activate,
            ActuatorCommand::Deactivate => &self.deactivate,
        }
    }
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::from_config(&ActuatorConfig::default())
    }
}

/// Build the link named by `actuator.endpoint`.
pub fn link_from_config(config: &ActuatorConfig) -> Box<dyn ActuatorLink> {
    match Endpoint::parse(&config.endpoint) {
        None => Box::new(NullLink::new()),
        Some(endpoint) => Box::new(LineLink::new(endpoint, config.settle(), config.connect_timeout())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_lines() {
        let commands = CommandSet::default();
        assert_eq!(commands.line(ActuatorCommand::Activate), "THRESHOLD_EXCEEDED");
        assert_eq!(commands.line(ActuatorCommand::Deactivate), "RESET_DEVICE");
    }

    #[test]
    fn test_null_endpoint_builds_null_link() {
        let config = ActuatorConfig {
            endpoint: "null".to_string(),
            ..ActuatorConfig::default()
        };
        assert_eq!(link_from_config(&config).link_name(), "null");
    }
}
