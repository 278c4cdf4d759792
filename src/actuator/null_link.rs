use super::{ActuatorFault, ActuatorLink};
use async_trait::async_trait;

/// Accepts every command and only logs it. Used for bench runs without
/// hardware.
#[derive(Debug, Default)]
pub struct NullLink {
    sent: u64,
}

impl NullLink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActuatorLink for NullLink {
    async fn connect(&mut self) -> Result<(), ActuatorFault> {
        tracing::info!("Actuator disabled, commands will only be logged");
        Ok(())
    }

    async fn send_line(&mut self, line: &str) -> Result<(), ActuatorFault> {
        self.sent += 1;
        tracing::info!(command = line, sent = self.sent, "Actuator command (not sent)");
        Ok(())
    }

    async fn read_response(&mut self) -> Result<Option<String>, ActuatorFault> {
        Ok(None)
    }

    fn link_name(&self) -> &str {
        "null"
    }
}
