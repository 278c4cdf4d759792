use super::{ActuatorFault, ActuatorLink};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// In-memory link that records every line sent.
///
/// Clones share the same log, so a test can keep one handle while the
/// driver owns another. Failures can be queued to exercise retry paths.
#[derive(Debug, Clone, Default)]
pub struct RecordingLink {
    sent: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<VecDeque<ActuatorFaultKind>>>,
    response: Option<String>,
}

/// Cloneable stand-in for the fault to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorFaultKind {
    NotConnected,
    Timeout,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every command with `line`.
    pub fn with_response(mut self, line: &str) -> Self {
        self.response = Some(line.to_string());
        self
    }

    /// Fail the next `send_line` call.
    pub fn fail_next(&self, kind: ActuatorFaultKind) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(kind);
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ActuatorLink for RecordingLink {
    async fn connect(&mut self) -> Result<(), ActuatorFault> {
        Ok(())
    }

    async fn send_line(&mut self, line: &str) -> Result<(), ActuatorFault> {
        let injected = self.failures.lock().ok().and_then(|mut f| f.pop_front());
        match injected {
            Some(ActuatorFaultKind::NotConnected) => return Err(ActuatorFault::NotConnected),
            Some(ActuatorFaultKind::Timeout) => return Err(ActuatorFault::Timeout),
            None => {}
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(line.to_string());
        }
        Ok(())
    }

    async fn read_response(&mut self) -> Result<Option<String>, ActuatorFault> {
        Ok(self.response.clone())
    }

    fn link_name(&self) -> &str {
        "recording"
    }
}
