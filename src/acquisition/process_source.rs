//! Helper-process sensor source
//!
//! Spawns a vendor driver (typically a small script wrapping the I2C array)
//! that answers each newline on stdin with one JSON grid line on stdout:
//!
//! ```text
//! stdin:  \n
//! stdout: [[29.75,30.0,...],[...],...]
//! ```

use super::{SensorFault, SensorSource};
use crate::types::ThermalGrid;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;

/// Initial respawn delay (doubles each failed spawn).
const INITIAL_RESPAWN_DELAY_SECS: u64 = 1;

/// Maximum respawn delay cap (seconds).
const MAX_RESPAWN_DELAY_SECS: u64 = 30;

/// Unanswered requests tolerated before the helper is considered hung.
const MAX_UNANSWERED_REQUESTS: u32 = 3;

pub struct ProcessSensor {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    /// Holds a partial line across a cancelled read
    line_buffer: String,
    /// Requests written whose reply has not been read yet. A reply that
    /// arrives after the caller gave up is discarded against this count.
    unanswered: u32,
    /// Consecutive failed respawns (resets on success)
    failed_spawns: u32,
    /// Earliest time the next respawn may be tried
    next_spawn: Option<Instant>,
}

impl ProcessSensor {
    /// `command[0]` is the program, the rest are its arguments.
    pub fn new(command: &[String]) -> Result<Self, SensorFault> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SensorFault::Source("empty sensor command".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            child: None,
            stdin: None,
            stdout: None,
            line_buffer: String::with_capacity(1024),
            unanswered: 0,
            failed_spawns: 0,
            next_spawn: None,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.child.is_some()
    }

    fn parse_line(line: &str) -> Result<ThermalGrid, SensorFault> {
        serde_json::from_str::<ThermalGrid>(line)
            .map_err(|e| SensorFault::Source(format!("unparseable frame: {e}")))
    }

    fn respawn_delay(failed_spawns: u32) -> Duration {
        let secs = INITIAL_RESPAWN_DELAY_SECS
            .saturating_mul(2u64.saturating_pow(failed_spawns.saturating_sub(1)))
            .min(MAX_RESPAWN_DELAY_SECS);
        Duration::from_secs(secs)
    }

    /// Drop the helper (killing it) and allow a respawn on the next read.
    fn stop(&mut self) {
        self.stdin = None;
        self.stdout = None;
        self.child = None;
        self.line_buffer.clear();
        self.unanswered = 0;
    }

    /// Restart a helper that exited or hung, honouring the backoff.
    async fn respawn(&mut self) -> Result<(), SensorFault> {
        if let Some(at) = self.next_spawn {
            if Instant::now() < at {
                return Err(SensorFault::Closed);
            }
        }

        match self.connect().await {
            Ok(()) => {
                tracing::info!(
                    program = %self.program,
                    failed_spawns = self.failed_spawns,
                    "Sensor helper restarted"
                );
                self.failed_spawns = 0;
                self.next_spawn = None;
                Ok(())
            }
            Err(e) => {
                self.failed_spawns = self.failed_spawns.saturating_add(1);
                let delay = Self::respawn_delay(self.failed_spawns);
                self.next_spawn = Some(Instant::now() + delay);
                tracing::warn!(
                    program = %self.program,
                    attempt = self.failed_spawns,
                    retry_in_secs = delay.as_secs(),
                    error = %e,
                    "Sensor helper restart failed"
                );
                Err(e)
            }
        }
    }
}

#[async_trait]
impl SensorSource for ProcessSensor {
    async fn connect(&mut self) -> Result<(), SensorFault> {
        if self.is_connected() {
            return Ok(());
        }

        tracing::info!(program = %self.program, args = ?self.args, "Starting sensor helper process");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SensorFault::Source(format!("failed to spawn '{}': {e}", self.program)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SensorFault::Source("failed to capture helper stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SensorFault::Source("failed to capture helper stdout".to_string()))?;

        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout));
        self.child = Some(child);
        self.line_buffer.clear();
        self.unanswered = 0;
        Ok(())
    }

    async fn read_grid(&mut self) -> Result<ThermalGrid, SensorFault> {
        if self.unanswered >= MAX_UNANSWERED_REQUESTS {
            tracing::warn!(
                program = %self.program,
                unanswered = self.unanswered,
                "Sensor helper stopped answering, restarting it"
            );
            self.stop();
        }
        if !self.is_connected() {
            self.respawn().await?;
        }

        let (Some(stdin), Some(stdout)) = (self.stdin.as_mut(), self.stdout.as_mut()) else {
            return Err(SensorFault::Closed);
        };

        // Request one frame. Counted before the write so a cancelled call
        // still accounts for the reply it may have provoked.
        self.unanswered += 1;
        let request = async {
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        if let Err(e) = request.await {
            tracing::warn!(program = %self.program, error = %e, "Sensor helper stdin closed");
            self.stop();
            return Err(SensorFault::Closed);
        }

        loop {
            let bytes = stdout
                .read_line(&mut self.line_buffer)
                .await
                .map_err(|e| SensorFault::Source(format!("helper stdout: {e}")))?;

            if bytes == 0 {
                tracing::warn!(program = %self.program, "Sensor helper exited");
                self.stop();
                return Err(SensorFault::Closed);
            }

            let line = std::mem::take(&mut self.line_buffer);
            self.unanswered = self.unanswered.saturating_sub(1);
            if self.unanswered == 0 {
                return Self::parse_line(line.trim());
            }
            tracing::debug!(program = %self.program, "Discarding late sensor frame");
        }
    }

    fn source_name(&self) -> &str {
        "process"
    }
}
