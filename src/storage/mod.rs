//! Cycle history persistence
//!
//! - [`HistoryStore`]: ordered in-memory records, the scheduler's sole sink
//! - [`DurableLog`]: CSV file written one synced row at a time
//! - [`ProcessLock`]: single-instance PID file

pub mod durable_log;
pub mod history;
pub mod lockfile;

pub use durable_log::{read_log, DurableLog, LogRow, LOG_HEADER};
pub use history::HistoryStore;
pub use lockfile::ProcessLock;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceFault {
    #[error("History log I/O error ({}): {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Out-of-order cycle {got}, expected {expected}")]
    OutOfOrder { expected: u64, got: u64 },
}
