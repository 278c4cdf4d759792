//! Background services
//!
//! Runs alongside the scheduler on its own tokio task.

pub mod retention;

pub use retention::{sweep_once, RetentionSweeper, SweepAction, SweepEntry};
