//! System-wide default constants.
//!
//! Every value here is the built-in default for a field of
//! [`MonitorConfig`](super::MonitorConfig). Grouped by subsystem.

// ============================================================================
// Control
// ============================================================================

/// Temperature above which the actuator is activated (°C).
pub const TEMP_THRESHOLD_C: f64 = 35.0;

// ============================================================================
// Schedule
// ============================================================================

/// Interval between sensor samples inside a gathering window (ms).
pub const TICK_MS: u64 = 1_000;

/// Length of one gathering window (seconds).
pub const WINDOW_SECS: u64 = 600;

/// Wall-clock length a cycle is padded to (seconds).
pub const CYCLE_SECS: u64 = 600;

/// Cycles per hour block.
pub const CYCLES_PER_HOUR: u32 = 6;

/// Wall-clock length an hour block is padded to (seconds).
pub const HOUR_SECS: u64 = 3_600;

// ============================================================================
// Forecast
// ============================================================================

/// Ticks past the end of the window at which the trend is evaluated.
///
/// 600 ticks at 1 Hz = 10 minutes ahead.
pub const FORECAST_HORIZON: usize = 600;

// ============================================================================
// Sensor
// ============================================================================

/// Upper bound on a single grid read (ms).
pub const SENSOR_READ_TIMEOUT_MS: u64 = 2_000;

/// Rows and columns of the simulated grid (AMG88xx is 8x8).
pub const SIM_GRID_SIZE: usize = 8;

/// Mean temperature of the simulated grid (°C).
pub const SIM_BASE_TEMP_C: f64 = 30.0;

// ============================================================================
// Actuator
// ============================================================================

/// Default actuator endpoint (serial device of the microcontroller).
pub const ACTUATOR_ENDPOINT: &str = "/dev/ttyUSB0";

/// Line sent to switch the actuator on.
pub const ACTIVATE_COMMAND: &str = "THRESHOLD_EXCEEDED";

/// Line sent to switch the actuator off.
pub const DEACTIVATE_COMMAND: &str = "RESET_DEVICE";

/// Delay after opening the link before the first command (ms).
///
/// The microcontroller resets when the port opens.
pub const ACTUATOR_SETTLE_MS: u64 = 2_000;

/// Upper bound on writing one command (ms).
pub const ACTUATOR_WRITE_TIMEOUT_MS: u64 = 1_000;

/// How long to wait for a response line after a command (ms).
pub const ACTUATOR_RESPONSE_TIMEOUT_MS: u64 = 1_000;

/// Upper bound on establishing a TCP link (seconds).
pub const ACTUATOR_CONNECT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Storage
// ============================================================================

/// Durable cycle log.
pub const LOG_PATH: &str = "temperature_data.csv";

/// Application log file.
pub const APP_LOG_FILE: &str = "temperature_log.log";

/// Directory holding the process lock.
pub const DATA_DIR: &str = "./data";

// ============================================================================
// Retention
// ============================================================================

/// Files older than this are deleted by the retention sweep (days).
pub const RETENTION_MAX_AGE_DAYS: u64 = 30;

/// Interval between retention sweeps (seconds). 86 400 = once per day.
pub const RETENTION_INTERVAL_SECS: u64 = 86_400;

// ============================================================================
// Server
// ============================================================================

/// HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:5000";
