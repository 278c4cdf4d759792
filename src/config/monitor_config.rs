//! Monitor Configuration - every tunable of the sampling and control loop
//!
//! Each section implements `Default` with the values in [`super::defaults`],
//! so an empty or missing TOML file reproduces the stock deployment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "THERMOWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "thermowatch.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one monitor deployment.
///
/// Load with [`MonitorConfig::load()`] which searches:
/// 1. `$THERMOWATCH_CONFIG`
/// 2. `./thermowatch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub actuator: ActuatorConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order.
    ///
    /// A file that exists but fails to parse or validate is reported and
    /// skipped, falling through to the next candidate.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded monitor config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded monitor config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys produce warnings only; parse and validation failures
    /// are errors.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&contents)
            .map_err(|e| match e {
                ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
                other => other,
            })?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Shrink every timing so a full hour block runs in about a minute.
    ///
    /// Used by `--fast` for bench runs against real hardware.
    pub fn accelerate(&mut self) {
        self.schedule.tick_ms = 100;
        self.schedule.window_secs = 6;
        self.schedule.cycle_secs = 8;
        self.schedule.hour_secs = 60;
        self.forecast.horizon = 60;
        self.actuator.settle_ms = self.actuator.settle_ms.min(500);
    }

    /// Check every section for values the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if !self.control.threshold_c.is_finite() {
            errors.push(format!(
                "control.threshold_c must be finite, got {}",
                self.control.threshold_c
            ));
        }

        let s = &self.schedule;
        if s.tick_ms == 0 {
            errors.push("schedule.tick_ms must be > 0".to_string());
        }
        if s.window_secs == 0 {
            errors.push("schedule.window_secs must be > 0".to_string());
        }
        if s.cycle_secs == 0 {
            errors.push("schedule.cycle_secs must be > 0".to_string());
        }
        if s.cycles_per_hour == 0 {
            errors.push("schedule.cycles_per_hour must be > 0".to_string());
        }
        if s.hour_secs == 0 {
            errors.push("schedule.hour_secs must be > 0".to_string());
        }
        if s.window_secs > s.cycle_secs {
            warn!(
                window_secs = s.window_secs,
                cycle_secs = s.cycle_secs,
                "Gathering window is longer than the cycle; cycles will never be padded"
            );
        }

        if self.sensor.read_timeout_ms == 0 {
            errors.push("sensor.read_timeout_ms must be > 0".to_string());
        }
        if self.sensor.kind == SensorKind::Process && self.sensor.command.is_empty() {
            errors.push("sensor.command must be set when sensor.kind = \"process\"".to_string());
        }

        let a = &self.actuator;
        for (name, cmd) in [
            ("actuator.activate_command", &a.activate_command),
            ("actuator.deactivate_command", &a.deactivate_command),
        ] {
            if cmd.trim().is_empty() {
                errors.push(format!("{name} must not be empty"));
            }
            if cmd.contains('\n') || cmd.contains('\r') {
                errors.push(format!("{name} must be a single line"));
            }
        }
        if a.activate_command == a.deactivate_command {
            errors.push("actuator activate and deactivate commands must differ".to_string());
        }
        if a.write_timeout_ms == 0 || a.response_timeout_ms == 0 {
            errors.push("actuator timeouts must be > 0".to_string());
        }

        if self.retention.max_age_days == 0 {
            errors.push("retention.max_age_days must be > 0".to_string());
        }
        if self.retention.interval_secs == 0 {
            errors.push("retention.interval_secs must be > 0".to_string());
        }

        if self.history.max_records == Some(0) {
            errors.push("history.max_records must be > 0 when set".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sensor
// ============================================================================

/// Which grid source feeds the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Synthetic drifting grid, no hardware needed.
    #[default]
    Simulated,
    /// External helper process printing one JSON grid per line.
    Process,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub kind: SensorKind,

    /// Helper command and arguments for `kind = "process"`.
    #[serde(default)]
    pub command: Vec<String>,

    /// Upper bound on a single grid read (ms).
    #[serde(default = "default_sensor_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Fixed RNG seed for the simulated grid.
    #[serde(default)]
    pub sim_seed: Option<u64>,

    /// Mean temperature of the simulated grid (°C).
    #[serde(default = "default_sim_base_temp_c")]
    pub sim_base_temp_c: f64,
}

fn default_sensor_read_timeout_ms() -> u64 {
    defaults::SENSOR_READ_TIMEOUT_MS
}
fn default_sim_base_temp_c() -> f64 {
    defaults::SIM_BASE_TEMP_C
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::default(),
            command: Vec::new(),
            read_timeout_ms: default_sensor_read_timeout_ms(),
            sim_seed: None,
            sim_base_temp_c: default_sim_base_temp_c(),
        }
    }
}

impl SensorConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

// ============================================================================
// Actuator
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorConfig {
    /// `tcp://host:port`, a character device path, or `null` (log only).
    #[serde(default = "default_actuator_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_activate_command")]
    pub activate_command: String,

    #[serde(default = "default_deactivate_command")]
    pub deactivate_command: String,

    /// Delay after opening the link before the first command (ms).
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Wait for one response line after each command (ms).
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_actuator_endpoint() -> String {
    defaults::ACTUATOR_ENDPOINT.to_string()
}
fn default_activate_command() -> String {
    defaults::ACTIVATE_COMMAND.to_string()
}
fn default_deactivate_command() -> String {
    defaults::DEACTIVATE_COMMAND.to_string()
}
fn default_settle_ms() -> u64 {
    defaults::ACTUATOR_SETTLE_MS
}
fn default_write_timeout_ms() -> u64 {
    defaults::ACTUATOR_WRITE_TIMEOUT_MS
}
fn default_response_timeout_ms() -> u64 {
    defaults::ACTUATOR_RESPONSE_TIMEOUT_MS
}
fn default_connect_timeout_secs() -> u64 {
    defaults::ACTUATOR_CONNECT_TIMEOUT_SECS
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_actuator_endpoint(),
            activate_command: default_activate_command(),
            deactivate_command: default_deactivate_command(),
            settle_ms: default_settle_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ActuatorConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ============================================================================
// Control
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Readings strictly above this activate the actuator (°C).
    #[serde(default = "default_threshold_c")]
    pub threshold_c: f64,
}

fn default_threshold_c() -> f64 {
    defaults::TEMP_THRESHOLD_C
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { threshold_c: default_threshold_c() }
    }
}

// ============================================================================
// Schedule
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    #[serde(default = "default_cycle_secs")]
    pub cycle_secs: u64,

    #[serde(default = "default_cycles_per_hour")]
    pub cycles_per_hour: u32,

    #[serde(default = "default_hour_secs")]
    pub hour_secs: u64,
}

fn default_tick_ms() -> u64 {
    defaults::TICK_MS
}
fn default_window_secs() -> u64 {
    defaults::WINDOW_SECS
}
fn default_cycle_secs() -> u64 {
    defaults::CYCLE_SECS
}
fn default_cycles_per_hour() -> u32 {
    defaults::CYCLES_PER_HOUR
}
fn default_hour_secs() -> u64 {
    defaults::HOUR_SECS
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            window_secs: default_window_secs(),
            cycle_secs: default_cycle_secs(),
            cycles_per_hour: default_cycles_per_hour(),
            hour_secs: default_hour_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn cycle(&self) -> Duration {
        Duration::from_secs(self.cycle_secs)
    }

    pub fn hour(&self) -> Duration {
        Duration::from_secs(self.hour_secs)
    }
}

// ============================================================================
// Forecast
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Ticks past the end of the window to extrapolate to.
    #[serde(default = "default_horizon")]
    pub horizon: usize,
}

fn default_horizon() -> usize {
    defaults::FORECAST_HORIZON
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self { horizon: default_horizon() }
    }
}

// ============================================================================
// Storage / History
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Durable CSV cycle log.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Directory for the process lock.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_log_path() -> PathBuf {
    PathBuf::from(defaults::LOG_PATH)
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(defaults::DATA_DIR)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Keep at most this many cycle records in memory. Unset = unbounded.
    #[serde(default)]
    pub max_records: Option<usize>,

    /// Continue cycle numbering from the last completed row of the log.
    #[serde(default = "default_true")]
    pub resume_from_log: bool,
}

fn default_true() -> bool {
    true
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_records: None,
            resume_from_log: true,
        }
    }
}

// ============================================================================
// Retention
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,

    #[serde(default = "default_retention_interval_secs")]
    pub interval_secs: u64,
}

fn default_max_age_days() -> u64 {
    defaults::RETENTION_MAX_AGE_DAYS
}
fn default_retention_interval_secs() -> u64 {
    defaults::RETENTION_INTERVAL_SECS
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_days: default_max_age_days(),
            interval_secs: default_retention_interval_secs(),
        }
    }
}

impl RetentionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days * 86_400)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines on stdout instead of human-readable text.
    #[serde(default)]
    pub json: bool,

    /// Plain-text log file appended alongside stdout. `""` disables it.
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from(defaults::APP_LOG_FILE))
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: default_log_file(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address. Overridden by `--addr`.
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Where `/generate_204` redirects captive-portal probes.
    #[serde(default)]
    pub portal_url: Option<String>,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            portal_url: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
