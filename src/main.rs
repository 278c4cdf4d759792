//! thermowatch - thermal array monitor
//!
//! Samples a thermal array at 1 Hz, forecasts the window trend ten minutes
//! ahead and drives an actuator over a serial or TCP line when the
//! temperature crosses the configured threshold.
//!
//! # Usage
//!
//! ```bash
//! # Simulated 8x8 array, no actuator hardware
//! thermowatch --simulate --actuator null
//!
//! # Sensor helper process, microcontroller on a serial line
//! thermowatch --sensor-cmd "python3 read_amg8833.py" --actuator /dev/ttyUSB0
//!
//! # Bench run with an hour block shrunk to about a minute
//! thermowatch --simulate --actuator tcp://127.0.0.1:7000 --fast
//! ```
//!
//! # Environment Variables
//!
//! - `THERMOWATCH_CONFIG`: Path to the TOML config (default: `./thermowatch.toml`)
//! - `THERMOWATCH_CORS_ORIGINS`: Comma-separated origins allowed by the API
//! - `RUST_LOG`: Log filter (default: `logging.level` from the config)

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use axum::Router;
use thermowatch::acquisition::{ProcessSensor, Sampler, SensorSource, SimulatedSensor};
use thermowatch::actuator::{link_from_config, CommandSet};
use thermowatch::api::{create_app, DashboardState};
use thermowatch::background::RetentionSweeper;
use thermowatch::config::{self, defaults, LoggingConfig, MonitorConfig, SensorConfig, SensorKind};
use thermowatch::control::{ActuatorDriver, ThresholdController};
use thermowatch::forecast::Forecaster;
use thermowatch::pipeline::{CycleScheduler, MonitorState};
use thermowatch::storage::{DurableLog, HistoryStore, ProcessLock};

/// How long running tasks get to finish after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "thermowatch")]
#[command(about = "Thermal array monitor with forecast-driven actuator control")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides the THERMOWATCH_CONFIG search)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the HTTP bind address (default: "0.0.0.0:5000")
    #[arg(short, long, env = "THERMOWATCH_ADDR")]
    addr: Option<String>,

    /// Use the simulated 8x8 array regardless of the config
    #[arg(long, conflicts_with = "sensor_cmd")]
    simulate: bool,

    /// Read grids from a helper process, e.g. "python3 read_amg8833.py"
    #[arg(long, value_name = "COMMAND", env = "THERMOWATCH_SENSOR_CMD")]
    sensor_cmd: Option<String>,

    /// Actuator endpoint: a device path, tcp://HOST:PORT, or "null"
    #[arg(long, value_name = "ENDPOINT", env = "THERMOWATCH_ACTUATOR")]
    actuator: Option<String>,

    /// Shrink every timing so an hour block runs in about a minute
    #[arg(long)]
    fast: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    CycleScheduler,
    RetentionSweeper,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::CycleScheduler => write!(f, "CycleScheduler"),
            TaskName::RetentionSweeper => write!(f, "RetentionSweeper"),
        }
    }
}

// ============================================================================
// Configuration and Logging
// ============================================================================

/// Load the config file and apply command-line overrides.
fn load_config(args: &CliArgs) -> Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => MonitorConfig::load(),
    };

    if let Some(addr) = &args.addr {
        config.server.addr.clone_from(addr);
    }
    if args.simulate {
        config.sensor.kind = SensorKind::Simulated;
    }
    if let Some(cmd) = &args.sensor_cmd {
        config.sensor.kind = SensorKind::Process;
        config.sensor.command = cmd.split_whitespace().map(str::to_string).collect();
    }
    if let Some(endpoint) = &args.actuator {
        config.actuator.endpoint.clone_from(endpoint);
    }
    if args.fast {
        config.accelerate();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Appends each event to the application log, reopening the file per write
/// so a file removed by the retention sweep is recreated on the next line.
struct AppLogFile {
    path: PathBuf,
}

impl<'a> MakeWriter<'a> for AppLogFile {
    type Writer = Box<dyn Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => Box::new(file),
            Err(_) => Box::new(std::io::sink()),
        }
    }
}

/// Install the global subscriber: env filter, stdout, optional log file.
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (json_layer, text_layer) = if config.json {
        (Some(fmt::layer().json().with_target(false)), None)
    } else {
        (None, Some(fmt::layer().with_target(false)))
    };

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(AppLogFile { path: path.clone() }),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")
}

// ============================================================================
// Component Initialization
// ============================================================================

fn build_sensor(config: &SensorConfig) -> Result<Box<dyn SensorSource>> {
    match config.kind {
        SensorKind::Simulated => Ok(Box::new(SimulatedSensor::new(
            defaults::SIM_GRID_SIZE,
            defaults::SIM_GRID_SIZE,
            config.sim_base_temp_c,
            config.sim_seed,
        ))),
        SensorKind::Process => {
            let sensor = ProcessSensor::new(&config.command).context("Invalid sensor command")?;
            Ok(Box::new(sensor))
        }
    }
}

/// Open the durable log and recover completed cycles from it.
fn open_history(config: &MonitorConfig) -> Result<HistoryStore> {
    let log = DurableLog::open(&config.storage.log_path).with_context(|| {
        format!("Failed to open cycle log {}", config.storage.log_path.display())
    })?;
    let mut history = HistoryStore::with_log(log, config.history.max_records);

    if config.history.resume_from_log {
        let recovered = history
            .resume(config.control.threshold_c)
            .context("Failed to recover history from cycle log")?;
        if recovered > 0 {
            info!(
                recovered = recovered,
                last_cycle = history.last_cycle(),
                "Resuming after previously completed cycles"
            );
        }
    }
    Ok(history)
}

fn retention_paths(config: &MonitorConfig) -> Vec<PathBuf> {
    let mut paths = vec![config.storage.log_path.clone()];
    paths.extend(config.logging.file.clone());
    paths
}

// ============================================================================
// Task Spawning
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!(error = %e, "[HttpServer] Server error");
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

fn spawn_scheduler(task_set: &mut JoinSet<Result<TaskName>>, scheduler: CycleScheduler) {
    task_set.spawn(async move {
        info!("[CycleScheduler] Task starting");
        let stats = scheduler.run().await;
        info!(
            cycles = stats.cycles_completed,
            empty_windows = stats.empty_windows,
            "[CycleScheduler] Stopped"
        );
        Ok(TaskName::CycleScheduler)
    });
}

fn spawn_retention(task_set: &mut JoinSet<Result<TaskName>>, sweeper: RetentionSweeper) {
    task_set.spawn(async move {
        sweeper.run().await;
        Ok(TaskName::RetentionSweeper)
    });
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!(error = %e, "Supervisor: task failed");
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Supervisor: task panicked");
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Wait for the remaining tasks after cancellation, bounded by
/// [`SHUTDOWN_GRACE`].
async fn drain_tasks(task_set: &mut JoinSet<Result<TaskName>>) {
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while let Some(result) = task_set.join_next().await {
            if let Ok(Ok(task_name)) = result {
                info!("Task {} stopped", task_name);
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Tasks still running at shutdown, aborting");
        task_set.abort_all();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Config is read before the real subscriber exists, so route its
    // warnings to a temporary stderr logger.
    let bootstrap = fmt().with_target(false).with_writer(std::io::stderr).finish();
    let monitor_config = tracing::subscriber::with_default(bootstrap, || load_config(&args))?;

    if args.print_config {
        print!("{}", monitor_config.to_toml()?);
        return Ok(());
    }

    init_logging(&monitor_config.logging)?;
    config::init(monitor_config);
    let cfg = config::get();

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  thermowatch {}", env!("CARGO_PKG_VERSION"));
    info!(
        threshold_c = cfg.control.threshold_c,
        window_secs = cfg.schedule.window_secs,
        cycles_per_hour = cfg.schedule.cycles_per_hour,
        horizon = cfg.forecast.horizon,
        "  Thermal monitor"
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let _lock = ProcessLock::acquire(&cfg.storage.data_dir)?;

    // Sensor and actuator must both come up before anything is scheduled
    let mut sampler = Sampler::new(build_sensor(&cfg.sensor)?, cfg.sensor.read_timeout());
    sampler
        .connect()
        .await
        .with_context(|| format!("Sensor initialisation failed ({})", sampler.source_name()))?;
    info!(source = sampler.source_name(), "Sensor ready");

    let mut driver = ActuatorDriver::new(
        ThresholdController::new(cfg.control.threshold_c),
        link_from_config(&cfg.actuator),
        CommandSet::from_config(&cfg.actuator),
        cfg.actuator.write_timeout(),
        cfg.actuator.response_timeout(),
    )
    .with_reconnect_timeout(cfg.actuator.connect_timeout() + cfg.actuator.settle());
    driver
        .connect()
        .await
        .with_context(|| format!("Actuator initialisation failed ({})", cfg.actuator.endpoint))?;
    info!(endpoint = %cfg.actuator.endpoint, "Actuator ready");

    let history = open_history(cfg)?;

    let mut monitor = MonitorState::new(cfg.control.threshold_c, cfg.history.max_records);
    monitor.load_history(history.records());
    let monitor = Arc::new(RwLock::new(monitor));

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    let listener = tokio::net::TcpListener::bind(&cfg.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.addr))?;
    info!(addr = %cfg.server.addr, "Dashboard listening");
    let app = create_app(
        DashboardState::new(Arc::clone(&monitor)).with_portal_url(cfg.server.portal_url.clone()),
    );
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    let scheduler = CycleScheduler::new(
        sampler,
        driver,
        Forecaster::new(cfg.forecast.horizon),
        history,
        cfg.schedule.clone(),
        Arc::clone(&monitor),
        cancel_token.clone(),
    );
    spawn_scheduler(&mut task_set, scheduler);

    if cfg.retention.enabled {
        let sweeper = RetentionSweeper::new(
            retention_paths(cfg),
            cfg.retention.max_age(),
            cfg.retention.interval(),
            cancel_token.clone(),
        );
        spawn_retention(&mut task_set, sweeper);
    } else {
        info!("Retention sweep disabled");
    }

    let outcome = run_supervisor(&mut task_set, cancel_token.clone()).await;
    cancel_token.cancel();
    drain_tasks(&mut task_set).await;

    outcome?;
    info!("thermowatch shutdown complete");
    Ok(())
}
