//! Cycle scheduler
//!
//! ```text
//! hour   ┌ cycle 1 ┬ cycle 2 ┬ ... ┬ cycle 6 ┬ pad to hour_secs ┐
//! cycle  ┌ window (1 Hz samples, instant control) ┬ forecast ┬ control on prediction ┬ persist ┬ pad to cycle_secs ┐
//! ```
//!
//! Sole owner of the sampler, the actuator driver and the history store.
//! Cancellation is honoured at every tick and every padding sleep; an
//! interrupted window is abandoned without emitting a record.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{MonitorState, SystemStatus};
use crate::acquisition::Sampler;
use crate::actuator::ActuatorFault;
use crate::config::ScheduleConfig;
use crate::control::ActuatorDriver;
use crate::forecast::Forecaster;
use crate::storage::HistoryStore;
use crate::types::{mean, ActuatorCommand, CycleRecord};

/// Result of one cycle slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    Completed(CycleRecord),
    /// Every sample in the window failed; no record, number reused
    EmptyWindow,
    Cancelled,
}

/// Totals returned when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles_completed: u64,
    pub empty_windows: u64,
    pub samples: u64,
    pub sensor_faults: u64,
}

pub struct CycleScheduler {
    sampler: Sampler,
    driver: ActuatorDriver,
    forecaster: Forecaster,
    history: HistoryStore,
    schedule: ScheduleConfig,
    state: Arc<RwLock<MonitorState>>,
    cancel: CancellationToken,
    window: Vec<f64>,
    stats: SchedulerStats,
}

impl CycleScheduler {
    pub fn new(
        sampler: Sampler,
        driver: ActuatorDriver,
        forecaster: Forecaster,
        history: HistoryStore,
        schedule: ScheduleConfig,
        state: Arc<RwLock<MonitorState>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sampler,
            driver,
            forecaster,
            history,
            schedule,
            state,
            cancel,
            window: Vec::new(),
            stats: SchedulerStats::default(),
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn driver(&self) -> &ActuatorDriver {
        &self.driver
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Run hours back to back until cancelled.
    pub async fn run(mut self) -> SchedulerStats {
        info!(
            source = self.sampler.source_name(),
            tick_ms = self.schedule.tick_ms,
            window_secs = self.schedule.window_secs,
            cycle_secs = self.schedule.cycle_secs,
            cycles_per_hour = self.schedule.cycles_per_hour,
            horizon = self.forecaster.horizon(),
            resume_after = self.history.last_cycle(),
            "Cycle scheduler started"
        );

        while self.run_hour().await {}

        self.state.write().await.status = SystemStatus::Stopped;
        info!(
            cycles = self.stats.cycles_completed,
            samples = self.stats.samples,
            sensor_faults = self.stats.sensor_faults,
            "Cycle scheduler stopped"
        );
        self.stats
    }

    /// Run `cycles_per_hour` cycles, then pad to `hour_secs`.
    ///
    /// Returns false once cancelled.
    pub async fn run_hour(&mut self) -> bool {
        let hour_start = Instant::now();
        for _ in 0..self.schedule.cycles_per_hour {
            if self.run_cycle().await == CycleOutcome::Cancelled {
                return false;
            }
        }
        debug!("Hour complete, padding to hour boundary");
        self.pad(hour_start, self.schedule.hour()).await
    }

    /// One full cycle slot: gather, forecast, persist, control, pad.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let cycle_start = Instant::now();
        let cycle = self.history.last_cycle() + 1;

        {
            let mut state = self.state.write().await;
            state.active_cycle = cycle;
            state.window_samples = 0;
        }

        if !self.gather_window(cycle).await {
            return CycleOutcome::Cancelled;
        }

        let outcome = match mean(&self.window) {
            Some(avg) => CycleOutcome::Completed(self.complete_cycle(cycle, avg).await),
            None => {
                warn!(cycle = cycle, "No valid samples in window, skipping cycle");
                self.stats.empty_windows += 1;
                CycleOutcome::EmptyWindow
            }
        };

        if !self.pad(cycle_start, self.schedule.cycle()).await {
            return CycleOutcome::Cancelled;
        }
        outcome
    }

    /// Sample at `tick` until the window elapses. Returns false if cancelled.
    async fn gather_window(&mut self, cycle: u64) -> bool {
        self.window.clear();
        let window_start = Instant::now();
        let window = self.schedule.window();
        let tick = self.schedule.tick();

        while window_start.elapsed() < window {
            let sample = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(cycle = cycle, samples = self.window.len(), "Window abandoned on shutdown");
                    return false;
                }
                sample = self.sampler.sample() => sample,
            };

            match sample {
                Ok(reading) => {
                    self.window.push(reading.value);
                    self.stats.samples += 1;
                    debug!(cycle = cycle, value = reading.value, "Sample");
                    let dispatched = self.driver.evaluate(reading.value).await;
                    note_dispatch(cycle, "reading", dispatched);
                    self.publish_tick(Some(reading)).await;
                }
                Err(fault) => {
                    self.stats.sensor_faults += 1;
                    warn!(cycle = cycle, error = %fault, "Sensor read failed, skipping tick");
                    self.publish_tick(None).await;
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(cycle = cycle, samples = self.window.len(), "Window abandoned on shutdown");
                    return false;
                }
                _ = tokio::time::sleep(tick) => {}
            }
        }
        true
    }

    async fn complete_cycle(&mut self, cycle: u64, avg: f64) -> CycleRecord {
        let threshold = self.driver.threshold();

        if let Err(e) = self.history.log_window_summary(cycle, avg, avg > threshold) {
            error!(cycle = cycle, error = %e, "Failed to log window summary");
        }

        let predicted = self.forecaster.predict_or_zero(&self.window);
        let dispatched = self.driver.evaluate(predicted).await;
        note_dispatch(cycle, "prediction", dispatched);

        let record = CycleRecord::new(cycle, avg, predicted, threshold);
        if let Err(e) = self.history.append(record) {
            error!(cycle = cycle, error = %e, "Failed to persist cycle record");
        }
        self.stats.cycles_completed += 1;

        info!(
            cycle = cycle,
            samples = self.window.len(),
            avg_temp = %format!("{avg:.2}"),
            predicted_temp = %format!("{predicted:.2}"),
            breach = record.breach,
            actuator_active = self.driver.state().active,
            "Cycle complete"
        );

        let actuator = self.driver.state();
        let dispatch = self.driver.stats();
        let durable_failures = self.history.durable_failures();
        {
            let mut state = self.state.write().await;
            state.record_cycle(record);
            state.actuator = actuator;
            state.dispatch = dispatch;
            state.durable_failures = durable_failures;
            state.status = status_for(actuator.active, true);
        }
        record
    }

    async fn publish_tick(&self, reading: Option<crate::types::Reading>) {
        let grid = reading.and_then(|_| self.sampler.latest_grid().cloned());
        let actuator = self.driver.state();
        let dispatch = self.driver.stats();
        let window_samples = self.window.len();

        let mut state = self.state.write().await;
        state.window_samples = window_samples;
        state.actuator = actuator;
        state.dispatch = dispatch;
        state.status = status_for(actuator.active, reading.is_some());
        match reading {
            Some(reading) => {
                state.samples_collected += 1;
                state.latest_reading = Some(reading);
                state.latest_grid = grid;
            }
            None => state.sensor_faults += 1,
        }
    }

    /// Sleep until `target` has passed since `started`, never negative.
    /// Returns false if cancelled.
    async fn pad(&self, started: Instant, target: Duration) -> bool {
        let remaining = remaining(started, target);
        if remaining.is_zero() {
            debug!(overrun = ?started.elapsed().saturating_sub(target), "No padding needed");
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(remaining) => true,
        }
    }
}

/// Time left until `target` has elapsed since `started`, zero if overrun.
/// A command that was not delivered leaves the actuator state alone and is
/// issued again by the next evaluation that still calls for it.
fn note_dispatch(cycle: u64, basis: &str, result: Result<Option<ActuatorCommand>, ActuatorFault>) {
    match result {
        Ok(Some(command)) => debug!(cycle = cycle, basis = basis, command = %command, "Dispatched"),
        Ok(None) => {}
        Err(ActuatorFault::NotConnected | ActuatorFault::ConnectionFailed(_)) => {
            debug!(cycle = cycle, basis = basis, "Actuator unreachable, command deferred");
        }
        Err(ActuatorFault::Timeout | ActuatorFault::Io(_)) => {
            debug!(cycle = cycle, basis = basis, "Actuator link dropped, command deferred");
        }
    }
}

pub fn remaining(started: Instant, target: Duration) -> Duration {
    target.saturating_sub(started.elapsed())
}

fn status_for(actuator_active: bool, sample_ok: bool) -> SystemStatus {
    match (actuator_active, sample_ok) {
        (true, _) => SystemStatus::Alert,
        (false, true) => SystemStatus::Monitoring,
        (false, false) => SystemStatus::Degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{ScriptStep, ScriptedSensor, SensorFault};
    use crate::actuator::{ActuatorFaultKind, CommandSet, RecordingLink};
    use crate::control::ThresholdController;
    use crate::types::ThermalGrid;

    fn schedule() -> ScheduleConfig {
        ScheduleConfig {
            tick_ms: 1000,
            window_secs: 3,
            cycle_secs: 5,
            cycles_per_hour: 2,
            hour_secs: 12,
        }
    }

    fn scheduler(steps: Vec<ScriptStep>, cancel: CancellationToken) -> (CycleScheduler, RecordingLink) {
        let link = RecordingLink::new();
        let sampler = Sampler::new(Box::new(ScriptedSensor::new(steps)), Duration::from_millis(500));
        let driver = ActuatorDriver::new(
            ThresholdController::new(35.0),
            Box::new(link.clone()),
            CommandSet::default(),
            Duration::from_millis(100),
            Duration::from_millis(100),
        );
        let state = Arc::new(RwLock::new(MonitorState::new(35.0, None)));
        let s = CycleScheduler::new(
            sampler,
            driver,
            Forecaster::new(600),
            HistoryStore::in_memory(None),
            schedule(),
            state,
            cancel,
        );
        (s, link)
    }

    fn grid(v: f64) -> ScriptStep {
        ScriptStep::Grid(ThermalGrid::filled(8, 8, v))
    }

    #[test]
    fn test_remaining_never_negative() {
        let started = Instant::now();
        assert_eq!(remaining(started, Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_takes_one_sample_per_tick() {
        let (mut s, _) = scheduler(vec![grid(30.0), grid(31.0), grid(32.0)], CancellationToken::new());
        let outcome = s.run_cycle().await;
        let CycleOutcome::Completed(record) = outcome else {
            panic!("expected a completed cycle, got {outcome:?}");
        };
        assert_eq!(record.cycle, 1);
        assert!((record.avg_temp - 31.0).abs() < 1e-9);
        // Rising 1/tick over 3 samples: 30 + 1 * (3 + 600)
        assert!((record.predicted_temp - 633.0).abs() < 1e-9);
        assert!(record.breach);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_faults_skip_ticks() {
        let steps = vec![
            ScriptStep::Fault(SensorFault::Timeout),
            grid(30.0),
            ScriptStep::Fault(SensorFault::InvalidGrid),
        ];
        let (mut s, _) = scheduler(steps, CancellationToken::new());
        let CycleOutcome::Completed(record) = s.run_cycle().await else {
            panic!("expected a completed cycle");
        };
        // One sample: degenerate forecast falls back to 0.0
        assert_eq!(record.avg_temp, 30.0);
        assert_eq!(record.predicted_temp, 0.0);
        assert_eq!(s.stats().sensor_faults, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_window_reuses_cycle_number() {
        let (mut s, _) = scheduler(vec![], CancellationToken::new());
        assert_eq!(s.run_cycle().await, CycleOutcome::EmptyWindow);
        assert_eq!(s.history().last_cycle(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_window() {
        let cancel = CancellationToken::new();
        let (mut s, _) = scheduler(vec![grid(30.0); 10], cancel.clone());
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            cancel.cancel();
        });
        assert_eq!(s.run_cycle().await, CycleOutcome::Cancelled);
        assert!(s.history().is_empty());
        stopper.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hour_padding() {
        let (mut s, _) = scheduler(vec![grid(30.0); 6], CancellationToken::new());
        let start = Instant::now();
        assert!(s.run_hour().await);
        assert_eq!(start.elapsed(), Duration::from_secs(12));
        assert_eq!(s.history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undelivered_command_retried_on_next_tick() {
        let (mut s, link) = scheduler(vec![grid(36.0), grid(36.5), grid(37.0)], CancellationToken::new());
        link.fail_next(ActuatorFaultKind::Timeout);

        let CycleOutcome::Completed(record) = s.run_cycle().await else {
            panic!("expected a completed cycle");
        };
        assert_eq!(record.cycle, 1);
        // First tick lost the command, the second delivered it, then nothing repeats
        assert_eq!(link.sent(), vec!["THRESHOLD_EXCEEDED"]);
        assert_eq!(s.driver().stats().dispatch_failures, 1);
        assert!(s.driver().state().active);
    }
}
