//! Shared monitor state and the status snapshot served to the dashboard.
//!
//! The scheduler is the only writer. It copies small values in under the
//! write lock; API handlers take the read lock, build a [`StatusSnapshot`]
//! and release.

use crate::control::DispatchStats;
use crate::types::{ActuatorState, CycleRecord, Reading, ThermalGrid};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct MonitorState {
    pub status: SystemStatus,
    pub started: Instant,
    pub threshold: f64,
    /// Cycle currently gathering (0 before the first starts)
    pub active_cycle: u64,
    /// Last completed cycle (0 before any)
    pub completed_cycle: u64,
    /// Samples in the window being gathered
    pub window_samples: usize,
    /// Mean of the last completed window
    pub current_avg: f64,
    pub latest_predicted: f64,
    pub latest_reading: Option<Reading>,
    pub latest_grid: Option<ThermalGrid>,
    pub actuator: ActuatorState,
    pub dispatch: DispatchStats,
    pub samples_collected: u64,
    pub sensor_faults: u64,
    pub durable_failures: u64,
    pub history: VecDeque<CycleRecord>,
    max_history: Option<usize>,
}

impl MonitorState {
    pub fn new(threshold: f64, max_history: Option<usize>) -> Self {
        Self {
            status: SystemStatus::Initializing,
            started: Instant::now(),
            threshold,
            active_cycle: 0,
            completed_cycle: 0,
            window_samples: 0,
            current_avg: 0.0,
            latest_predicted: 0.0,
            latest_reading: None,
            latest_grid: None,
            actuator: ActuatorState::INACTIVE,
            dispatch: DispatchStats::default(),
            samples_collected: 0,
            sensor_faults: 0,
            durable_failures: 0,
            history: VecDeque::new(),
            max_history,
        }
    }

    /// Seed from records recovered out of the durable log.
    pub fn load_history<'a>(&mut self, records: impl IntoIterator<Item = &'a CycleRecord>) {
        for record in records {
            self.push_record(*record);
        }
        if let Some(last) = self.history.back() {
            self.latest_predicted = last.predicted_temp;
            self.current_avg = last.avg_temp;
        }
    }

    /// Publish a completed cycle.
    pub fn record_cycle(&mut self, record: CycleRecord) {
        self.current_avg = record.avg_temp;
        self.latest_predicted = record.predicted_temp;
        self.push_record(record);
    }

    fn push_record(&mut self, record: CycleRecord) {
        self.completed_cycle = record.cycle;
        self.history.push_back(record);
        if let Some(max) = self.max_history {
            while self.history.len() > max {
                self.history.pop_front();
            }
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            cycle: self.completed_cycle,
            current_avg: self.current_avg,
            latest_predicted: self.latest_predicted,
            history: self.history.iter().map(HistoryPoint::from).collect(),
            active_cycle: self.active_cycle,
            actuator_active: self.actuator.active,
            window_samples: self.window_samples,
            threshold: self.threshold,
            status: self.status,
        }
    }
}

/// Operating status shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemStatus {
    /// Started, no sample yet
    Initializing,
    /// Sampling normally, actuator off
    Monitoring,
    /// Actuator on
    Alert,
    /// Last sample failed
    Degraded,
    /// Scheduler stopped
    Stopped,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemStatus::Initializing => write!(f, "Initializing"),
            SystemStatus::Monitoring => write!(f, "Monitoring"),
            SystemStatus::Alert => write!(f, "Alert"),
            SystemStatus::Degraded => write!(f, "Degraded"),
            SystemStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

/// One history entry as served by `/data`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub cycle: u64,
    pub avg_temp: f64,
    pub predicted_temp: f64,
}

impl From<&CycleRecord> for HistoryPoint {
    fn from(r: &CycleRecord) -> Self {
        Self {
            cycle: r.cycle,
            avg_temp: r.avg_temp,
            predicted_temp: r.predicted_temp,
        }
    }
}

/// Read-only view served by `GET /data` and `GET /api/v1/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub cycle: u64,
    pub current_avg: f64,
    pub latest_predicted: f64,
    pub history: Vec<HistoryPoint>,
    pub active_cycle: u64,
    pub actuator_active: bool,
    pub window_samples: usize,
    pub threshold: f64,
    pub status: SystemStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_snapshot() {
        let snap = MonitorState::new(35.0, None).snapshot();
        assert_eq!(snap.cycle, 0);
        assert_eq!(snap.current_avg, 0.0);
        assert_eq!(snap.latest_predicted, 0.0);
        assert!(snap.history.is_empty());
        assert_eq!(snap.status, SystemStatus::Initializing);
    }

    #[test]
    fn test_record_cycle_updates_snapshot() {
        let mut state = MonitorState::new(35.0, None);
        state.record_cycle(CycleRecord::new(1, 30.5, 32.0, 35.0));
        state.record_cycle(CycleRecord::new(2, 31.5, 36.0, 35.0));

        let snap = state.snapshot();
        assert_eq!(snap.cycle, 2);
        assert_eq!(snap.current_avg, 31.5);
        assert_eq!(snap.latest_predicted, 36.0);
        assert_eq!(snap.history.len(), 2);
    }

    #[test]
    fn test_history_cap() {
        let mut state = MonitorState::new(35.0, Some(1));
        state.record_cycle(CycleRecord::new(1, 30.0, 31.0, 35.0));
        state.record_cycle(CycleRecord::new(2, 30.0, 31.0, 35.0));
        let snap = state.snapshot();
        assert_eq!(snap.history.len(), 1);
        assert_eq!(snap.cycle, 2);
    }

    #[test]
    fn test_snapshot_json_fields() {
        let mut state = MonitorState::new(35.0, None);
        state.record_cycle(CycleRecord::new(1, 30.0, 31.0, 35.0));
        let json = serde_json::to_value(state.snapshot()).unwrap();
        for key in ["cycle", "current_avg", "latest_predicted", "history", "actuator_active"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["history"][0]["predicted_temp"], 31.0);
        assert!(json["history"][0].get("breach").is_none());
    }
}
