//! API route handlers
//!
//! All handlers are read-only. Each takes the monitor read lock, copies what
//! it needs and releases before serializing.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::control::DispatchStats;
use crate::pipeline::{MonitorState, StatusSnapshot};
use crate::types::{CycleRecord, Reading};

/// Shared state for API handlers
#[derive(Clone)]
pub struct DashboardState {
    pub monitor: Arc<RwLock<MonitorState>>,
    /// Captive-portal redirect target for `/generate_204`
    pub portal_url: Option<String>,
}

impl DashboardState {
    pub fn new(monitor: Arc<RwLock<MonitorState>>) -> Self {
        Self {
            monitor,
            portal_url: None,
        }
    }

    pub fn with_portal_url(mut self, url: Option<String>) -> Self {
        self.portal_url = url;
        self
    }
}

// ============================================================================
// Status
// ============================================================================

/// `GET /data`: bare snapshot polled by the dashboard page.
pub async fn get_data(State(state): State<DashboardState>) -> Json<StatusSnapshot> {
    Json(state.monitor.read().await.snapshot())
}

#[derive(Debug, Serialize)]
pub struct StatusDetail {
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
    pub uptime_secs: u64,
    pub samples_collected: u64,
    pub sensor_faults: u64,
    pub durable_failures: u64,
    pub dispatch: DispatchStats,
    pub latest_reading: Option<Reading>,
}

/// `GET /api/v1/status`
pub async fn get_status(State(state): State<DashboardState>) -> Response {
    let detail = {
        let monitor = state.monitor.read().await;
        StatusDetail {
            snapshot: monitor.snapshot(),
            uptime_secs: monitor.uptime_secs(),
            samples_collected: monitor.samples_collected,
            sensor_faults: monitor.sensor_faults,
            durable_failures: monitor.durable_failures,
            dispatch: monitor.dispatch,
            latest_reading: monitor.latest_reading,
        }
    };
    ApiResponse::ok(detail)
}

// ============================================================================
// History
// ============================================================================

/// `GET /api/v1/history`
pub async fn get_history(State(state): State<DashboardState>) -> Response {
    let records: Vec<CycleRecord> = state.monitor.read().await.history.iter().copied().collect();
    ApiResponse::ok(records)
}

/// `GET /api/v1/history/:cycle`
pub async fn get_history_cycle(
    State(state): State<DashboardState>,
    Path(cycle): Path<u64>,
) -> Response {
    let record = state
        .monitor
        .read()
        .await
        .history
        .iter()
        .find(|r| r.cycle == cycle)
        .copied();

    match record {
        Some(record) => ApiResponse::ok(record),
        None => ApiErrorResponse::not_found(format!("No record for cycle {cycle}")),
    }
}

// ============================================================================
// Live frame
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub timestamp: Option<DateTime<Local>>,
    pub rows: usize,
    pub cols: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Raw cell temperatures (°C)
    pub cells: Vec<Vec<f64>>,
    /// Cells min-max scaled to 0..=255 for heat-map rendering
    pub intensities: Vec<Vec<u8>>,
}

/// `GET /api/v1/frame`: latest grid for the live heat map.
pub async fn get_frame(State(state): State<DashboardState>) -> Response {
    let (grid, reading) = {
        let monitor = state.monitor.read().await;
        (monitor.latest_grid.clone(), monitor.latest_reading)
    };

    let Some(grid) = grid else {
        return ApiErrorResponse::service_unavailable("No frame captured yet");
    };
    let (rows, cols) = grid.dims();
    let (min, max) = grid.min_max().unwrap_or_default();

    ApiResponse::ok(FrameResponse {
        timestamp: reading.map(|r| r.timestamp),
        rows,
        cols,
        mean: grid.mean().unwrap_or_default(),
        min,
        max,
        intensities: grid.intensities(),
        cells: grid.rows().to_vec(),
    })
}

// ============================================================================
// Health and captive portal
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub cycle: u64,
    pub system_status: String,
}

/// `GET /health`
pub async fn health_check(State(state): State<DashboardState>) -> Json<HealthResponse> {
    let monitor = state.monitor.read().await;
    Json(HealthResponse {
        status: "ok",
        uptime_secs: monitor.uptime_secs(),
        cycle: monitor.completed_cycle,
        system_status: monitor.status.to_string(),
    })
}

/// `GET /generate_204`: connectivity probe sent by phones joining the
/// device's access point. Redirecting it opens the dashboard automatically.
pub async fn captive_portal(State(state): State<DashboardState>) -> Response {
    match &state.portal_url {
        Some(url) => (StatusCode::FOUND, [(header::LOCATION, url.clone())]).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
