//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! the dashboard endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use thermowatch::api::{create_app, DashboardState};
use thermowatch::pipeline::{MonitorState, StatusSnapshot};
use thermowatch::types::CycleRecord;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceExt;

fn create_test_state() -> DashboardState {
    DashboardState::new(Arc::new(RwLock::new(MonitorState::new(35.0, None))))
}

async fn get(state: DashboardState, uri: &str) -> axum::response::Response {
    create_app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// All GET endpoints with data available should return 200.
#[tokio::test]
async fn test_get_endpoints_return_200() {
    let endpoints = ["/data", "/health", "/api/v1/status", "/api/v1/history"];

    for endpoint in &endpoints {
        let resp = get(create_test_state(), endpoint).await;
        assert_eq!(
            resp.status(),
            StatusCode::OK,
            "GET {} returned {}",
            endpoint,
            resp.status()
        );
    }
}

/// `/data` is the bare snapshot the dashboard polls, not enveloped.
#[tokio::test]
async fn test_data_snapshot_shape() {
    let state = create_test_state();
    {
        let mut monitor = state.monitor.write().await;
        monitor.record_cycle(CycleRecord::new(1, 30.0, 31.0, 35.0));
        monitor.record_cycle(CycleRecord::new(2, 33.0, 36.5, 35.0));
    }

    let resp = get(state, "/data").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let snapshot: StatusSnapshot = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(snapshot.cycle, 2);
    assert_eq!(snapshot.current_avg, 33.0);
    assert_eq!(snapshot.latest_predicted, 36.5);
    assert_eq!(snapshot.history.len(), 2);
    assert_eq!(snapshot.history[0].cycle, 1);
}

#[tokio::test]
async fn test_status_is_enveloped() {
    let resp = get(create_test_state(), "/api/v1/status").await;
    let v: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();

    assert_eq!(v["meta"]["version"], "1");
    assert_eq!(v["data"]["threshold"], 35.0);
    assert_eq!(v["data"]["status"], "Initializing");
    assert_eq!(v["data"]["dispatch"]["commands_sent"], 0);
}

#[tokio::test]
async fn test_health_reports_completed_cycle() {
    let state = create_test_state();
    state
        .monitor
        .write()
        .await
        .record_cycle(CycleRecord::new(4, 30.0, 30.0, 35.0));

    let resp = get(state, "/health").await;
    let v: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(v["status"], "ok");
    assert_eq!(v["cycle"], 4);
}

#[tokio::test]
async fn test_unknown_cycle_is_404() {
    let resp = get(create_test_state(), "/api/v1/history/42").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let v: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(v["error"]["code"], "NOT_FOUND");
}

/// Any non-API path falls through to the embedded dashboard page.
#[tokio::test]
async fn test_fallback_serves_dashboard() {
    for path in ["/", "/some/client/route"] {
        let resp = get(create_test_state(), path).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
        let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"), "GET {path}: {content_type}");

        let html = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(html.contains("<html"));
    }
}
