//! Retention sweep tests
//!
//! File ages are simulated by moving the sweep's notion of "now" forward
//! rather than back-dating files.

use thermowatch::background::{sweep_once, RetentionSweeper, SweepAction};
use thermowatch::storage::{read_log, DurableLog, LogRow, LOG_HEADER};

use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

const DAY: Duration = Duration::from_secs(86_400);
const MAX_AGE: Duration = Duration::from_secs(30 * 86_400);

#[test]
fn test_file_older_than_thirty_days_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("temperature_data.csv");
    std::fs::write(&path, LOG_HEADER).unwrap();

    let entries = sweep_once(&[path.clone()], MAX_AGE, SystemTime::now() + 31 * DAY);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, SweepAction::Deleted);
    assert!(!path.exists());
}

#[test]
fn test_file_younger_than_thirty_days_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("temperature_log.log");
    std::fs::write(&path, "INFO started\n").unwrap();

    let entries = sweep_once(&[path.clone()], MAX_AGE, SystemTime::now() + 29 * DAY);
    assert_eq!(entries[0].action, SweepAction::Kept);
    assert!(path.exists());
}

#[test]
fn test_each_file_judged_on_its_own_age() {
    let dir = tempfile::tempdir().unwrap();
    let present = dir.path().join("temperature_data.csv");
    let absent = dir.path().join("temperature_log.log");
    std::fs::write(&present, "x").unwrap();

    let entries = sweep_once(&[present, absent], MAX_AGE, SystemTime::now() + 31 * DAY);
    assert_eq!(entries[0].action, SweepAction::Deleted);
    assert_eq!(entries[1].action, SweepAction::Missing);
}

#[test]
fn test_cycle_log_recreated_after_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("temperature_data.csv");
    let log = DurableLog::open(&path).unwrap();
    log.append(&LogRow::completed(1, 30.0, 31.0)).unwrap();

    sweep_once(&[path.clone()], MAX_AGE, SystemTime::now() + 31 * DAY);
    assert!(!path.exists());

    log.append(&LogRow::completed(2, 30.5, 31.5)).unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with(LOG_HEADER));

    let rows = read_log(&path).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].cycle(), 2);
}

#[tokio::test]
async fn test_sweeper_stops_on_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("temperature_data.csv");
    std::fs::write(&path, "x").unwrap();

    let cancel = CancellationToken::new();
    let sweeper = RetentionSweeper::new(vec![path.clone()], MAX_AGE, DAY, cancel.clone());
    let handle = tokio::spawn(sweeper.run());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    // A fresh file survives the sweep made on start
    assert!(path.exists());
}
