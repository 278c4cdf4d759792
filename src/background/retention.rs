//! Retention sweep: daily deletion of aged log files
//!
//! Each configured file whose modification time is strictly older than the
//! retention age is removed. The CSV log is recreated with a header on the
//! next append; the application log reopens on the next line.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Warn when the data volume drops below this much free space.
const LOW_DISK_BYTES: u64 = 100 * 1024 * 1024;

/// What happened to one file during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepAction {
    Deleted,
    Kept,
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepEntry {
    pub path: PathBuf,
    pub action: SweepAction,
}

/// Delete every file in `paths` older than `max_age` as of `now`.
pub fn sweep_once(paths: &[PathBuf], max_age: Duration, now: SystemTime) -> Vec<SweepEntry> {
    paths
        .iter()
        .map(|path| SweepEntry {
            path: path.clone(),
            action: sweep_file(path, max_age, now),
        })
        .collect()
}

fn sweep_file(path: &Path, max_age: Duration, now: SystemTime) -> SweepAction {
    let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SweepAction::Missing,
        Err(e) => return SweepAction::Failed(e.to_string()),
    };

    // A file stamped in the future has age zero
    let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
    if age <= max_age {
        return SweepAction::Kept;
    }

    match std::fs::remove_file(path) {
        Ok(()) => SweepAction::Deleted,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => SweepAction::Missing,
        Err(e) => SweepAction::Failed(e.to_string()),
    }
}

/// Periodic retention task. Shares no state with the scheduler.
pub struct RetentionSweeper {
    paths: Vec<PathBuf>,
    max_age: Duration,
    interval: Duration,
    cancel: CancellationToken,
}

impl RetentionSweeper {
    pub fn new(
        paths: Vec<PathBuf>,
        max_age: Duration,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            paths,
            max_age,
            interval,
            cancel,
        }
    }

    /// Sweep immediately, then every `interval` until cancelled.
    pub async fn run(self) {
        info!(
            files = self.paths.len(),
            max_age_days = self.max_age.as_secs() / 86_400,
            interval_secs = self.interval.as_secs(),
            "Retention sweeper started"
        );

        loop {
            self.sweep();
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("Retention sweeper stopped");
    }

    fn sweep(&self) {
        for entry in sweep_once(&self.paths, self.max_age, SystemTime::now()) {
            match entry.action {
                SweepAction::Deleted => {
                    info!(path = %entry.path.display(), "Deleted file past retention age");
                }
                SweepAction::Failed(reason) => {
                    warn!(path = %entry.path.display(), error = %reason, "Retention delete failed");
                }
                SweepAction::Kept | SweepAction::Missing => {
                    debug!(path = %entry.path.display(), action = ?entry.action, "Retention check");
                }
            }
        }

        if let Some(dir) = self.paths.first().and_then(|p| p.parent()) {
            match disk_free_bytes(dir) {
                Ok(free) if free < LOW_DISK_BYTES => {
                    warn!(free_mb = free / (1024 * 1024), dir = %dir.display(), "Disk space low");
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Could not check disk space"),
            }
        }
    }
}

/// Free bytes on the volume holding `path`.
#[cfg(unix)]
fn disk_free_bytes(path: &Path) -> Result<u64, String> {
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let dir = if path.as_os_str().is_empty() { Path::new(".") } else { path };
    let c_path = std::ffi::CString::new(dir.as_os_str().as_bytes()).map_err(|e| e.to_string())?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    // SAFETY: c_path is NUL-terminated and stat is only read after success
    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if result != 0 {
        return Err(format!("statvfs failed for {}", dir.display()));
    }
    let stat = unsafe { stat.assume_init() };
    #[allow(clippy::useless_conversion)]
    let free = u64::from(stat.f_bavail).saturating_mul(u64::from(stat.f_frsize));
    Ok(free)
}

#[cfg(not(unix))]
fn disk_free_bytes(_path: &Path) -> Result<u64, String> {
    Err("unsupported platform".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn test_missing_file_ignored() {
        let dir = tempdir().unwrap();
        let entries = sweep_once(&[dir.path().join("absent.csv")], 30 * DAY, SystemTime::now());
        assert_eq!(entries[0].action, SweepAction::Missing);
    }

    #[test]
    fn test_age_measured_against_now() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "x").unwrap();

        let entries = sweep_once(&[path.clone()], 30 * DAY, SystemTime::now() + 29 * DAY);
        assert_eq!(entries[0].action, SweepAction::Kept);
        assert!(path.exists());

        let entries = sweep_once(&[path.clone()], 30 * DAY, SystemTime::now() + 31 * DAY);
        assert_eq!(entries[0].action, SweepAction::Deleted);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_free_of_tempdir() {
        let dir = tempdir().unwrap();
        assert!(disk_free_bytes(dir.path()).is_ok());
    }
}
