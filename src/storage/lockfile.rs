//! Single-instance guard
//!
//! Two monitors on one host would drive the same actuator and interleave
//! rows in the same log. A PID file in the data directory prevents that.

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Holds `<data_dir>/.thermowatch.lock` for the life of the process.
#[derive(Debug)]
pub struct ProcessLock {
    lock_path: PathBuf,
    owned: bool,
}

impl ProcessLock {
    const LOCK_FILE_NAME: &'static str = ".thermowatch.lock";

    /// Take the lock, clearing it first if the recorded PID is gone.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let lock_path = data_dir.join(Self::LOCK_FILE_NAME);

        match Self::holder(&lock_path) {
            Some(pid) if pid == std::process::id() || pid_alive(pid) => bail!(
                "Another thermowatch instance is already running (PID {pid}). \
                 Stop it, or remove {} if it is stale",
                lock_path.display()
            ),
            Some(pid) => {
                tracing::info!(pid = pid, "Removing stale lock file");
                fs::remove_file(&lock_path).context("Failed to remove stale lock file")?;
            }
            None if lock_path.exists() => {
                tracing::warn!(path = %lock_path.display(), "Unreadable lock file, replacing it");
                let _ = fs::remove_file(&lock_path);
            }
            None => {}
        }

        // create_new so two racing starts cannot both win
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to create lock file {}", lock_path.display()))?;
        writeln!(file, "{}", std::process::id()).context("Failed to write PID to lock file")?;

        tracing::debug!(path = %lock_path.display(), "Acquired process lock");
        Ok(Self {
            lock_path,
            owned: true,
        })
    }

    /// PID recorded in an existing lock file.
    fn holder(lock_path: &Path) -> Option<u32> {
        fs::read_to_string(lock_path).ok()?.trim().parse().ok()
    }

    pub fn release(&mut self) {
        if !self.owned {
            return;
        }
        match fs::remove_file(&self.lock_path) {
            Ok(()) => tracing::debug!(path = %self.lock_path.display(), "Released process lock"),
            Err(e) => tracing::warn!(error = %e, "Failed to remove lock file"),
        }
        self.owned = false;
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // Signal 0 only checks existence; EPERM still means the process exists
    // SAFETY: kill with signal 0 sends nothing
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_writes_pid() {
        let dir = tempdir().unwrap();
        let lock = ProcessLock::acquire(dir.path()).unwrap();
        let pid: u32 = fs::read_to_string(lock.path()).unwrap().trim().parse().unwrap();
        assert_eq!(pid, std::process::id());
    }

    #[test]
    fn test_second_acquire_refused() {
        let dir = tempdir().unwrap();
        let _lock = ProcessLock::acquire(dir.path()).unwrap();
        assert!(ProcessLock::acquire(dir.path()).is_err());
    }

    #[test]
    fn test_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = {
            let lock = ProcessLock::acquire(dir.path()).unwrap();
            lock.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_lock_replaced() {
        let dir = tempdir().unwrap();
        // Beyond pid_max on Linux
        fs::write(dir.path().join(ProcessLock::LOCK_FILE_NAME), "999999999\n").unwrap();
        let lock = ProcessLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn test_garbage_lock_replaced() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(ProcessLock::LOCK_FILE_NAME), "not a pid").unwrap();
        assert!(ProcessLock::acquire(dir.path()).is_ok());
    }
}
