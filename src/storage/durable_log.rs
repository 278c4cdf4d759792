//! Append-only CSV log
//!
//! ```text
//! Timestamp,Cycle,Average_Temp,Predicted_Temp,Threshold_Breach
//! 2024-05-01 14:10:00,1,31.42,,No
//! 2024-05-01 14:10:00,1,31.42,33.07,
//! ```
//!
//! Two row kinds share the file: the gathering summary written when a window
//! closes (no prediction, breach flag on the window mean) and the completed
//! cycle row (prediction, no breach flag).

use super::PersistenceFault;
use chrono::{Local, NaiveDateTime};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const LOG_HEADER: &str = "Timestamp,Cycle,Average_Temp,Predicted_Temp,Threshold_Breach";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogRow {
    Gathering {
        timestamp: NaiveDateTime,
        cycle: u64,
        avg_temp: f64,
        breach: bool,
    },
    Completed {
        timestamp: NaiveDateTime,
        cycle: u64,
        avg_temp: f64,
        predicted_temp: f64,
    },
}

impl LogRow {
    pub fn gathering(cycle: u64, avg_temp: f64, breach: bool) -> Self {
        LogRow::Gathering {
            timestamp: Local::now().naive_local(),
            cycle,
            avg_temp,
            breach,
        }
    }

    pub fn completed(cycle: u64, avg_temp: f64, predicted_temp: f64) -> Self {
        LogRow::Completed {
            timestamp: Local::now().naive_local(),
            cycle,
            avg_temp,
            predicted_temp,
        }
    }

    pub fn cycle(&self) -> u64 {
        match self {
            LogRow::Gathering { cycle, .. } | LogRow::Completed { cycle, .. } => *cycle,
        }
    }

    /// One CSV line including the trailing newline.
    pub fn to_line(&self) -> String {
        match self {
            LogRow::Gathering {
                timestamp,
                cycle,
                avg_temp,
                breach,
            } => format!(
                "{},{cycle},{avg_temp:.2},,{}\n",
                timestamp.format(TIMESTAMP_FORMAT),
                if *breach { "Yes" } else { "No" }
            ),
            LogRow::Completed {
                timestamp,
                cycle,
                avg_temp,
                predicted_temp,
            } => format!(
                "{},{cycle},{avg_temp:.2},{predicted_temp:.2},\n",
                timestamp.format(TIMESTAMP_FORMAT)
            ),
        }
    }

    /// Parse one line. `None` for the header, blank, torn or foreign lines.
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(',').collect();
        let [ts, cycle, avg, predicted, breach] = fields.as_slice() else {
            return None;
        };

        let timestamp = NaiveDateTime::parse_from_str(ts.trim(), TIMESTAMP_FORMAT).ok()?;
        let cycle: u64 = cycle.trim().parse().ok()?;
        let avg_temp: f64 = avg.trim().parse().ok()?;
        if cycle == 0 {
            return None;
        }

        match (predicted.trim(), breach.trim()) {
            ("", "Yes") | ("", "No") => Some(LogRow::Gathering {
                timestamp,
                cycle,
                avg_temp,
                breach: breach.trim() == "Yes",
            }),
            (p, "") => Some(LogRow::Completed {
                timestamp,
                cycle,
                avg_temp,
                predicted_temp: p.parse().ok()?,
            }),
            _ => None,
        }
    }
}

/// Durable row sink. Each append opens, writes one buffer, syncs and closes,
/// so a file removed by the retention sweep is recreated with a header.
#[derive(Debug, Clone)]
pub struct DurableLog {
    path: PathBuf,
}

impl DurableLog {
    /// Create the file (and its parent directory) with a header if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceFault> {
        let log = Self {
            path: path.as_ref().to_path_buf(),
        };
        if let Some(parent) = log.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| log.io_fault(e))?;
        }
        log.write_block(None)?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row durably.
    pub fn append(&self, row: &LogRow) -> Result<(), PersistenceFault> {
        self.write_block(Some(row))
    }

    fn write_block(&self, row: Option<&LogRow>) -> Result<(), PersistenceFault> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| self.io_fault(e))?;

        let mut block = String::with_capacity(128);
        let len = file.metadata().map_err(|e| self.io_fault(e))?.len();
        if len == 0 {
            block.push_str(LOG_HEADER);
            block.push('\n');
        } else if !ends_with_newline(&mut file).map_err(|e| self.io_fault(e))? {
            // Isolate a torn fragment from a previous crash on its own line
            block.push('\n');
        }
        if let Some(row) = row {
            block.push_str(&row.to_line());
        }
        if block.is_empty() {
            return Ok(());
        }

        file.write_all(block.as_bytes())
            .and_then(|()| file.flush())
            .and_then(|()| file.sync_data())
            .map_err(|e| self.io_fault(e))
    }

    fn io_fault(&self, source: std::io::Error) -> PersistenceFault {
        PersistenceFault::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Read every parseable row back, skipping the header and malformed lines.
pub fn read_log<P: AsRef<Path>>(path: P) -> Result<Vec<LogRow>, PersistenceFault> {
    let path = path.as_ref();
    let io_fault = |source| PersistenceFault::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_fault)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| PersistenceFault::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if line.trim().is_empty() || line.starts_with("Timestamp,") {
            continue;
        }
        match LogRow::parse(&line) {
            Some(row) => rows.push(row),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped = skipped, "Skipped malformed log lines");
    }
    Ok(rows)
}
