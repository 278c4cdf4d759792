//! Cycle history: in-memory sequence plus durable log.

use super::durable_log::{read_log, DurableLog, LogRow};
use super::PersistenceFault;
use crate::types::CycleRecord;
use std::collections::VecDeque;

/// Ordered, gapless sequence of completed cycles.
///
/// The scheduler is the only writer. Memory and the durable log diverge only
/// when a durable write fails twice in a row; the record is then kept in
/// memory and the failure counted.
pub struct HistoryStore {
    records: VecDeque<CycleRecord>,
    last_cycle: u64,
    max_records: Option<usize>,
    log: Option<DurableLog>,
    durable_failures: u64,
}

impl HistoryStore {
    /// Memory-only store.
    pub fn in_memory(max_records: Option<usize>) -> Self {
        Self {
            records: VecDeque::new(),
            last_cycle: 0,
            max_records,
            log: None,
            durable_failures: 0,
        }
    }

    /// Store backed by `log`.
    pub fn with_log(log: DurableLog, max_records: Option<usize>) -> Self {
        Self {
            log: Some(log),
            ..Self::in_memory(max_records)
        }
    }

    /// Reload completed cycles from the durable log so numbering continues
    /// across restarts. Rows that do not advance the sequence are ignored.
    ///
    /// A row lost to a failed durable write leaves a gap in the log. Only the
    /// contiguous run after the last gap is reloaded into memory; numbering
    /// still continues from the newest row.
    ///
    /// Returns the number of records recovered.
    pub fn resume(&mut self, threshold: f64) -> Result<usize, PersistenceFault> {
        let Some(path) = self.log.as_ref().map(|log| log.path().to_path_buf()) else {
            return Ok(0);
        };
        let rows = read_log(&path)?;

        for row in rows {
            let LogRow::Completed {
                cycle,
                avg_temp,
                predicted_temp,
                ..
            } = row
            else {
                continue;
            };
            if cycle <= self.last_cycle {
                continue;
            }
            if !self.records.is_empty() && cycle != self.last_cycle + 1 {
                tracing::warn!(
                    missing_from = self.last_cycle + 1,
                    resumed_at = cycle,
                    dropped = self.records.len(),
                    "Gap in cycle log, earlier records not reloaded"
                );
                self.records.clear();
            }
            self.push(CycleRecord::new(cycle, avg_temp, predicted_temp, threshold));
        }

        let recovered = self.records.len();

        if recovered > 0 {
            tracing::info!(
                recovered = recovered,
                last_cycle = self.last_cycle,
                path = %path.display(),
                "Resumed cycle history from log"
            );
        }
        Ok(recovered)
    }

    /// Append the next cycle. `record.cycle` must be exactly `last + 1`.
    pub fn append(&mut self, record: CycleRecord) -> Result<(), PersistenceFault> {
        let expected = self.last_cycle + 1;
        if record.cycle != expected {
            return Err(PersistenceFault::OutOfOrder {
                expected,
                got: record.cycle,
            });
        }

        let row = LogRow::completed(record.cycle, record.avg_temp, record.predicted_temp);
        let durable = self.write_durable(&row);
        self.push(record);
        durable
    }

    /// Write the summary row for a closed gathering window. Durable only.
    pub fn log_window_summary(
        &mut self,
        cycle: u64,
        avg_temp: f64,
        breach: bool,
    ) -> Result<(), PersistenceFault> {
        self.write_durable(&LogRow::gathering(cycle, avg_temp, breach))
    }

    fn write_durable(&mut self, row: &LogRow) -> Result<(), PersistenceFault> {
        let Some(log) = &self.log else {
            return Ok(());
        };

        let first = match log.append(row) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        tracing::warn!(cycle = row.cycle(), error = %first, "Log write failed, retrying once");

        match log.append(row) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.durable_failures += 1;
                tracing::error!(
                    cycle = row.cycle(),
                    error = %e,
                    durable_failures = self.durable_failures,
                    "Log write failed after retry, row kept in memory only"
                );
                Err(e)
            }
        }
    }

    fn push(&mut self, record: CycleRecord) {
        self.last_cycle = record.cycle;
        self.records.push_back(record);
        if let Some(max) = self.max_records {
            while self.records.len() > max {
                self.records.pop_front();
            }
        }
    }

    /// Number of the last completed cycle, 0 before any.
    pub fn last_cycle(&self) -> u64 {
        self.last_cycle
    }

    pub fn last(&self) -> Option<&CycleRecord> {
        self.records.back()
    }

    pub fn get(&self, cycle: u64) -> Option<&CycleRecord> {
        // Retained records are contiguous, so index directly
        let first = self.records.front()?.cycle;
        let idx = usize::try_from(cycle.checked_sub(first)?).ok()?;
        self.records.get(idx).filter(|r| r.cycle == cycle)
    }

    pub fn records(&self) -> impl ExactSizeIterator<Item = &CycleRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn durable_failures(&self) -> u64 {
        self.durable_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::durable_log::LOG_HEADER;
    use tempfile::tempdir;

    fn record(cycle: u64, avg: f64, pred: f64) -> CycleRecord {
        CycleRecord::new(cycle, avg, pred, 35.0)
    }

    #[test]
    fn test_append_in_order() {
        let mut store = HistoryStore::in_memory(None);
        for c in 1..=3 {
            store.append(record(c, 30.0, 31.0)).unwrap();
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.last_cycle(), 3);
        assert_eq!(store.get(2).map(|r| r.cycle), Some(2));
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut store = HistoryStore::in_memory(None);
        assert!(matches!(
            store.append(record(2, 30.0, 31.0)),
            Err(PersistenceFault::OutOfOrder { expected: 1, got: 2 })
        ));
        store.append(record(1, 30.0, 31.0)).unwrap();
        assert!(matches!(
            store.append(record(1, 30.0, 31.0)),
            Err(PersistenceFault::OutOfOrder { expected: 2, got: 1 })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cycle_zero_never_stored() {
        let mut store = HistoryStore::in_memory(None);
        assert!(store.append(record(0, 30.0, 31.0)).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut store = HistoryStore::in_memory(Some(2));
        for c in 1..=5 {
            store.append(record(c, 30.0, 31.0)).unwrap();
        }
        let cycles: Vec<u64> = store.records().map(|r| r.cycle).collect();
        assert_eq!(cycles, vec![4, 5]);
        assert_eq!(store.last_cycle(), 5);
        assert!(store.get(3).is_none());
        assert_eq!(store.get(5).map(|r| r.cycle), Some(5));
    }

    #[test]
    fn test_durable_rows_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut store = HistoryStore::with_log(DurableLog::open(&path).unwrap(), None);

        store.log_window_summary(1, 36.0, true).unwrap();
        store.append(record(1, 36.0, 37.5)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], LOG_HEADER);
        assert!(lines[1].ends_with(",1,36.00,,Yes"));
        assert!(lines[2].ends_with(",1,36.00,37.50,"));
    }

    #[test]
    fn test_resume_continues_numbering() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        {
            let mut store = HistoryStore::with_log(DurableLog::open(&path).unwrap(), None);
            for c in 1..=3 {
                store.log_window_summary(c, 30.0, false).unwrap();
                store.append(record(c, 30.0, 36.0)).unwrap();
            }
        }

        let mut store = HistoryStore::with_log(DurableLog::open(&path).unwrap(), None);
        assert_eq!(store.resume(35.0).unwrap(), 3);
        assert_eq!(store.last_cycle(), 3);
        assert!(store.last().is_some_and(|r| r.breach));
        store.append(record(4, 30.0, 31.0)).unwrap();
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_resume_across_gap_keeps_memory_gapless() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        {
            // Row 3 never reached the disk
            let log = DurableLog::open(&path).unwrap();
            for c in [1, 2, 4] {
                log.append(&LogRow::completed(c, 30.0, 31.0)).unwrap();
            }
        }

        let mut store = HistoryStore::with_log(DurableLog::open(&path).unwrap(), None);
        assert_eq!(store.resume(35.0).unwrap(), 1);
        assert_eq!(store.last_cycle(), 4);
        assert!(store.get(3).is_none());
        assert_eq!(store.get(4).map(|r| r.cycle), Some(4));

        store.append(record(5, 30.0, 31.0)).unwrap();
        let cycles: Vec<u64> = store.records().map(|r| r.cycle).collect();
        assert_eq!(cycles, vec![4, 5]);
    }

    #[cfg(unix)]
    #[test]
    fn test_durable_failure_keeps_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut store = HistoryStore::with_log(DurableLog::open(&path).unwrap(), None);

        // Replace the file with a directory so every open fails
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(matches!(
            store.append(record(1, 30.0, 31.0)),
            Err(PersistenceFault::Io { .. })
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(store.durable_failures(), 1);
        store.append(record(2, 30.0, 31.0)).unwrap_err();
        assert_eq!(store.last_cycle(), 2);
    }
}
