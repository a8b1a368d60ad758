//! # Recording and Data Storage Module
//!
//! Accumulates decoded samples since the last successful flush and merges
//! them into a per-day CSV file with an atomic write.
//!
//! ## Flush Policy
//! A flush is due when the buffer reaches the record threshold, or when the
//! buffer is non-empty and the time threshold has elapsed since the last
//! successful flush. The lifecycle controller additionally forces a final
//! flush on stop so a clean shutdown never discards data.
//!
//! ## Atomicity
//! Every flush rewrites the complete day file: existing rows are read back,
//! new rows appended, and the merged set written to a temporary file in the
//! same directory which then atomically replaces the target. An external
//! reader of the day file sees either the pre-flush or the post-flush
//! content, never a partial write. On failure the buffer and flush timestamp
//! are left untouched, so the next attempt retries the same records without
//! loss or duplication; the temporary file is removed either way.
//!
//! ## File Layout
//! ```text
//! <output_dir>/hygrolog_YYYY-MM-DD.csv
//! Device Timestamp, Temp1 (°C), RH1 (%), Temp2 (°C), RH2 (%), Heat Index 1, Heat Index 2
//! ```
//! Rows accumulate across the logical calendar day; the day is evaluated at
//! flush time, so a session spanning midnight rolls to a new file naturally.
//! Single-channel variants leave the channel 2 columns empty.

use crate::error::PersistenceError;
use crate::sample::Sample;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

/// Column order of the persisted store.
pub const CSV_HEADER: [&str; 7] = [
    "Device Timestamp",
    "Temp1 (°C)",
    "RH1 (%)",
    "Temp2 (°C)",
    "RH2 (%)",
    "Heat Index 1",
    "Heat Index 2",
];

/// Persistence buffer plus the count/time flush policy.
pub struct Recorder {
    output_dir: PathBuf,
    record_threshold: usize,
    time_threshold: Duration,
    buffer: Vec<Sample>,
    last_flush: Instant,
}

impl Recorder {
    pub fn new(output_dir: PathBuf, record_threshold: usize, time_threshold: Duration) -> Self {
        Self {
            output_dir,
            record_threshold,
            time_threshold,
            buffer: Vec::new(),
            last_flush: Instant::now(),
        }
    }

    /// Append a sample to the in-memory buffer.
    pub fn record(&mut self, sample: Sample) {
        self.buffer.push(sample);
    }

    /// Number of records waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the flush policy says it is time to persist.
    pub fn should_flush(&self, now: Instant) -> bool {
        self.buffer.len() >= self.record_threshold
            || (!self.buffer.is_empty()
                && now.saturating_duration_since(self.last_flush) >= self.time_threshold)
    }

    /// Path of the day file for the given logical calendar day.
    pub fn day_file(&self, day: NaiveDate) -> PathBuf {
        self.output_dir
            .join(format!("hygrolog_{}.csv", day.format("%Y-%m-%d")))
    }

    /// Merge the buffer into the current day file via temp-write-then-replace.
    ///
    /// On success the buffer is cleared and the flush timestamp set together;
    /// on failure both are left unchanged for the retry. Returns the number
    /// of records persisted by this call.
    pub fn flush(&mut self, now: Instant) -> Result<usize, PersistenceError> {
        if self.buffer.is_empty() {
            self.last_flush = now;
            return Ok(0);
        }

        let target = self.day_file(Local::now().date_naive());
        let existing = match read_existing(&target) {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("{}; treating the day file as empty", e);
                Vec::new()
            }
        };

        log::debug!(
            "Flushing {} buffered records ({} already on disk) to {}",
            self.buffer.len(),
            existing.len(),
            target.display()
        );

        let mut tmp = NamedTempFile::new_in(&self.output_dir)
            .map_err(|e| PersistenceError::WriteTemp(csv::Error::from(e)))?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            writer
                .write_record(&CSV_HEADER)
                .map_err(PersistenceError::WriteTemp)?;
            for record in &existing {
                writer.write_record(record).map_err(PersistenceError::WriteTemp)?;
            }
            for sample in &self.buffer {
                writer
                    .write_record(&sample_row(sample))
                    .map_err(PersistenceError::WriteTemp)?;
            }
            writer
                .flush()
                .map_err(|e| PersistenceError::WriteTemp(csv::Error::from(e)))?;
        }

        // Dropping a failed PersistError also deletes the temporary file.
        tmp.persist(&target)
            .map_err(|e| PersistenceError::Replace(e.error))?;

        let flushed = self.buffer.len();
        self.buffer.clear();
        self.last_flush = now;

        log::info!(
            "Saved {} records to {} ({} rows total)",
            flushed,
            target.display(),
            existing.len() + flushed
        );
        Ok(flushed)
    }
}

/// Read back the rows already persisted for the day.
///
/// A missing file is the normal first-flush case. Any other failure is
/// reported to the caller, which degrades to "no prior rows" rather than
/// aborting the flush.
fn read_existing(path: &Path) -> Result<Vec<csv::StringRecord>, PersistenceError> {
    let mut reader = match csv::ReaderBuilder::new().has_headers(true).from_path(path) {
        Ok(reader) => reader,
        Err(e) => {
            if let csv::ErrorKind::Io(io_err) = e.kind() {
                if io_err.kind() == std::io::ErrorKind::NotFound {
                    return Ok(Vec::new());
                }
            }
            return Err(PersistenceError::ReadExisting {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => {
                return Err(PersistenceError::ReadExisting {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }
    Ok(rows)
}

fn sample_row(sample: &Sample) -> [String; 7] {
    let (temp2, rh2, heat_index2) = match &sample.channel2 {
        Some(ch2) => (
            ch2.temperature.to_string(),
            ch2.relative_humidity.to_string(),
            ch2.heat_index.to_string(),
        ),
        None => (String::new(), String::new(), String::new()),
    };

    [
        sample.device_timestamp.clone(),
        sample.channel1.temperature.to_string(),
        sample.channel1.relative_humidity.to_string(),
        temp2,
        rh2,
        sample.channel1.heat_index.to_string(),
        heat_index2,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::ChannelReading;
    use tempfile::tempdir;

    fn sample(secs: u32, temp: f64) -> Sample {
        Sample {
            device_timestamp: format!("01/01/2024 10:00:{:02}", secs),
            channel1: ChannelReading {
                temperature: temp,
                relative_humidity: 55.0,
                heat_index: temp + 1.0,
            },
            channel2: None,
        }
    }

    fn recorder(dir: &Path, record_threshold: usize, time_threshold: Duration) -> Recorder {
        Recorder::new(dir.to_path_buf(), record_threshold, time_threshold)
    }

    fn day_rows(recorder: &Recorder) -> Vec<String> {
        let path = recorder.day_file(Local::now().date_naive());
        std::fs::read_to_string(path)
            .expect("day file readable")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_should_flush_count_threshold() {
        let dir = tempdir().unwrap();
        let mut rec = recorder(dir.path(), 2, Duration::from_secs(3600));

        rec.record(sample(0, 22.5));
        assert!(!rec.should_flush(Instant::now()));

        rec.record(sample(1, 22.6));
        assert!(rec.should_flush(Instant::now()));
    }

    #[test]
    fn test_should_flush_time_threshold_needs_data() {
        let dir = tempdir().unwrap();
        let rec = recorder(dir.path(), 100, Duration::from_millis(1));

        // Empty buffer never flushes, however long it has been.
        assert!(!rec.should_flush(Instant::now() + Duration::from_secs(60)));
    }

    #[test]
    fn test_should_flush_time_threshold() {
        let dir = tempdir().unwrap();
        let mut rec = recorder(dir.path(), 100, Duration::from_secs(300));

        rec.record(sample(0, 22.5));
        assert!(!rec.should_flush(Instant::now()));
        assert!(rec.should_flush(Instant::now() + Duration::from_secs(301)));
    }

    #[test]
    fn test_flush_writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let mut rec = recorder(dir.path(), 60, Duration::from_secs(300));

        rec.record(sample(0, 22.5));
        rec.record(sample(1, 22.75));
        let flushed = rec.flush(Instant::now()).expect("flush succeeds");

        assert_eq!(flushed, 2);
        assert_eq!(rec.pending(), 0);

        let rows = day_rows(&rec);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("Device Timestamp"));
        assert_eq!(rows[1], "01/01/2024 10:00:00,22.5,55,,,23.5,");
        assert_eq!(rows[2], "01/01/2024 10:00:01,22.75,55,,,23.75,");
    }

    #[test]
    fn test_flush_merges_with_existing_rows() {
        let dir = tempdir().unwrap();
        let mut rec = recorder(dir.path(), 60, Duration::from_secs(300));

        rec.record(sample(0, 22.5));
        rec.record(sample(1, 22.6));
        rec.flush(Instant::now()).expect("first flush");

        rec.record(sample(2, 22.7));
        rec.flush(Instant::now()).expect("second flush");

        let rows = day_rows(&rec);
        assert_eq!(rows.len(), 4);
        assert!(rows[1].starts_with("01/01/2024 10:00:00"));
        assert!(rows[2].starts_with("01/01/2024 10:00:01"));
        assert!(rows[3].starts_with("01/01/2024 10:00:02"));
    }

    #[test]
    fn test_flush_dual_channel_row() {
        let dir = tempdir().unwrap();
        let mut rec = recorder(dir.path(), 60, Duration::from_secs(300));

        let mut s = sample(0, 22.5);
        s.channel2 = Some(ChannelReading {
            temperature: -3.25,
            relative_humidity: 80.5,
            heat_index: -2.0,
        });
        rec.record(s);
        rec.flush(Instant::now()).expect("flush succeeds");

        let rows = day_rows(&rec);
        assert_eq!(rows[1], "01/01/2024 10:00:00,22.5,55,-3.25,80.5,23.5,-2");
    }

    #[test]
    fn test_failed_flush_keeps_buffer_for_retry() {
        let dir = tempdir().unwrap();
        let mut rec = recorder(dir.path(), 60, Duration::from_secs(300));

        // Occupy the target path with a directory so the atomic replace fails.
        let target = rec.day_file(Local::now().date_naive());
        std::fs::create_dir(&target).unwrap();

        rec.record(sample(0, 22.5));
        let err = rec.flush(Instant::now()).unwrap_err();
        assert!(matches!(err, PersistenceError::Replace(_)));
        assert_eq!(rec.pending(), 1);

        // The failed attempt leaked no temporary file.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);

        // Retry persists exactly the once-buffered record.
        std::fs::remove_dir(&target).unwrap();
        let flushed = rec.flush(Instant::now()).expect("retry succeeds");
        assert_eq!(flushed, 1);

        let rows = day_rows(&rec);
        assert_eq!(rows.len(), 2);
        assert!(rows[1].starts_with("01/01/2024 10:00:00"));
    }

    #[test]
    fn test_flush_empty_buffer_is_noop() {
        let dir = tempdir().unwrap();
        let mut rec = recorder(dir.path(), 60, Duration::from_secs(300));

        assert_eq!(rec.flush(Instant::now()).expect("empty flush"), 0);
        assert!(!rec.day_file(Local::now().date_naive()).exists());
    }

    #[test]
    fn test_unreadable_existing_file_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let mut rec = recorder(dir.path(), 60, Duration::from_secs(300));

        // A malformed day file (ragged row widths) must not block the flush.
        let target = rec.day_file(Local::now().date_naive());
        std::fs::write(&target, "Device Timestamp\nbroken,row,here\n").unwrap();

        rec.record(sample(0, 22.5));
        rec.flush(Instant::now()).expect("flush succeeds");

        let rows = day_rows(&rec);
        assert_eq!(rows.len(), 2);
        assert!(rows[1].starts_with("01/01/2024 10:00:00"));
    }
}
