//! Rotating result-file output.
//!
//! Each round's records are appended to a file created under a temporary
//! name and renamed to its final name only once the round is over, so a
//! partially-written file is never visible as `results-*.json`. A crash
//! mid-round leaves only a `.tmp` artifact.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, warn};

use crate::record::ResultRecord;

/// Failure to open a new results file.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("error creating results file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

struct OpenFile {
    writer: BufWriter<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

/// Owns the rotating output file for persisted result records.
///
/// At most one file is open at a time. Constructed with `None` the sink is
/// disabled: [`rotate`](Self::rotate) and [`write`](Self::write) become
/// no-ops and nothing ever touches the disk.
pub struct ResultSink {
    dir: Option<PathBuf>,
    file: Option<OpenFile>,
}

impl ResultSink {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir, file: None }
    }

    /// Whether persistence was requested.
    pub fn enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Finalizes the current file (if any) and opens a new one under a
    /// temporary name derived from the current unix time, one-second
    /// granularity. Rotating more than once per second can collide on the
    /// final name.
    ///
    /// On error no file is left open.
    pub fn rotate(&mut self) -> Result<(), OutputError> {
        self.close();

        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let final_path = dir.join(format!("results-{}.json", unix_seconds_now()));
        let tmp_path = final_path.with_extension("json.tmp");

        let file = File::create(&tmp_path).map_err(|source| OutputError::Create {
            path: tmp_path.clone(),
            source,
        })?;

        debug!(path = %tmp_path.display(), "Opened results file");
        self.file = Some(OpenFile {
            writer: BufWriter::new(file),
            tmp_path,
            final_path,
        });
        Ok(())
    }

    /// Appends one record as a JSON line. A no-op when no file is open.
    pub fn write(&mut self, record: &ResultRecord) {
        let Some(open) = &mut self.file else {
            return;
        };

        let result = serde_json::to_writer(&mut open.writer, record)
            .map_err(std::io::Error::from)
            .and_then(|()| open.writer.write_all(b"\n"));
        if let Err(e) = result {
            warn!(
                path = %open.tmp_path.display(),
                error = %e,
                "Failed to write result record"
            );
        }
    }

    /// Finalizes the current file: flush, close, rename `.tmp` to the final
    /// name. Idempotent; safe to call with no file open.
    pub fn close(&mut self) {
        let Some(mut open) = self.file.take() else {
            return;
        };

        if let Err(e) = open.writer.flush() {
            warn!(
                path = %open.tmp_path.display(),
                error = %e,
                "Failed to flush results file"
            );
        }
        drop(open.writer);

        if let Err(e) = fs::rename(&open.tmp_path, &open.final_path) {
            warn!(
                from = %open.tmp_path.display(),
                to = %open.final_path.display(),
                error = %e,
                "Failed to finalize results file"
            );
        } else {
            debug!(path = %open.final_path.display(), "Finalized results file");
        }
    }
}

impl Drop for ResultSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(seq: u64) -> ResultRecord {
        ResultRecord {
            seq,
            method: "GET".to_string(),
            url: "http://127.0.0.1/".to_string(),
            status: 200,
            timestamp_ms: 0,
            latency_us: 1_000,
            bytes_in: 10,
            error: None,
        }
    }

    fn result_files(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn close_without_rotate_is_safe() {
        let mut sink = ResultSink::new(None);
        sink.close();
        sink.close();
    }

    #[test]
    fn write_without_open_file_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ResultSink::new(Some(dir.path().to_path_buf()));
        sink.write(&record(0));
        assert!(result_files(dir.path()).is_empty());
    }

    #[test]
    fn disabled_sink_never_touches_disk() {
        let mut sink = ResultSink::new(None);
        assert!(!sink.enabled());
        sink.rotate().unwrap();
        sink.write(&record(0));
        sink.close();
    }

    #[test]
    fn rotate_write_close_produces_final_json_lines_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ResultSink::new(Some(dir.path().to_path_buf()));

        sink.rotate().unwrap();
        sink.write(&record(0));
        sink.write(&record(1));
        sink.close();

        let names = result_files(dir.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("results-"));
        assert!(names[0].ends_with(".json"));

        let content = fs::read_to_string(dir.path().join(&names[0])).unwrap();
        let records: Vec<ResultRecord> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records, vec![record(0), record(1)]);
    }

    #[test]
    fn file_is_temporary_until_finalized() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ResultSink::new(Some(dir.path().to_path_buf()));

        sink.rotate().unwrap();
        sink.write(&record(0));

        let names = result_files(dir.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".json.tmp"));

        sink.close();
        let names = result_files(dir.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".json"));
    }

    #[test]
    fn second_rotate_finalizes_the_first_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ResultSink::new(Some(dir.path().to_path_buf()));

        sink.rotate().unwrap();
        sink.write(&record(0));
        // Cross a second boundary so the two rounds get distinct names.
        std::thread::sleep(Duration::from_millis(1_100));
        sink.rotate().unwrap();
        sink.write(&record(1));

        let names = result_files(dir.path());
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with(".json"), "first file finalized: {:?}", names);
        assert!(names[1].ends_with(".json.tmp"), "second file open: {:?}", names);

        sink.close();
        let names = result_files(dir.path());
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.ends_with(".json")));
        // results-<t1>.json sorts before results-<t2>.json for same-width timestamps
        assert!(names[0] < names[1]);
    }

    #[test]
    fn rotate_into_missing_directory_errors_and_leaves_nothing_open() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let mut sink = ResultSink::new(Some(missing));

        assert!(sink.rotate().is_err());
        // Write after a failed rotate must be a no-op, not a panic.
        sink.write(&record(0));
        sink.close();
    }

    #[test]
    fn dropping_the_sink_finalizes_the_open_file() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut sink = ResultSink::new(Some(dir.path().to_path_buf()));
            sink.rotate().unwrap();
            sink.write(&record(0));
        }

        let names = result_files(dir.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".json"));
    }
}
