//! Durable, append-only persistence of cell results.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LoadTestError, LoadTestResult};
use crate::metrics::RunResult;

/// Column header of the results file, in [`RunResult`] field order.
pub const CSV_HEADER: &str =
    "concurrency,max_tokens,n,p50,p95,p99,p999,mean,wall_sec,rps,tok_per_sec,errors";

/// Destination for per-cell results.
pub trait ResultSink {
    /// Persist one result. An error here aborts the run.
    fn append(&mut self, result: &RunResult) -> LoadTestResult<()>;
}

/// Appends one CSV row per result to a file.
///
/// The header is written only when the file does not exist yet, so repeated
/// runs against the same path keep extending one table. Single writer only.
#[derive(Debug, Clone)]
pub struct CsvResultSink {
    path: PathBuf,
}

impl CsvResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> LoadTestError {
        LoadTestError::SinkIo {
            path: self.path.clone(),
            source,
        }
    }
}

impl ResultSink for CsvResultSink {
    fn append(&mut self, result: &RunResult) -> LoadTestResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer
            .serialize(result)
            .map_err(|source| LoadTestError::SinkWrite {
                path: self.path.clone(),
                source,
            })?;
        writer.flush().map_err(|e| self.io_error(e))?;

        debug!(
            path = %self.path.display(),
            concurrency = result.concurrency,
            max_tokens = result.max_tokens,
            header = write_header,
            "Appended result row"
        );
        Ok(())
    }
}

/// Keeps results in memory. Useful for embedding the harness and in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub results: Vec<RunResult>,
}

impl ResultSink for MemorySink {
    fn append(&mut self, result: &RunResult) -> LoadTestResult<()> {
        self.results.push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::aggregate;

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("results.csv");
        let mut sink = CsvResultSink::new(&path);

        sink.append(&aggregate(&[0.1, 0.2], 0, 1.0, 1, 16)).unwrap();
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("1,16,2,"));

        for c in 0..5 {
            sink.append(&aggregate(&[0.3], 1, 1.0, c + 2, 64)).unwrap();
        }
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 7);
        assert_eq!(lines.iter().filter(|l| l.as_str() == CSV_HEADER).count(), 1);
    }

    #[test]
    fn test_existing_file_is_extended_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        CsvResultSink::new(&path)
            .append(&aggregate(&[0.1], 0, 1.0, 1, 16))
            .unwrap();
        // A later invocation against the same file
        CsvResultSink::new(&path)
            .append(&aggregate(&[0.2], 0, 1.0, 2, 16))
            .unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[2].starts_with("2,16,1,"));
    }

    #[test]
    fn test_degenerate_result_round_trips_as_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        CsvResultSink::new(&path)
            .append(&aggregate(&[], 4, 0.0, 2, 16))
            .unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<RunResult> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].n, 0);
        assert_eq!(rows[0].errors, 4);
        assert!(rows[0].p50.is_nan());
        assert!(rows[0].mean.is_nan());
        assert!(rows[0].requests_per_second.is_nan());
    }

    #[test]
    fn test_unwritable_path_is_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let mut sink = CsvResultSink::new(blocker.join("results.csv"));
        let err = sink.append(&aggregate(&[0.1], 0, 1.0, 1, 16)).unwrap_err();
        assert!(err.is_sink_error());
    }
}
