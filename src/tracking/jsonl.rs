//! Append-only JSON-lines sink.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{MetricsSink, Record};
use crate::error::TrackingError;

/// Writes one JSON object per record to
/// `<dir>/<experiment>/<run_id>/metrics.jsonl`, one file per run.
#[derive(Debug)]
pub struct JsonlSink {
    folder: PathBuf,
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    closed: bool,
}

impl JsonlSink {
    /// Sink for `experiment` under `dir`. Files are created per run by
    /// [`MetricsSink::start_run`].
    pub fn open(dir: impl AsRef<Path>, experiment: &str) -> Result<Self, TrackingError> {
        let folder = dir.as_ref().join(experiment);
        fs::create_dir_all(&folder)?;
        Ok(Self {
            folder,
            path: None,
            writer: None,
            closed: false,
        })
    }

    /// Log file of the current run.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn write(&mut self, record: &Record) -> Result<(), TrackingError> {
        if self.closed {
            return Err(TrackingError::Closed);
        }
        let writer = self.writer.as_mut().ok_or(TrackingError::NoActiveRun)?;
        let line = serde_json::to_string(record)?;
        writeln!(writer, "{}", line)?;
        Ok(())
    }
}

impl MetricsSink for JsonlSink {
    fn start_run(&mut self, run_id: &str) -> Result<(), TrackingError> {
        if self.closed {
            return Err(TrackingError::Closed);
        }
        if let Some(mut previous) = self.writer.take() {
            previous.flush()?;
        }
        let folder = self.folder.join(run_id);
        fs::create_dir_all(&folder)?;
        let path = folder.join("metrics.jsonl");
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.writer = Some(BufWriter::new(file));
        self.path = Some(path);
        Ok(())
    }

    fn log_param(&mut self, name: &str, value: &str) -> Result<(), TrackingError> {
        self.write(&Record::Param {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    fn log_metric(&mut self, name: &str, value: f64, step: Option<usize>) -> Result<(), TrackingError> {
        self.write(&Record::Metric {
            name: name.to_string(),
            value,
            step,
        })
    }

    fn close(&mut self) -> Result<(), TrackingError> {
        if self.closed {
            return Err(TrackingError::Closed);
        }
        self.closed = true;
        match self.writer.take() {
            Some(mut writer) => Ok(writer.flush()?),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::open(dir.path(), "test").unwrap();
        sink.start_run("run-a").unwrap();
        sink.log_param("seed", "7").unwrap();
        sink.log_metric("loss", -1.25, Some(3)).unwrap();
        sink.close().unwrap();

        let text = std::fs::read_to_string(dir.path().join("test").join("run-a").join("metrics.jsonl")).unwrap();
        let records: Vec<Record> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(
            records,
            vec![
                Record::Param {
                    name: "seed".into(),
                    value: "7".into()
                },
                Record::Metric {
                    name: "loss".into(),
                    value: -1.25,
                    step: Some(3)
                },
            ]
        );
        assert!(matches!(sink.log_metric("loss", 0.0, None), Err(TrackingError::Closed)));
    }

    #[test]
    fn runs_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::open(dir.path(), "test").unwrap();
        assert!(matches!(sink.log_param("seed", "1"), Err(TrackingError::NoActiveRun)));

        sink.start_run("run-a").unwrap();
        sink.log_param("seed", "1").unwrap();
        sink.start_run("run-b").unwrap();
        sink.log_param("seed", "2").unwrap();
        sink.close().unwrap();

        let read = |run: &str| {
            std::fs::read_to_string(dir.path().join("test").join(run).join("metrics.jsonl")).unwrap()
        };
        assert_eq!(read("run-a").lines().count(), 1);
        assert_eq!(read("run-b").lines().count(), 1);
        assert!(read("run-b").contains(r#""value":"2""#));
    }
}
