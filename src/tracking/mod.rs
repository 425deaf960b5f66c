//! Experiment tracking.
//!
//! The trainer reports hyperparameters once and metrics as it goes through a
//! [`MetricsSink`]. Every training run announces its run id first, so records
//! of separate runs never share a scope. Sinks are collaborators: a failed
//! write is reported by the caller and never retried, and it never touches
//! training state.

mod jsonl;

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::TrackingError;

pub use jsonl::JsonlSink;

/// One tracked record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    /// A hyperparameter, logged once per run.
    Param {
        /// Parameter name.
        name: String,
        /// Rendered value.
        value: String,
    },
    /// A metric value, optionally tied to a training step.
    Metric {
        /// Metric name.
        name: String,
        /// Value.
        value: f64,
        /// Training step the value belongs to.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        step: Option<usize>,
    },
}

/// Destination for tracking records.
pub trait MetricsSink: Send {
    /// Scope every following record to `run_id`.
    fn start_run(&mut self, _run_id: &str) -> Result<(), TrackingError> {
        Ok(())
    }

    /// Record a hyperparameter.
    fn log_param(&mut self, name: &str, value: &str) -> Result<(), TrackingError>;

    /// Record a metric.
    fn log_metric(&mut self, name: &str, value: f64, step: Option<usize>) -> Result<(), TrackingError>;

    /// Flush and release the sink. Further writes fail with [`TrackingError::Closed`].
    fn close(&mut self) -> Result<(), TrackingError> {
        Ok(())
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn log_param(&mut self, _name: &str, _value: &str) -> Result<(), TrackingError> {
        Ok(())
    }

    fn log_metric(&mut self, _name: &str, _value: f64, _step: Option<usize>) -> Result<(), TrackingError> {
        Ok(())
    }
}

/// In-memory sink; clones share the same record list.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
    runs: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<bool>>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Run ids started on this sink, in order.
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Value of parameter `name`, if logged.
    pub fn param(&self, name: &str) -> Option<String> {
        self.records().into_iter().find_map(|r| match r {
            Record::Param { name: n, value } if n == name => Some(value),
            _ => None,
        })
    }

    /// Every value logged for metric `name`, in order.
    pub fn metric(&self, name: &str) -> Vec<(Option<usize>, f64)> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                Record::Metric { name: n, value, step } if n == name => Some((step, value)),
                _ => None,
            })
            .collect()
    }

    /// Whether [`MetricsSink::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.lock().map(|c| *c).unwrap_or(true)
    }

    fn push(&self, record: Record) -> Result<(), TrackingError> {
        if self.is_closed() {
            return Err(TrackingError::Closed);
        }
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
        Ok(())
    }
}

impl MetricsSink for MemorySink {
    fn start_run(&mut self, run_id: &str) -> Result<(), TrackingError> {
        if self.is_closed() {
            return Err(TrackingError::Closed);
        }
        if let Ok(mut runs) = self.runs.lock() {
            runs.push(run_id.to_string());
        }
        Ok(())
    }

    fn log_param(&mut self, name: &str, value: &str) -> Result<(), TrackingError> {
        self.push(Record::Param {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    fn log_metric(&mut self, name: &str, value: f64, step: Option<usize>) -> Result<(), TrackingError> {
        self.push(Record::Metric {
            name: name.to_string(),
            value,
            step,
        })
    }

    fn close(&mut self) -> Result<(), TrackingError> {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
        Ok(())
    }
}
