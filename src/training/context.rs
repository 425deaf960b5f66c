//! Per-run mutable state handed to the trainer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use candle_nn::AdamW;
use indicatif::ProgressBar;
use tracing::warn;

use crate::error::Result;
use crate::rollout::Sampler;
use crate::tracking::{MetricsSink, NoopSink};
use crate::Config;

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Random stream, optimizer state and metrics sink for one training run.
///
/// Nothing here outlives the run: [`TrainingContext::finish`] closes the sink
/// and drops the optimizer.
pub struct TrainingContext {
    run_id: String,
    sampler: Sampler,
    sink: Box<dyn MetricsSink>,
    optimizer: Option<AdamW>,
    progress: Option<ProgressBar>,
}

impl TrainingContext {
    /// Context around an existing sampler and sink.
    pub fn new(sampler: Sampler, sink: Box<dyn MetricsSink>) -> Self {
        Self {
            run_id: run_id(sampler.seed()),
            sampler,
            sink,
            optimizer: None,
            progress: None,
        }
    }

    /// Context for `config`: resolves the device and seeds the sampler.
    ///
    /// Without a configured seed one is drawn from OS entropy.
    pub fn from_config(config: &Config, sink: Box<dyn MetricsSink>) -> Result<Self> {
        let device = config.resolve_device()?;
        let sampler = match config.seed {
            Some(seed) => Sampler::new(seed, &device),
            None => Sampler::from_entropy(&device),
        };
        Ok(Self::new(sampler, sink))
    }

    /// Context for `config` that discards all tracking records.
    pub fn untracked(config: &Config) -> Result<Self> {
        Self::from_config(config, Box::new(NoopSink))
    }

    /// Show progress on `bar`.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Identifier of this run, unique within the process.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Seed of the run's random stream.
    pub fn seed(&self) -> u64 {
        self.sampler.seed()
    }

    /// The run's random stream.
    pub fn sampler_mut(&mut self) -> &mut Sampler {
        &mut self.sampler
    }

    pub(crate) fn set_optimizer(&mut self, optimizer: AdamW) {
        self.optimizer = Some(optimizer);
    }

    pub(crate) fn optimizer_mut(&mut self) -> Option<&mut AdamW> {
        self.optimizer.as_mut()
    }

    pub(crate) fn progress(&self) -> Option<&ProgressBar> {
        self.progress.as_ref()
    }

    /// Open this run's scope on the sink; failures are reported and dropped.
    pub fn start_run(&mut self) {
        if let Err(e) = self.sink.start_run(&self.run_id) {
            warn!("failed to start tracking run {}: {}", self.run_id, e);
        }
    }

    /// Record a hyperparameter; failures are reported and dropped.
    pub fn log_param(&mut self, name: &str, value: impl ToString) {
        if let Err(e) = self.sink.log_param(name, &value.to_string()) {
            warn!("failed to log param {}: {}", name, e);
        }
    }

    /// Record a metric; failures are reported and dropped.
    pub fn log_metric(&mut self, name: &str, value: f64, step: Option<usize>) {
        if let Err(e) = self.sink.log_metric(name, value, step) {
            warn!("failed to log metric {}: {}", name, e);
        }
    }

    /// Tear the context down.
    pub fn finish(mut self) {
        if let Some(bar) = self.progress.take() {
            bar.finish_with_message("done");
        }
        if let Err(e) = self.sink.close() {
            warn!("failed to close metrics sink: {}", e);
        }
    }
}

impl std::fmt::Debug for TrainingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingContext")
            .field("run_id", &self.run_id)
            .field("sampler", &self.sampler)
            .field("has_optimizer", &self.optimizer.is_some())
            .finish()
    }
}

/// Start time in milliseconds, the seed and a per-process counter.
fn run_id(seed: u64) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let n = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:016x}-{}", millis, seed, n)
}
