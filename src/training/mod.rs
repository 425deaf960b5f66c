//! Stochastic gradient training of a design policy.
//!
//! Each step estimates `−PCE` with gradients, takes one AdamW step and
//! records the loss. Every `eval_interval` steps a separate gradient-free
//! estimate is logged as the `loss` metric. Every `anneal_interval` steps
//! the learning rate is multiplied by `decay_gamma`. Both checks include
//! step 0.
//!
//! The random baseline has nothing to learn, so the loop is skipped and one
//! direct loss estimate stands in for the summary.

mod context;
mod schedule;
mod summary;

use std::path::PathBuf;

use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use tracing::{debug, info, warn};

pub use context::TrainingContext;
pub use schedule::StepDecay;
pub use summary::FitSummary;

use crate::artifact::{ArtifactStore, RunRecord};
use crate::constants::ADAM_EPS;
use crate::error::Result;
use crate::estimator::PriorContrastiveEstimation;
use crate::experiment::{Evaluation, LocationFinding};
use crate::types::DesignNetworkType;
use crate::Config;

/// Drives one training run.
#[derive(Debug)]
pub struct Trainer {
    config: Config,
    experiment: LocationFinding,
    estimator: PriorContrastiveEstimation,
    schedule: StepDecay,
    context: TrainingContext,
    artifacts: Option<ArtifactStore>,
    loss_history: Vec<f64>,
}

impl Trainer {
    /// Validate `config`, build the experiment and optimizer, and log the
    /// run's hyperparameters.
    pub fn new(config: Config, mut context: TrainingContext) -> Result<Self> {
        config.validate()?;
        let experiment = LocationFinding::new(&config, context.sampler_mut())?;
        let estimator = PriorContrastiveEstimation::new(config.num_outer_samples, config.num_inner_samples)?;
        let schedule = StepDecay::new(config.decay_gamma, config.anneal_interval);

        if experiment.kind().is_trainable() {
            let (beta1, beta2) = config.adam_betas;
            let params = ParamsAdamW {
                lr: config.learning_rate,
                beta1,
                beta2,
                eps: ADAM_EPS,
                weight_decay: config.weight_decay,
            };
            context.set_optimizer(AdamW::new(experiment.policy().parameters(), params)?);
        }

        let mut trainer = Self {
            config,
            experiment,
            estimator,
            schedule,
            context,
            artifacts: None,
            loss_history: Vec::new(),
        };
        trainer.context.start_run();
        trainer.log_params();
        Ok(trainer)
    }

    /// Trainer for `config` that discards tracking records.
    pub fn from_config(config: Config) -> Result<Self> {
        let context = TrainingContext::untracked(&config)?;
        Self::new(config, context)
    }

    /// Persist the trained policy into `store` when training ends.
    pub fn with_artifacts(mut self, store: ArtifactStore) -> Self {
        self.artifacts = Some(store);
        self
    }

    /// The experiment being trained.
    pub fn experiment(&self) -> &LocationFinding {
        &self.experiment
    }

    /// Losses recorded so far.
    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    /// Current learning rate, if the policy is trainable.
    pub fn learning_rate(&mut self) -> Option<f64> {
        self.context.optimizer_mut().map(|o| o.learning_rate())
    }

    fn log_params(&mut self) {
        let c = &self.config;
        let kind = self.experiment.kind();
        let mut params: Vec<(&str, String)> = vec![
            ("seed", self.context.seed().to_string()),
            ("base_signal", c.base_signal.to_string()),
            ("max_signal", c.max_signal.to_string()),
            ("noise_scale", c.noise_scale.to_string()),
            ("num_experiments", c.num_rounds.to_string()),
            ("num_sources", c.num_sources.to_string()),
            ("physical_dim", c.physical_dim.to_string()),
            ("design_network_type", kind.to_string()),
        ];
        if kind == DesignNetworkType::Adaptive {
            params.push(("hidden_dim", c.hidden_dim.to_string()));
            params.push(("encoding_dim", c.encoding_dim.to_string()));
        }
        params.extend([
            ("num_inner_samples", c.num_inner_samples.to_string()),
            ("num_outer_samples", c.num_outer_samples.to_string()),
            ("num_steps", c.effective_num_steps().to_string()),
            ("lr", c.learning_rate.to_string()),
            ("gamma", c.decay_gamma.to_string()),
            ("adam_beta1", c.adam_betas.0.to_string()),
            ("adam_beta2", c.adam_betas.1.to_string()),
            ("adam_weight_decay", c.weight_decay.to_string()),
        ]);
        for (name, value) in params {
            self.context.log_param(name, value);
        }
    }

    /// One gradient step. Returns the loss it was computed from.
    pub fn step(&mut self) -> Result<f64> {
        let loss = self
            .estimator
            .differentiable_loss(&self.experiment, self.context.sampler_mut())?;
        let value = loss.to_scalar::<f32>()? as f64;
        if let Some(optimizer) = self.context.optimizer_mut() {
            optimizer.backward_step(&loss)?;
        }
        self.loss_history.push(value);
        Ok(value)
    }

    /// Gradient-free loss estimate with fresh samples.
    pub fn evaluate_loss(&mut self) -> Result<f64> {
        self.estimator
            .evaluate_loss(&self.experiment, self.context.sampler_mut())
    }

    /// Run the full schedule, summarise, persist and report.
    pub fn fit(mut self) -> Result<FitOutcome> {
        let num_steps = self.config.effective_num_steps();
        let seed = self.context.seed();
        info!(
            "training {} policy: {} steps, N={}, L={}, seed={}",
            self.experiment.kind(),
            num_steps,
            self.estimator.num_outer_samples(),
            self.estimator.num_inner_samples(),
            seed
        );
        if let Some(bar) = self.context.progress() {
            bar.set_length(num_steps as u64);
        }

        for step in 0..num_steps {
            self.step()?;

            if step % self.config.eval_interval == 0 {
                let loss = self.evaluate_loss()?;
                self.context.log_metric("loss", loss, Some(step));
                if let Some(bar) = self.context.progress() {
                    bar.set_message(format!("Loss: {:.3}", loss));
                }
                debug!("step {}: evaluation loss {:.4}", step, loss);
            }

            if let Some(optimizer) = self.context.optimizer_mut() {
                if let Some(lr) = self.schedule.next(optimizer.learning_rate(), step) {
                    optimizer.set_learning_rate(lr);
                    debug!("step {}: learning rate decayed to {:e}", step, lr);
                }
            }

            if let Some(bar) = self.context.progress() {
                bar.inc(1);
            }
        }

        let summary = match FitSummary::from_history(&self.loss_history, self.config.summary_window) {
            Some(summary) => summary,
            None => {
                let loss = self.evaluate_loss()?;
                self.context.log_metric("loss", loss, None);
                FitSummary::single_shot(loss)
            }
        };
        self.context.log_metric("loss_diff50", summary.loss_diff50, None);
        self.context.log_metric("loss_av50", summary.loss_av50, None);
        info!(
            "training finished: loss_av50={:.4}, loss_diff50={:+.4}",
            summary.loss_av50, summary.loss_diff50
        );

        let run_id = self.context.run_id().to_string();
        let model_location = self.artifacts.as_ref().and_then(|store| {
            let record = RunRecord {
                run_id: run_id.clone(),
                seed,
                summary,
            };
            match store.save(&self.experiment, &record) {
                Ok(path) => {
                    info!("model saved to {}", path.display());
                    Some(path)
                }
                Err(e) => {
                    warn!("failed to save model: {}", e);
                    None
                }
            }
        });

        let evaluation = if self.config.n_trace > 0 {
            let theta = self.config.eval_theta.clone();
            Some(self.experiment.evaluate(
                self.config.n_trace,
                theta.as_deref(),
                self.config.verbose,
                self.context.sampler_mut(),
            )?)
        } else {
            None
        };

        let learning_rate = self.learning_rate();
        self.context.finish();
        Ok(FitOutcome {
            run_id,
            learning_rate,
            seed,
            loss_history: self.loss_history,
            summary,
            experiment: self.experiment,
            model_location,
            evaluation,
        })
    }
}

/// Everything a finished training run produced.
#[derive(Debug)]
pub struct FitOutcome {
    /// Run identifier, also the artifact directory name.
    pub run_id: String,
    /// Seed actually used.
    pub seed: u64,
    /// Learning rate in effect when training stopped; `None` for the random baseline.
    pub learning_rate: Option<f64>,
    /// Training loss per step.
    pub loss_history: Vec<f64>,
    /// Summary statistics over `loss_history`.
    pub summary: FitSummary,
    /// The trained experiment.
    pub experiment: LocationFinding,
    /// Where the artifact was saved, if it was.
    pub model_location: Option<PathBuf>,
    /// Post-training evaluation report; `None` when `n_trace` is 0.
    pub evaluation: Option<Evaluation>,
}

impl FitOutcome {
    /// Lower-bound estimate of expected information gain (nats).
    pub fn eig_estimate(&self) -> f64 {
        -self.summary.loss_av50
    }
}
