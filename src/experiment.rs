//! The location-finding experiment: prior, forward model, design box and
//! policy bundled into one runnable unit.

use candle_core::{Device, Tensor};

use crate::error::{Error, Result};
use crate::model::{BoundedTransform, LocationForwardModel, SourcePrior};
use crate::output::terminal;
use crate::policy::DesignPolicy;
use crate::rollout::{Rollout, RolloutMode, Sampler, Trace};
use crate::types::{DesignNetworkType, DesignShape};
use crate::Config;

/// Everything needed to simulate experiments with a given policy.
#[derive(Debug)]
pub struct LocationFinding {
    config: Config,
    prior: SourcePrior,
    forward: LocationForwardModel,
    transform: BoundedTransform,
    policy: DesignPolicy,
    device: Device,
}

impl LocationFinding {
    /// Validate `config` and build the experiment, drawing initial policy
    /// weights from `sampler`.
    pub fn new(config: &Config, sampler: &mut Sampler) -> Result<Self> {
        config.validate()?;
        let device = sampler.device().clone();
        Ok(Self {
            prior: SourcePrior::from_config(config)?,
            forward: LocationForwardModel::from_config(config)?,
            transform: BoundedTransform::from_config(config, &device)?,
            policy: DesignPolicy::from_config(config, sampler)?,
            config: config.clone(),
            device,
        })
    }

    /// Configuration the experiment was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Prior over sources.
    pub fn prior(&self) -> &SourcePrior {
        &self.prior
    }

    /// Forward model.
    pub fn forward(&self) -> &LocationForwardModel {
        &self.forward
    }

    /// Design box transform.
    pub fn transform(&self) -> &BoundedTransform {
        &self.transform
    }

    /// Design policy.
    pub fn policy(&self) -> &DesignPolicy {
        &self.policy
    }

    /// Mutable design policy, for restoring weights.
    pub fn policy_mut(&mut self) -> &mut DesignPolicy {
        &mut self.policy
    }

    /// Policy variant.
    pub fn kind(&self) -> DesignNetworkType {
        self.policy.kind()
    }

    /// Number of rounds `T`.
    pub fn num_rounds(&self) -> usize {
        self.config.num_rounds
    }

    /// Design shape `(n, p)`.
    pub fn design_shape(&self) -> DesignShape {
        self.config.design_shape()
    }

    /// Device tensors are placed on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Start a rollout over `batch` experiments.
    ///
    /// With `theta` (`K * p` values) every experiment shares those sources;
    /// otherwise each draws its own from the prior.
    pub fn start<'a>(
        &'a self,
        batch: usize,
        theta: Option<&[f64]>,
        mode: RolloutMode,
        sampler: &mut Sampler,
    ) -> Result<Rollout<'a>> {
        let theta = match theta {
            Some(values) => self.prior.condition(values, batch, &self.device)?,
            None => self.prior.sample(sampler, &[batch])?,
        };
        Rollout::new(
            &self.policy,
            &self.forward,
            &self.transform,
            theta,
            self.num_rounds(),
            self.design_shape(),
            mode,
        )
    }

    /// Run a full rollout and return its trace.
    pub fn rollout(
        &self,
        batch: usize,
        theta: Option<&[f64]>,
        mode: RolloutMode,
        sampler: &mut Sampler,
    ) -> Result<Trace> {
        let mut rollout = self.start(batch, theta, mode, sampler)?;
        rollout.run(sampler)?;
        rollout.finish()
    }

    /// Gradient-free rollout: designs `[B, T, n, p]` and observations `[B, T, n]`.
    pub fn forward_trace(
        &self,
        batch: usize,
        theta: Option<&[f64]>,
        sampler: &mut Sampler,
    ) -> Result<(Tensor, Tensor)> {
        let trace = self.rollout(batch, theta, RolloutMode::Detached, sampler)?;
        Ok((trace.designs, trace.observations))
    }

    /// Run `n_trace` single experiments and tabulate what the policy did.
    ///
    /// Design coordinates in the report are the transformed ones the forward
    /// model saw.
    pub fn evaluate(
        &self,
        n_trace: usize,
        theta: Option<&[f64]>,
        verbose: bool,
        sampler: &mut Sampler,
    ) -> Result<Evaluation> {
        let mut rows = Vec::new();
        let mut thetas = Vec::with_capacity(n_trace);

        for run_id in 1..=n_trace {
            let trace = self.rollout(1, theta, RolloutMode::Detached, sampler)?;
            let designs = trace.designs.squeeze(0)?.to_dtype(candle_core::DType::F64)?.to_vec3::<f64>()?;
            let observations = trace
                .observations
                .squeeze(0)?
                .to_dtype(candle_core::DType::F64)?
                .to_vec2::<f64>()?;
            let true_theta = trace.theta.squeeze(0)?.to_dtype(candle_core::DType::F64)?.to_vec2::<f64>()?;

            if designs.len() != observations.len() {
                return Err(Error::shape(
                    "evaluation trace",
                    format!("{} rounds of observations", designs.len()),
                    &[observations.len()],
                ));
            }
            for (round, (probes, ys)) in designs.into_iter().zip(observations).enumerate() {
                for (probe, (design, observation)) in probes.into_iter().zip(ys).enumerate() {
                    rows.push(EvaluationRow {
                        run_id,
                        order: round + 1,
                        probe,
                        design,
                        observation,
                    });
                }
            }
            thetas.push(true_theta);
        }

        let evaluation = Evaluation { rows, thetas };
        if verbose {
            println!("{}", terminal::format_evaluation(&evaluation));
        }
        Ok(evaluation)
    }
}

/// One probe of one round of one evaluation run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EvaluationRow {
    /// Evaluation run, 1-based.
    pub run_id: usize,
    /// Round, 1-based.
    pub order: usize,
    /// Probe within the round, 0-based.
    pub probe: usize,
    /// Design coordinates inside the design box.
    pub design: Vec<f64>,
    /// Observed signal.
    pub observation: f64,
}

/// Result of [`LocationFinding::evaluate`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Evaluation {
    /// One row per (run, round, probe).
    pub rows: Vec<EvaluationRow>,
    /// True sources per run, `K x p`.
    pub thetas: Vec<Vec<Vec<f64>>>,
}

impl Evaluation {
    /// Number of runs.
    pub fn num_runs(&self) -> usize {
        self.thetas.len()
    }

    /// Rows belonging to `run_id` (1-based).
    pub fn run(&self, run_id: usize) -> impl Iterator<Item = &EvaluationRow> {
        self.rows.iter().filter(move |r| r.run_id == run_id)
    }

    /// Render as CSV with columns `run_id,order,probe,xi_0..xi_{p-1},observation`.
    pub fn to_csv(&self) -> String {
        let p = self.rows.first().map(|r| r.design.len()).unwrap_or(0);
        let mut header = vec!["run_id".to_string(), "order".to_string(), "probe".to_string()];
        header.extend((0..p).map(|i| format!("xi_{i}")));
        header.push("observation".to_string());

        let mut out = header.join(",");
        out.push('\n');
        for row in &self.rows {
            let mut fields = vec![row.run_id.to_string(), row.order.to_string(), row.probe.to_string()];
            fields.extend(row.design.iter().map(|x| x.to_string()));
            fields.push(row.observation.to_string());
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }

    /// Write [`Evaluation::to_csv`] to `path`.
    pub fn write_csv(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        std::fs::write(path, self.to_csv())?;
        Ok(())
    }
}
