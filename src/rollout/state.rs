//! Round-by-round simulation of one batch of experiments.
//!
//! A [`Rollout`] owns the sources it was created with and the history it
//! accumulates. Each [`Rollout::step`] runs exactly one round:
//!
//! 1. ask the policy for a raw design given the history
//! 2. squash it into the design box
//! 3. draw an observation from the forward model, recording its log-density
//! 4. append (raw design, observation) to the history
//!
//! Rounds cannot be skipped. Once all rounds ran the rollout is complete and
//! [`Rollout::finish`] consumes it into a [`Trace`].

use candle_core::Tensor;

use crate::error::{ConfigError, Error, Result, RolloutError};
use crate::model::{BoundedTransform, LocationForwardModel};
use crate::policy::DesignStrategy;
use crate::rollout::{History, Sampler};
use crate::types::DesignShape;

/// Whether gradients flow through the rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutMode {
    /// Designs and observations stay attached to the policy's parameters.
    Differentiable,
    /// Every round is detached; used for evaluation and logging.
    Detached,
}

/// Position in the round sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No round has run.
    Unstarted,
    /// Round `t` (1-based) has run and more remain.
    Round(usize),
    /// Every round has run.
    Complete,
}

/// Full record of one batch of simulated experiments.
#[derive(Debug, Clone)]
pub struct Trace {
    /// Raw policy outputs, `[B, T, n, p]`.
    pub raw_designs: Tensor,
    /// Designs inside the box, `[B, T, n, p]`.
    pub designs: Tensor,
    /// Observations, `[B, T, n]`.
    pub observations: Tensor,
    /// Sources the observations were generated from, `[B, K, p]`.
    pub theta: Tensor,
    /// Joint log-density of the observations under `theta`, `[B]`.
    pub log_likelihood: Tensor,
}

impl Trace {
    /// Batch size.
    pub fn batch_size(&self) -> usize {
        self.designs.dims()[0]
    }

    /// Number of rounds.
    pub fn num_rounds(&self) -> usize {
        self.designs.dims()[1]
    }
}

/// One in-flight batch of experiments.
pub struct Rollout<'a> {
    policy: &'a dyn DesignStrategy,
    forward: &'a LocationForwardModel,
    transform: &'a BoundedTransform,
    theta: Tensor,
    rounds: usize,
    mode: RolloutMode,
    history: History,
    designs: Vec<Tensor>,
    log_likelihood: Option<Tensor>,
    phase: Phase,
}

impl<'a> Rollout<'a> {
    /// Start a rollout for sources `theta` of shape `[B, K, p]`.
    pub fn new(
        policy: &'a dyn DesignStrategy,
        forward: &'a LocationForwardModel,
        transform: &'a BoundedTransform,
        theta: Tensor,
        rounds: usize,
        shape: DesignShape,
        mode: RolloutMode,
    ) -> Result<Self> {
        if rounds == 0 {
            return Err(ConfigError::NoRounds.into());
        }
        let dims = theta.dims();
        if dims.len() != 3 || dims[2] != shape.p {
            return Err(Error::shape("rollout theta", format!("[B, K, {}]", shape.p), dims));
        }
        let batch = dims[0];
        Ok(Self {
            policy,
            forward,
            transform,
            theta,
            rounds,
            mode,
            history: History::new(shape, batch),
            designs: Vec::with_capacity(rounds),
            log_likelihood: None,
            phase: Phase::Unstarted,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// History accumulated so far.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run one round.
    pub fn step(&mut self, sampler: &mut Sampler) -> Result<()> {
        if self.phase == Phase::Complete {
            return Err(RolloutError::AlreadyComplete { rounds: self.rounds }.into());
        }

        let mut raw = self.policy.next_design(&self.history, sampler)?;
        if self.mode == RolloutMode::Detached {
            raw = raw.detach();
        }
        let design = self.transform.apply(&raw)?;
        let dist = self.forward.observe(&design, &self.theta)?;
        let draw = sampler.draw(&dist)?;

        let (observation, log_density) = match self.mode {
            RolloutMode::Differentiable => (draw.value, draw.log_density),
            RolloutMode::Detached => (draw.value.detach(), draw.log_density.detach()),
        };

        self.log_likelihood = Some(match self.log_likelihood.take() {
            Some(acc) => (acc + log_density)?,
            None => log_density,
        });
        self.history.push(raw, observation)?;
        self.designs.push(design);

        let done = self.history.len();
        self.phase = if done >= self.rounds { Phase::Complete } else { Phase::Round(done) };
        Ok(())
    }

    /// Run every remaining round.
    pub fn run(&mut self, sampler: &mut Sampler) -> Result<()> {
        while self.phase != Phase::Complete {
            self.step(sampler)?;
        }
        Ok(())
    }

    /// Consume a complete rollout into its trace.
    pub fn finish(self) -> Result<Trace> {
        let completed = self.history.len();
        if self.phase != Phase::Complete {
            return Err(RolloutError::Incomplete {
                completed,
                rounds: self.rounds,
            }
            .into());
        }
        let log_likelihood = match self.log_likelihood {
            Some(ll) => ll,
            None => {
                return Err(RolloutError::Incomplete {
                    completed,
                    rounds: self.rounds,
                }
                .into())
            }
        };

        let raw: Vec<Tensor> = self.history.iter().map(|e| e.design.clone()).collect();
        let observations: Vec<Tensor> = self.history.iter().map(|e| e.observation.clone()).collect();
        Ok(Trace {
            raw_designs: Tensor::stack(&raw, 1)?,
            designs: Tensor::stack(&self.designs, 1)?,
            observations: Tensor::stack(&observations, 1)?,
            theta: self.theta,
            log_likelihood,
        })
    }
}

impl std::fmt::Debug for Rollout<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rollout")
            .field("rounds", &self.rounds)
            .field("mode", &self.mode)
            .field("phase", &self.phase)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RandomDesigns;
    use candle_core::Device;

    fn parts() -> (LocationForwardModel, BoundedTransform) {
        (
            LocationForwardModel::new(0.1, 1e-4, 0.5).unwrap(),
            BoundedTransform::new(&[0.0, 0.0], &[1.0, 1.0], &Device::Cpu).unwrap(),
        )
    }

    #[test]
    fn phases_advance_one_round_at_a_time() {
        let (forward, transform) = parts();
        let mut sampler = Sampler::new(8, &Device::Cpu);
        let theta = sampler.standard_normal(&[4, 2, 2]).unwrap();
        let shape = DesignShape::new(1, 2);
        let mut rollout =
            Rollout::new(&RandomDesigns, &forward, &transform, theta, 3, shape, RolloutMode::Detached).unwrap();

        assert_eq!(rollout.phase(), Phase::Unstarted);
        rollout.step(&mut sampler).unwrap();
        assert_eq!(rollout.phase(), Phase::Round(1));
        rollout.step(&mut sampler).unwrap();
        assert_eq!(rollout.phase(), Phase::Round(2));
        rollout.step(&mut sampler).unwrap();
        assert_eq!(rollout.phase(), Phase::Complete);

        let err = rollout.step(&mut sampler).unwrap_err();
        assert!(matches!(err, Error::Rollout(RolloutError::AlreadyComplete { rounds: 3 })));
    }

    #[test]
    fn finish_requires_every_round() {
        let (forward, transform) = parts();
        let mut sampler = Sampler::new(8, &Device::Cpu);
        let theta = sampler.standard_normal(&[4, 1, 2]).unwrap();
        let shape = DesignShape::new(1, 2);
        let mut rollout =
            Rollout::new(&RandomDesigns, &forward, &transform, theta, 2, shape, RolloutMode::Detached).unwrap();
        rollout.step(&mut sampler).unwrap();
        let err = rollout.finish().unwrap_err();
        assert!(matches!(
            err,
            Error::Rollout(RolloutError::Incomplete { completed: 1, rounds: 2 })
        ));
    }

    #[test]
    fn trace_shapes() {
        let (forward, transform) = parts();
        let mut sampler = Sampler::new(8, &Device::Cpu);
        let theta = sampler.standard_normal(&[5, 3, 2]).unwrap();
        let shape = DesignShape::new(2, 2);
        let mut rollout =
            Rollout::new(&RandomDesigns, &forward, &transform, theta, 4, shape, RolloutMode::Detached).unwrap();
        rollout.run(&mut sampler).unwrap();
        let trace = rollout.finish().unwrap();

        assert_eq!(trace.raw_designs.dims(), &[5, 4, 2, 2]);
        assert_eq!(trace.designs.dims(), &[5, 4, 2, 2]);
        assert_eq!(trace.observations.dims(), &[5, 4, 2]);
        assert_eq!(trace.log_likelihood.dims(), &[5]);
    }

    #[test]
    fn rejects_theta_with_wrong_dimension() {
        let (forward, transform) = parts();
        let mut sampler = Sampler::new(8, &Device::Cpu);
        let theta = sampler.standard_normal(&[5, 3, 3]).unwrap();
        let shape = DesignShape::new(1, 2);
        let result = Rollout::new(&RandomDesigns, &forward, &transform, theta, 1, shape, RolloutMode::Detached);
        assert!(matches!(result, Err(Error::Shape { .. })));
    }

    #[test]
    fn rejects_zero_rounds() {
        let (forward, transform) = parts();
        let mut sampler = Sampler::new(8, &Device::Cpu);
        let theta = sampler.standard_normal(&[2, 1, 2]).unwrap();
        let shape = DesignShape::new(1, 2);
        let result = Rollout::new(&RandomDesigns, &forward, &transform, theta, 0, shape, RolloutMode::Detached);
        assert!(matches!(result, Err(Error::Config(ConfigError::NoRounds))));
    }
}
