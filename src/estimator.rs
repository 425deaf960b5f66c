//! Prior contrastive estimation of expected information gain.
//!
//! ## Model
//!
//! Draw N outer experiments (θ₀ⁿ, ξⁿ, yⁿ) by running the policy, and for each
//! one L contrastive sources θ₁ⁿ..θ_Lⁿ from the prior. With
//! ℓₗⁿ = log p(yⁿ | ξⁿ, θₗⁿ) summed over probes and rounds:
//!
//! PCE = (1/N) Σₙ [ ℓ₀ⁿ − logsumexp(ℓ₀ⁿ, …, ℓ_Lⁿ) + log(L + 1) ]
//!
//! The contrastive terms reuse the designs the policy chose for the outer
//! experiment; nothing is re-run for them. The bound is biased low, the bias
//! shrinks as L grows and it is capped at log(L + 1). The training loss is
//! `−PCE`.

use candle_core::{Tensor, D};

use crate::error::{ConfigError, Error, Result};
use crate::experiment::LocationFinding;
use crate::rollout::{Density, RolloutMode, Sampler, Trace};

/// Nested Monte Carlo lower bound on expected information gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorContrastiveEstimation {
    num_outer_samples: usize,
    num_inner_samples: usize,
}

impl PriorContrastiveEstimation {
    /// Create an estimator with `N` outer and `L` inner samples.
    ///
    /// `L = 0` is rejected: without contrastive samples the bound is
    /// identically zero and carries no information.
    pub fn new(num_outer_samples: usize, num_inner_samples: usize) -> std::result::Result<Self, ConfigError> {
        if num_outer_samples == 0 {
            return Err(ConfigError::NoOuterSamples);
        }
        if num_inner_samples == 0 {
            return Err(ConfigError::NoInnerSamples);
        }
        Ok(Self {
            num_outer_samples,
            num_inner_samples,
        })
    }

    /// Outer sample count `N`.
    pub fn num_outer_samples(&self) -> usize {
        self.num_outer_samples
    }

    /// Inner sample count `L`.
    pub fn num_inner_samples(&self) -> usize {
        self.num_inner_samples
    }

    /// Largest value the bound can take, `log(L + 1)`.
    pub fn upper_limit(&self) -> f64 {
        ((self.num_inner_samples + 1) as f64).ln()
    }

    /// Loss `−PCE` that still carries gradients to the policy parameters.
    pub fn differentiable_loss(&self, experiment: &LocationFinding, sampler: &mut Sampler) -> Result<Tensor> {
        Ok(self.bound(experiment, sampler, RolloutMode::Differentiable)?.neg()?)
    }

    /// Gradient-free loss `−PCE` as a plain number.
    pub fn evaluate_loss(&self, experiment: &LocationFinding, sampler: &mut Sampler) -> Result<f64> {
        let bound = self.bound(experiment, sampler, RolloutMode::Detached)?.detach();
        Ok(-(bound.to_scalar::<f32>()? as f64))
    }

    /// PCE bound as a scalar tensor.
    pub fn bound(&self, experiment: &LocationFinding, sampler: &mut Sampler, mode: RolloutMode) -> Result<Tensor> {
        let trace = experiment.rollout(self.num_outer_samples, None, mode, sampler)?;
        let inner = experiment
            .prior()
            .sample(sampler, &[self.num_inner_samples, self.num_outer_samples])?;
        let contrastive = contrastive_log_likelihood(experiment, &trace, &inner)?;
        pce_bound(&trace.log_likelihood, &contrastive)
    }
}

/// Log-likelihood of each outer trace's observations under alternative
/// sources, reusing its designs.
///
/// `inner` has shape `[L, N, K, p]`; the result has shape `[L, N]`.
pub fn contrastive_log_likelihood(experiment: &LocationFinding, trace: &Trace, inner: &Tensor) -> Result<Tensor> {
    let (n, d) = (trace.batch_size(), inner.dims());
    if d.len() != 4 || d[1] != n {
        return Err(Error::shape("contrastive sources", format!("[L, {n}, K, p]"), d));
    }
    // [L, N, 1, K, p] broadcasts against designs [N, T, n, p] over rounds.
    let sources = inner.unsqueeze(2)?;
    let dist = experiment.forward().observe(&trace.designs, &sources)?;
    let per_round = dist.log_prob(&trace.observations)?;
    Ok(per_round.sum(D::Minus1)?)
}

/// Combine outer `[N]` and contrastive `[L, N]` log-likelihoods into the bound.
pub fn pce_bound(outer: &Tensor, contrastive: &Tensor) -> Result<Tensor> {
    let (o, c) = (outer.dims(), contrastive.dims());
    if o.len() != 1 || c.len() != 2 || c[1] != o[0] {
        let n = o.first().copied().unwrap_or(0);
        return Err(Error::shape("pce terms", format!("outer [N], contrastive [L, {n}]"), c));
    }
    let num_terms = (c[0] + 1) as f64;

    let all = Tensor::cat(&[outer.unsqueeze(0)?, contrastive.clone()], 0)?;
    let lse = log_sum_exp(&all)?;
    let per_outer = (outer - (lse - num_terms.ln())?)?;
    Ok(per_outer.mean_all()?)
}

/// Stable log-sum-exp over dimension 0.
fn log_sum_exp(x: &Tensor) -> Result<Tensor> {
    let max = x.max_keepdim(0)?.detach();
    let shifted = x.broadcast_sub(&max)?.exp()?.sum_keepdim(0)?.log()?;
    Ok((shifted + max)?.squeeze(0)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn rejects_zero_inner_samples() {
        assert_eq!(PriorContrastiveEstimation::new(10, 0), Err(ConfigError::NoInnerSamples));
        assert_eq!(PriorContrastiveEstimation::new(0, 10), Err(ConfigError::NoOuterSamples));
    }

    #[test]
    fn log_sum_exp_survives_large_magnitudes() {
        let x = Tensor::from_vec(vec![-1000.0f32, 500.0, -1000.0, 500.0], (2, 2), &Device::Cpu).unwrap();
        let lse = log_sum_exp(&x).unwrap().to_vec1::<f32>().unwrap();
        assert!((lse[0] - (-1000.0 + 2f32.ln())).abs() < 1e-3, "{lse:?}");
        assert!((lse[1] - (500.0 + 2f32.ln())).abs() < 1e-3, "{lse:?}");
    }

    #[test]
    fn bound_hits_log_l_plus_one_when_contrast_is_hopeless() {
        // outer far more likely than every contrastive sample
        let outer = Tensor::from_vec(vec![0.0f32, 0.0], 2, &Device::Cpu).unwrap();
        let contrastive = Tensor::full(-1e4f32, (4, 2), &Device::Cpu).unwrap();
        let b = pce_bound(&outer, &contrastive).unwrap().to_scalar::<f32>().unwrap();
        assert!((b as f64 - 5f64.ln()).abs() < 1e-4);
    }

    #[test]
    fn bound_is_zero_when_samples_are_indistinguishable() {
        let outer = Tensor::from_vec(vec![-3.0f32, -7.0], 2, &Device::Cpu).unwrap();
        let contrastive = Tensor::from_vec(vec![-3.0f32, -7.0, -3.0, -7.0], (2, 2), &Device::Cpu).unwrap();
        let b = pce_bound(&outer, &contrastive).unwrap().to_scalar::<f32>().unwrap();
        assert!(b.abs() < 1e-5);
    }
}
