//! Forward model for location finding.
//!
//! ## Model
//!
//! For a probe ξᵢ and sources θ₁..θ_K:
//!
//! μᵢ = log(b + Σₖ 1 / (m + ‖ξᵢ − θₖ‖²))
//!
//! yᵢ ~ N(μᵢ, σ²), independent across probes.
//!
//! where b is the base signal, m the saturation constant and σ the noise
//! scale. The probe axis is the event dimension: log-densities are summed
//! over it.

use candle_core::{Tensor, D};

use crate::constants::LOG_2PI;
use crate::error::{ConfigError, Error, Result};
use crate::rollout::{Density, Sampler};
use crate::Config;

/// Stateless map from (design, sources) to an observation distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationForwardModel {
    base_signal: f64,
    max_signal: f64,
    noise_scale: f64,
}

impl LocationForwardModel {
    /// Create a forward model.
    ///
    /// Rejects `max_signal <= 0` (the map is undefined when a probe sits on a
    /// source) and `noise_scale <= 0`.
    pub fn new(base_signal: f64, max_signal: f64, noise_scale: f64) -> std::result::Result<Self, ConfigError> {
        if !(max_signal > 0.0) {
            return Err(ConfigError::NonPositiveMaxSignal(max_signal));
        }
        if !(noise_scale > 0.0) {
            return Err(ConfigError::NonPositiveNoiseScale(noise_scale));
        }
        Ok(Self {
            base_signal,
            max_signal,
            noise_scale,
        })
    }

    /// Build from a configuration.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        Self::new(config.base_signal, config.max_signal, config.noise_scale)
    }

    /// Background signal.
    pub fn base_signal(&self) -> f64 {
        self.base_signal
    }

    /// Attenuation saturation constant.
    pub fn max_signal(&self) -> f64 {
        self.max_signal
    }

    /// Observation noise standard deviation.
    pub fn noise_scale(&self) -> f64 {
        self.noise_scale
    }

    /// Mean signal for designs `[..., n, p]` and sources `[..., K, p]`.
    ///
    /// Leading batch dimensions broadcast against each other (right-aligned);
    /// the result has shape `[..., n]`.
    pub fn mean_signal(&self, design: &Tensor, theta: &Tensor) -> Result<Tensor> {
        check_operands(design, theta)?;

        // [..., n, 1, p] - [..., 1, K, p] -> [..., n, K, p]
        let probes = design.unsqueeze(design.rank() - 1)?;
        let sources = theta.unsqueeze(theta.rank() - 2)?;
        let sq_dist = probes.broadcast_sub(&sources)?.sqr()?.sum(D::Minus1)?;

        let attenuation = (sq_dist + self.max_signal)?.recip()?;
        let total = attenuation.sum(D::Minus1)?;
        Ok((total + self.base_signal)?.log()?)
    }

    /// Observation distribution at `design` given sources `theta`.
    pub fn observe(&self, design: &Tensor, theta: &Tensor) -> Result<ObservationDistribution> {
        Ok(ObservationDistribution {
            mean: self.mean_signal(design, theta)?,
            scale: self.noise_scale,
        })
    }
}

/// Gaussian over the probe axis with a shared scale.
#[derive(Debug, Clone)]
pub struct ObservationDistribution {
    mean: Tensor,
    scale: f64,
}

impl ObservationDistribution {
    /// Mean signal, shape `[..., n]`.
    pub fn mean(&self) -> &Tensor {
        &self.mean
    }

    /// Noise standard deviation.
    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl Density for ObservationDistribution {
    fn rsample(&self, sampler: &mut Sampler) -> Result<Tensor> {
        let noise = sampler.standard_normal(self.mean.dims())?;
        Ok((&self.mean + (noise * self.scale)?)?)
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        let mean_dims = self.mean.dims();
        let value_dims = value.dims();
        if mean_dims.last() != value_dims.last() {
            return Err(Error::shape(
                "observation log-density",
                format!("[..., {}]", mean_dims.last().copied().unwrap_or(0)),
                value_dims,
            ));
        }
        let z = (value.broadcast_sub(&self.mean)? / self.scale)?;
        let norm = self.scale.ln() + 0.5 * LOG_2PI;
        let per_probe = ((z.sqr()? * -0.5)? - norm)?;
        Ok(per_probe.sum(D::Minus1)?)
    }
}

fn check_operands(design: &Tensor, theta: &Tensor) -> Result<()> {
    let (d, t) = (design.dims(), theta.dims());
    if d.len() < 2 {
        return Err(Error::shape("forward model design", "[..., n, p]", d));
    }
    if t.len() < 2 {
        return Err(Error::shape("forward model theta", "[..., K, p]", t));
    }
    let p = d[d.len() - 1];
    if t[t.len() - 1] != p {
        return Err(Error::shape("forward model theta", format!("[..., K, {}]", p), t));
    }

    // Leading dims must broadcast without reshaping: equal, or one of them 1.
    let (bd, bt) = (&d[..d.len() - 2], &t[..t.len() - 2]);
    for (a, b) in bd.iter().rev().zip(bt.iter().rev()) {
        if a != b && *a != 1 && *b != 1 {
            return Err(Error::shape(
                "forward model batch",
                format!("batch dims broadcastable with {:?}", bd),
                t,
            ));
        }
    }
    Ok(())
}
