//! Gaussian prior over source locations.
//!
//! θ consists of K independent p-variate Gaussians:
//!
//! θₖ ~ N(μₖ, Σ),  k = 1..K
//!
//! Draws use the Cholesky factor Σ = L Lᵀ: θₖ = μₖ + L z, z ~ N(0, I).

use candle_core::{Device, Tensor};
use nalgebra::Cholesky;

use crate::error::{ConfigError, Error, Result};
use crate::rollout::Sampler;
use crate::types::{Matrix, Vector};
use crate::Config;

/// Prior over `K` sources in `p` dimensions.
#[derive(Debug, Clone)]
pub struct SourcePrior {
    mean: Matrix,
    covariance: Matrix,
    chol_l: Matrix,
}

impl SourcePrior {
    /// Create a prior from a `K x p` mean and a `p x p` covariance.
    pub fn new(mean: Matrix, covariance: Matrix) -> std::result::Result<Self, ConfigError> {
        let p = mean.ncols();
        if covariance.nrows() != p || covariance.ncols() != p {
            return Err(ConfigError::PriorShape {
                which: "theta_covmat",
                expected: p * p,
                actual: covariance.len(),
            });
        }
        let chol = Cholesky::new(covariance.clone()).ok_or(ConfigError::PriorNotPositiveDefinite)?;
        Ok(Self {
            mean,
            covariance,
            chol_l: chol.l(),
        })
    }

    /// Build from a configuration.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        Self::new(config.prior_mean()?, config.prior_covariance()?)
    }

    /// Number of sources `K`.
    pub fn num_sources(&self) -> usize {
        self.mean.nrows()
    }

    /// Physical dimension `p`.
    pub fn physical_dim(&self) -> usize {
        self.mean.ncols()
    }

    /// Prior mean, `K x p`.
    pub fn mean(&self) -> &Matrix {
        &self.mean
    }

    /// Per-source covariance, `p x p`.
    pub fn covariance(&self) -> &Matrix {
        &self.covariance
    }

    /// Draw sources with shape `[batch..., K, p]`.
    pub fn sample(&self, sampler: &mut Sampler, batch: &[usize]) -> Result<Tensor> {
        let (k, p) = (self.num_sources(), self.physical_dim());
        let draws: usize = batch.iter().product();

        let mut data = Vec::with_capacity(draws * k * p);
        for _ in 0..draws {
            for row in 0..k {
                let z = Vector::from_vec(sampler.normal_vec(p));
                let theta = self.mean.row(row).transpose() + &self.chol_l * z;
                data.extend(theta.iter().map(|&x| x as f32));
            }
        }

        let mut dims = batch.to_vec();
        dims.extend([k, p]);
        Ok(Tensor::from_vec(data, dims, sampler.device())?)
    }

    /// Fixed sources from `K * p` row-major values, broadcast to `[batch, K, p]`.
    pub fn condition(&self, values: &[f64], batch: usize, device: &Device) -> Result<Tensor> {
        let (k, p) = (self.num_sources(), self.physical_dim());
        if values.len() != k * p {
            return Err(Error::shape("conditioned theta", format!("{} values", k * p), &[values.len()]));
        }
        let data: Vec<f32> = values.iter().map(|&x| x as f32).collect();
        let theta = Tensor::from_vec(data, (1, k, p), device)?;
        Ok(theta.broadcast_as((batch, k, p))?.contiguous()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_shape_and_moments() {
        let mean = Matrix::from_row_slice(2, 2, &[1.0, -1.0, 3.0, 0.5]);
        let cov = Matrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 2.0]);
        let prior = SourcePrior::new(mean, cov).unwrap();
        let mut sampler = Sampler::new(11, &Device::Cpu);

        let theta = prior.sample(&mut sampler, &[20_000]).unwrap();
        assert_eq!(theta.dims(), &[20_000, 2, 2]);

        let values = theta.to_vec3::<f32>().unwrap();
        let n = values.len() as f64;
        let mean_x0: f64 = values.iter().map(|t| t[0][0] as f64).sum::<f64>() / n;
        let mean_y1: f64 = values.iter().map(|t| t[1][1] as f64).sum::<f64>() / n;
        let var_x0: f64 = values.iter().map(|t| (t[0][0] as f64 - mean_x0).powi(2)).sum::<f64>() / n;
        let cov_01: f64 = values
            .iter()
            .map(|t| (t[0][0] as f64 - mean_x0) * (t[0][1] as f64 + 1.0))
            .sum::<f64>()
            / n;

        assert!((mean_x0 - 1.0).abs() < 0.05, "mean_x0={mean_x0}");
        assert!((mean_y1 - 0.5).abs() < 0.05, "mean_y1={mean_y1}");
        assert!((var_x0 - 4.0).abs() < 0.2, "var_x0={var_x0}");
        assert!((cov_01 - 1.0).abs() < 0.1, "cov_01={cov_01}");
    }

    #[test]
    fn rejects_indefinite_covariance() {
        let mean = Matrix::zeros(1, 2);
        let cov = Matrix::from_row_slice(2, 2, &[1.0, 3.0, 3.0, 1.0]);
        assert_eq!(SourcePrior::new(mean, cov).unwrap_err(), ConfigError::PriorNotPositiveDefinite);
    }

    #[test]
    fn condition_broadcasts_fixed_sources() {
        let prior = SourcePrior::new(Matrix::zeros(1, 2), Matrix::identity(2, 2)).unwrap();
        let theta = prior.condition(&[0.3, 0.7], 4, &Device::Cpu).unwrap();
        assert_eq!(theta.dims(), &[4, 1, 2]);
        for row in theta.to_vec3::<f32>().unwrap() {
            assert_eq!(row, vec![vec![0.3f32, 0.7]]);
        }
        assert!(prior.condition(&[0.3], 4, &Device::Cpu).is_err());
    }
}
