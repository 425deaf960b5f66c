//! Squashing of unconstrained designs into the design box.

use candle_core::{DType, Device, Tensor};

use crate::error::{ConfigError, Error, Result};
use crate::Config;

/// Elementwise map `lower + sigmoid(raw) * (upper - lower)`.
///
/// The output is clamped to the box so that rounding can never push a
/// saturated coordinate past a bound.
#[derive(Debug, Clone)]
pub struct BoundedTransform {
    lower: Vec<f64>,
    upper: Vec<f64>,
    lower_t: Tensor,
    upper_t: Tensor,
    range_t: Tensor,
}

impl BoundedTransform {
    /// Create a transform for the box `[lower, upper]`.
    pub fn new(lower: &[f64], upper: &[f64], device: &Device) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(ConfigError::BoundsLength {
                which: "upper_bound",
                expected: lower.len(),
                actual: upper.len(),
            }
            .into());
        }
        for (index, (&l, &u)) in lower.iter().zip(upper).enumerate() {
            if !(l < u) {
                return Err(ConfigError::InvertedBounds { index, lower: l, upper: u }.into());
            }
        }
        let to_tensor = |v: &[f64]| {
            let data: Vec<f32> = v.iter().map(|&x| x as f32).collect();
            Tensor::from_vec(data, v.len(), device)
        };
        let lower_t = to_tensor(lower)?;
        let upper_t = to_tensor(upper)?;
        let range_t = (&upper_t - &lower_t)?;
        Ok(Self {
            lower: lower.to_vec(),
            upper: upper.to_vec(),
            lower_t,
            upper_t,
            range_t,
        })
    }

    /// Build from a configuration.
    pub fn from_config(config: &Config, device: &Device) -> Result<Self> {
        Self::new(&config.lower_bound, &config.upper_bound, device)
    }

    /// Lower corner of the box.
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper corner of the box.
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Map raw designs `[..., p]` into the box. Differentiable.
    pub fn apply(&self, raw: &Tensor) -> Result<Tensor> {
        let p = self.lower.len();
        if raw.dims().last() != Some(&p) {
            return Err(Error::shape("design transform", format!("[..., {}]", p), raw.dims()));
        }
        let raw = raw.to_dtype(DType::F32)?;
        let prop = candle_nn::ops::sigmoid(&raw)?;
        let xi = prop.broadcast_mul(&self.range_t)?.broadcast_add(&self.lower_t)?;
        Ok(xi.broadcast_maximum(&self.lower_t)?.broadcast_minimum(&self.upper_t)?)
    }
}

/// Inverse of the logistic sigmoid on the host.
pub fn logit(u: f64) -> f64 {
    (u / (1.0 - u)).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoundedTransform {
        BoundedTransform::new(&[0.0, -2.0], &[1.0, 3.0], &Device::Cpu).unwrap()
    }

    #[test]
    fn zero_maps_to_box_centre() {
        let raw = Tensor::zeros((1, 2), DType::F32, &Device::Cpu).unwrap();
        let xi = unit_box().apply(&raw).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!((xi[0] - 0.5).abs() < 1e-6);
        assert!((xi[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn extreme_inputs_saturate() {
        let raw = Tensor::from_vec(vec![1e6f32, -1e6, -1e30, 1e30], (2, 2), &Device::Cpu).unwrap();
        let xi = unit_box().apply(&raw).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(xi, vec![1.0, -2.0, 0.0, 3.0]);
    }

    #[test]
    fn gradients_stay_finite_far_outside_box() {
        let transform = BoundedTransform::new(&[0.0], &[1.0], &Device::Cpu).unwrap();
        let raw = candle_core::Var::from_vec(vec![-100.0f32, -50.0, 0.0], (3, 1), &Device::Cpu).unwrap();
        let xi = transform.apply(raw.as_tensor()).unwrap();
        let grads = xi.sum_all().unwrap().backward().unwrap();
        let g = grads.get(raw.as_tensor()).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();

        assert!(g.iter().all(|v| v.is_finite()), "{g:?}");
        assert!(g[0].abs() < 1e-6 && g[1].abs() < 1e-6, "{g:?}");
        assert!((g[2] - 0.25).abs() < 1e-6, "{g:?}");
    }

    #[test]
    fn rejects_wrong_trailing_dim() {
        let raw = Tensor::zeros((1, 3), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(unit_box().apply(&raw), Err(Error::Shape { .. })));
    }

    #[test]
    fn rejects_inverted_box() {
        let err = BoundedTransform::new(&[1.0], &[0.0], &Device::Cpu).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvertedBounds { index: 0, .. })));
    }

    #[test]
    fn logit_inverts_sigmoid() {
        for u in [0.1, 0.25, 0.5, 0.9] {
            let x = Tensor::new(&[logit(u) as f32], &Device::Cpu).unwrap();
            let back = candle_nn::ops::sigmoid(&x).unwrap().to_vec1::<f32>().unwrap()[0] as f64;
            assert!((back - u).abs() < 1e-6);
        }
    }
}
