//! Seeded parameter registration.
//!
//! candle's built-in initialisers draw from an RNG the run cannot seed, so
//! parameters are drawn from the run's [`Sampler`] and inserted into the
//! [`VarMap`] directly.

use candle_core::{Tensor, Var};
use candle_nn::{Linear, VarMap};

use crate::error::Result;
use crate::rollout::Sampler;

/// Insert `value` as a trainable variable named `name`; returns the tracked tensor.
pub(crate) fn register(params: &VarMap, name: &str, value: Tensor) -> Result<Tensor> {
    let var = Var::from_tensor(&value)?;
    let tensor = var.as_tensor().clone();
    let mut data = params
        .data()
        .lock()
        .map_err(|_| candle_core::Error::Msg("parameter store lock poisoned".to_string()))?;
    data.insert(name.to_string(), var);
    Ok(tensor)
}

/// Dense layer with `U(-1/sqrt(fan_in), 1/sqrt(fan_in))` weights and bias.
pub(crate) fn linear(
    params: &VarMap,
    name: &str,
    in_dim: usize,
    out_dim: usize,
    sampler: &mut Sampler,
) -> Result<Linear> {
    let bound = 1.0 / (in_dim as f64).sqrt();
    let weight = uniform(sampler, &[out_dim, in_dim], bound)?;
    let bias = uniform(sampler, &[out_dim], bound)?;
    let weight = register(params, &format!("{name}.weight"), weight)?;
    let bias = register(params, &format!("{name}.bias"), bias)?;
    Ok(Linear::new(weight, Some(bias)))
}

fn uniform(sampler: &mut Sampler, dims: &[usize], bound: f64) -> Result<Tensor> {
    let len = dims.iter().product();
    let data: Vec<f32> = sampler
        .uniform_range_vec(len, -bound, bound)
        .into_iter()
        .map(|x| x as f32)
        .collect();
    Ok(Tensor::from_vec(data, dims, sampler.device())?)
}
