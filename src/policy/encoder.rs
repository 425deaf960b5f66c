//! Per-round history encoder.

use candle_core::{Tensor, D};
use candle_nn::{Linear, Module, VarMap};

use crate::error::{Error, Result};
use crate::policy::init;
use crate::rollout::Sampler;
use crate::types::DesignShape;

/// Two-layer map from one (design, observation) pair to an embedding.
///
/// Input is `concat(flatten(design), observation)` of width `n * p + n`;
/// output has width `encoding_dim`. Stateless across calls.
#[derive(Debug, Clone)]
pub struct HistoryEncoder {
    shape: DesignShape,
    linear1: Linear,
    output: Linear,
    encoding_dim: usize,
}

impl HistoryEncoder {
    /// Register encoder parameters under `name` in `params`.
    pub fn new(
        params: &VarMap,
        name: &str,
        shape: DesignShape,
        hidden_dim: usize,
        encoding_dim: usize,
        sampler: &mut Sampler,
    ) -> Result<Self> {
        let input_dim = shape.flat_len() + shape.n;
        let linear1 = init::linear(params, &format!("{name}.linear1"), input_dim, hidden_dim, sampler)?;
        let output = init::linear(params, &format!("{name}.output"), hidden_dim, encoding_dim, sampler)?;
        Ok(Self {
            shape,
            linear1,
            output,
            encoding_dim,
        })
    }

    /// Embedding width.
    pub fn encoding_dim(&self) -> usize {
        self.encoding_dim
    }

    /// Embed designs `[B, n, p]` with observations `[B, n]` into `[B, E]`.
    pub fn encode(&self, design: &Tensor, observation: &Tensor) -> Result<Tensor> {
        let DesignShape { n, p } = self.shape;
        let d = design.dims();
        if d.len() != 3 || d[1] != n || d[2] != p {
            return Err(Error::shape("encoder design", format!("[B, {n}, {p}]"), d));
        }
        if observation.dims() != [d[0], n] {
            return Err(Error::shape("encoder observation", format!("[{}, {n}]", d[0]), observation.dims()));
        }

        let x = Tensor::cat(&[design.flatten_from(1)?, observation.clone()], D::Minus1)?;
        let hidden = self.linear1.forward(&x)?.relu()?;
        Ok(self.output.forward(&hidden)?)
    }
}
