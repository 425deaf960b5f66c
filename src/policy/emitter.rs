//! Map from a pooled history summary to the next raw design.

use candle_core::Tensor;
use candle_nn::{Linear, Module, VarMap};

use crate::error::{Error, Result};
use crate::policy::init;
use crate::rollout::Sampler;
use crate::types::DesignShape;

/// Single linear layer from `encoding_dim` to `n * p`, reshaped to `[B, n, p]`.
#[derive(Debug, Clone)]
pub struct DesignEmitter {
    shape: DesignShape,
    linear: Linear,
    encoding_dim: usize,
}

impl DesignEmitter {
    /// Register emitter parameters under `name` in `params`.
    pub fn new(
        params: &VarMap,
        name: &str,
        encoding_dim: usize,
        shape: DesignShape,
        sampler: &mut Sampler,
    ) -> Result<Self> {
        let linear = init::linear(params, &format!("{name}.linear"), encoding_dim, shape.flat_len(), sampler)?;
        Ok(Self {
            shape,
            linear,
            encoding_dim,
        })
    }

    /// Device the emitter's weights live on.
    pub fn device(&self) -> &candle_core::Device {
        self.linear.weight().device()
    }

    /// Emit raw designs `[B, n, p]` from pooled summaries `[B, E]`.
    pub fn emit(&self, pooled: &Tensor) -> Result<Tensor> {
        let d = pooled.dims();
        if d.len() != 2 || d[1] != self.encoding_dim {
            return Err(Error::shape("emitter input", format!("[B, {}]", self.encoding_dim), d));
        }
        let flat = self.linear.forward(pooled)?;
        Ok(flat.reshape((d[0], self.shape.n, self.shape.p))?)
    }
}
