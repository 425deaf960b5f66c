//! History-dependent design network.
//!
//! ## Model
//!
//! For a history H_t = ((ξ₁, y₁), …, (ξ_{t−1}, y_{t−1})):
//!
//! eᵢ = enc(ξᵢ, yᵢ)
//!
//! s = Σᵢ eᵢ          (s = 0 when H_t is empty)
//!
//! ξ_t = emit(s)
//!
//! Summing is what makes the output invariant to the order of past rounds
//! and lets one architecture serve every round.

use candle_core::{DType, Tensor};
use candle_nn::VarMap;

use crate::error::{Error, Result};
use crate::policy::emitter::DesignEmitter;
use crate::policy::encoder::HistoryEncoder;
use crate::policy::DesignStrategy;
use crate::rollout::{History, Sampler};
use crate::types::DesignShape;

/// Encoder, sum pooling and emitter composed into one policy.
pub struct SetEquivariantNetwork {
    encoder: HistoryEncoder,
    emitter: DesignEmitter,
    params: VarMap,
}

impl SetEquivariantNetwork {
    /// Build a freshly initialised network.
    pub fn new(shape: DesignShape, hidden_dim: usize, encoding_dim: usize, sampler: &mut Sampler) -> Result<Self> {
        let params = VarMap::new();
        let encoder = HistoryEncoder::new(&params, "encoder", shape, hidden_dim, encoding_dim, sampler)?;
        let emitter = DesignEmitter::new(&params, "emitter", encoding_dim, shape, sampler)?;
        Ok(Self {
            encoder,
            emitter,
            params,
        })
    }

    /// Trainable parameters.
    pub fn params(&self) -> &VarMap {
        &self.params
    }

    /// Mutable access, used when restoring saved weights.
    pub fn params_mut(&mut self) -> &mut VarMap {
        &mut self.params
    }

    /// Pooled summary `[B, E]` of `history`.
    pub fn pool(&self, history: &History) -> Result<Tensor> {
        let batch = history.batch_size();
        if history.is_empty() {
            let zeros = Tensor::zeros((batch, self.encoder.encoding_dim()), DType::F32, self.emitter.device())?;
            return Ok(zeros);
        }
        let embeddings = history
            .iter()
            .map(|entry| self.encoder.encode(&entry.design, &entry.observation))
            .collect::<Result<Vec<_>>>()?;
        Ok(Tensor::stack(&embeddings, 0)?.sum(0)?)
    }
}

impl DesignStrategy for SetEquivariantNetwork {
    fn next_design(&self, history: &History, _sampler: &mut Sampler) -> Result<Tensor> {
        let pooled = self.pool(history)?;
        let design = self.emitter.emit(&pooled)?;
        let expected = [history.batch_size(), history.shape().n, history.shape().p];
        if design.dims() != expected {
            return Err(Error::shape("adaptive design", format!("{:?}", expected), design.dims()));
        }
        Ok(design)
    }
}

impl std::fmt::Debug for SetEquivariantNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetEquivariantNetwork")
            .field("encoder", &self.encoder)
            .field("emitter", &self.emitter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn history_of(len: usize, sampler: &mut Sampler) -> History {
        let shape = DesignShape::new(1, 2);
        let mut h = History::new(shape, 3);
        for _ in 0..len {
            h.push(sampler.standard_normal(&[3, 1, 2]).unwrap(), sampler.standard_normal(&[3, 1]).unwrap())
                .unwrap();
        }
        h
    }

    #[test]
    fn empty_history_is_deterministic() {
        let mut sampler = Sampler::new(1, &Device::Cpu);
        let net = SetEquivariantNetwork::new(DesignShape::new(1, 2), 8, 4, &mut sampler).unwrap();
        let h = History::new(DesignShape::new(1, 2), 3);

        let a = net.next_design(&h, &mut sampler).unwrap();
        let b = net.next_design(&h, &mut sampler).unwrap();
        assert_eq!(a.dims(), &[3, 1, 2]);
        assert_eq!(a.to_vec3::<f32>().unwrap(), b.to_vec3::<f32>().unwrap());
    }

    #[test]
    fn reversed_history_gives_same_design() {
        let mut sampler = Sampler::new(2, &Device::Cpu);
        let net = SetEquivariantNetwork::new(DesignShape::new(1, 2), 8, 4, &mut sampler).unwrap();
        let h = history_of(4, &mut sampler);
        let r = h.permuted(&[3, 2, 1, 0]).unwrap();

        let a = net.next_design(&h, &mut sampler).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let b = net.next_design(&r, &mut sampler).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5, "{x} vs {y}");
        }
    }

    #[test]
    fn history_changes_design() {
        let mut sampler = Sampler::new(3, &Device::Cpu);
        let net = SetEquivariantNetwork::new(DesignShape::new(1, 2), 8, 4, &mut sampler).unwrap();
        let empty = History::new(DesignShape::new(1, 2), 3);
        let h = history_of(1, &mut sampler);
        let a = net.next_design(&empty, &mut sampler).unwrap().to_vec3::<f32>().unwrap();
        let b = net.next_design(&h, &mut sampler).unwrap().to_vec3::<f32>().unwrap();
        assert_ne!(a, b);
    }
}
