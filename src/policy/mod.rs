//! Design policies.
//!
//! Every variant answers one question: given the history so far, what is the
//! next raw design? The variant is chosen once from the configuration and
//! never re-dispatched per round.

mod baseline;
mod emitter;
mod encoder;
pub(crate) mod init;
mod network;

use std::path::Path;

use candle_core::{Tensor, Var};
use candle_nn::VarMap;

pub use baseline::{RandomDesigns, StaticDesigns};
pub use emitter::DesignEmitter;
pub use encoder::HistoryEncoder;
pub use network::SetEquivariantNetwork;

use crate::error::Result;
use crate::rollout::{History, Sampler};
use crate::types::DesignNetworkType;
use crate::Config;

/// Produces the next raw design `[B, n, p]` from a history.
pub trait DesignStrategy {
    /// Next raw design for every experiment in the batch.
    ///
    /// Must return a well-defined design for an empty history.
    fn next_design(&self, history: &History, sampler: &mut Sampler) -> Result<Tensor>;
}

/// The policy a run trains and evaluates.
#[derive(Debug)]
pub enum DesignPolicy {
    /// Encoder, sum pooling, emitter.
    Adaptive(SetEquivariantNetwork),
    /// Learned per-round table.
    Static(StaticDesigns),
    /// Fresh random designs every round.
    Random(RandomDesigns),
}

impl DesignPolicy {
    /// Build the policy named by `config`, drawing initial weights from `sampler`.
    pub fn from_config(config: &Config, sampler: &mut Sampler) -> Result<Self> {
        let shape = config.design_shape();
        Ok(match config.design_network_kind()? {
            DesignNetworkType::Adaptive => DesignPolicy::Adaptive(SetEquivariantNetwork::new(
                shape,
                config.hidden_dim,
                config.encoding_dim,
                sampler,
            )?),
            DesignNetworkType::Static => {
                DesignPolicy::Static(StaticDesigns::new(config.num_rounds, shape, sampler)?)
            }
            DesignNetworkType::Random => DesignPolicy::Random(RandomDesigns),
        })
    }

    /// Which variant this is.
    pub fn kind(&self) -> DesignNetworkType {
        match self {
            DesignPolicy::Adaptive(_) => DesignNetworkType::Adaptive,
            DesignPolicy::Static(_) => DesignNetworkType::Static,
            DesignPolicy::Random(_) => DesignNetworkType::Random,
        }
    }

    /// Whether designs depend on fresh randomness rather than only on weights
    /// and history.
    pub fn is_stochastic(&self) -> bool {
        matches!(self, DesignPolicy::Random(_))
    }

    fn params(&self) -> Option<&VarMap> {
        match self {
            DesignPolicy::Adaptive(net) => Some(net.params()),
            DesignPolicy::Static(table) => Some(table.params()),
            DesignPolicy::Random(_) => None,
        }
    }

    /// Trainable variables; empty for the random baseline.
    pub fn parameters(&self) -> Vec<Var> {
        self.params().map(VarMap::all_vars).unwrap_or_default()
    }

    /// Total number of trainable scalars.
    pub fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|v| v.elem_count()).sum()
    }

    /// Write weights as safetensors. Returns `false` when there is nothing to save.
    pub fn save_weights(&self, path: &Path) -> Result<bool> {
        match self.params() {
            Some(params) => {
                params.save(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Overwrite weights with those stored at `path`.
    pub fn load_weights(&mut self, path: &Path) -> Result<()> {
        match self {
            DesignPolicy::Adaptive(net) => net.params_mut().load(path)?,
            DesignPolicy::Static(table) => table.params_mut().load(path)?,
            DesignPolicy::Random(_) => {}
        }
        Ok(())
    }
}

impl DesignStrategy for DesignPolicy {
    fn next_design(&self, history: &History, sampler: &mut Sampler) -> Result<Tensor> {
        match self {
            DesignPolicy::Adaptive(net) => net.next_design(history, sampler),
            DesignPolicy::Static(table) => table.next_design(history, sampler),
            DesignPolicy::Random(random) => random.next_design(history, sampler),
        }
    }
}
