//! Type aliases and common types.

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Dense matrix used for prior covariances.
pub type Matrix = DMatrix<f64>;

/// Dense vector used for prior means.
pub type Vector = DVector<f64>;

/// Shape of a single design: `n` probes in `p` physical dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesignShape {
    /// Probes measured per round.
    pub n: usize,
    /// Physical dimension of each probe.
    pub p: usize,
}

impl DesignShape {
    /// Create a design shape.
    pub fn new(n: usize, p: usize) -> Self {
        Self { n, p }
    }

    /// Number of scalars in one flattened design.
    pub fn flat_len(&self) -> usize {
        self.n * self.p
    }
}

/// Which design policy a run trains and evaluates.
///
/// Selected once at configuration time; never re-dispatched per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DesignNetworkType {
    /// History-dependent policy: encoder, sum pooling, emitter.
    #[default]
    Adaptive,
    /// A learned per-round table of designs that ignores outcomes.
    Static,
    /// Designs drawn uniformly over the design box; nothing to learn.
    Random,
}

impl DesignNetworkType {
    /// Stable name used in tracking records and manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            DesignNetworkType::Adaptive => "adaptive",
            DesignNetworkType::Static => "static",
            DesignNetworkType::Random => "random",
        }
    }

    /// Whether the policy carries trainable parameters.
    pub fn is_trainable(&self) -> bool {
        !matches!(self, DesignNetworkType::Random)
    }
}

impl fmt::Display for DesignNetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DesignNetworkType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adaptive" | "dad" => Ok(DesignNetworkType::Adaptive),
            "static" => Ok(DesignNetworkType::Static),
            "random" => Ok(DesignNetworkType::Random),
            _ => Err(ConfigError::UnknownDesignNetwork(s.to_string())),
        }
    }
}
