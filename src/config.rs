//! Configuration for training and evaluating a design policy.
//!
//! A [`Config`] covers the physical model (dimensions, signal constants,
//! noise), the prior, the design network, the contrastive estimator's sample
//! counts and the optimizer schedule. It is checked once by
//! [`Config::validate`] before anything is simulated.

use std::fs;
use std::path::Path;

use candle_core::Device;
use nalgebra::Cholesky;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{ConfigError, Result};
use crate::types::{DesignNetworkType, DesignShape, Matrix};

/// Configuration options for a location-finding run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Reproducibility
    // =========================================================================
    /// Seed for every random draw of the run.
    ///
    /// `None` draws a fresh seed from OS entropy; the seed actually used is
    /// logged and stored with the artifact.
    pub seed: Option<u64>,

    // =========================================================================
    // Physical model
    // =========================================================================
    /// Physical dimension `p` of sources and probes.
    pub physical_dim: usize,

    /// Number of hidden sources `K`.
    pub num_sources: usize,

    /// Number of experiment rounds `T`.
    pub num_rounds: usize,

    /// Probes measured per round `n`.
    pub num_probes: usize,

    /// Standard deviation of the Gaussian observation noise. Default: 0.5.
    pub noise_scale: f64,

    /// Background signal added before the log link. Default: 0.1.
    pub base_signal: f64,

    /// Saturation constant of the attenuation term. Default: 1e-4.
    ///
    /// Must be strictly positive: a probe sitting on a source would
    /// otherwise divide by zero.
    pub max_signal: f64,

    /// Lower corner of the design box, one entry per physical dimension.
    pub lower_bound: Vec<f64>,

    /// Upper corner of the design box, one entry per physical dimension.
    pub upper_bound: Vec<f64>,

    // =========================================================================
    // Prior
    // =========================================================================
    /// Prior mean of the sources, `K * p` values in row-major order.
    ///
    /// Default: all zeros.
    pub theta_loc: Option<Vec<f64>>,

    /// Prior covariance of each source, `p * p` values in row-major order.
    ///
    /// Default: identity.
    pub theta_covmat: Option<Vec<f64>>,

    // =========================================================================
    // Design network
    // =========================================================================
    /// `adaptive`, `static` or `random`. Parsed during validation.
    pub design_network_type: String,

    /// Hidden width of the history encoder. Default: 128.
    pub hidden_dim: usize,

    /// Size of the per-round embedding. Default: 8.
    pub encoding_dim: usize,

    // =========================================================================
    // Contrastive estimator
    // =========================================================================
    /// Contrastive latents `L` drawn per outer rollout. Default: 100.
    pub num_inner_samples: usize,

    /// Outer rollouts `N` per loss estimate. Default: 200.
    pub num_outer_samples: usize,

    // =========================================================================
    // Optimizer and schedule
    // =========================================================================
    /// Gradient steps. Forced to 0 for the random baseline. Default: 500.
    pub num_steps: usize,

    /// Initial Adam learning rate. Default: 1e-4.
    pub learning_rate: f64,

    /// Learning-rate multiplier applied every `anneal_interval` steps.
    ///
    /// Set to 1.0 to disable annealing. Default: 0.95.
    pub decay_gamma: f64,

    /// Adam moment coefficients. Default: (0.8, 0.998).
    pub adam_betas: (f64, f64),

    /// Adam weight decay. Default: 0.
    pub weight_decay: f64,

    /// Steps between gradient-free loss evaluations. Default: 50.
    pub eval_interval: usize,

    /// Steps between learning-rate decays. Default: 1000.
    pub anneal_interval: usize,

    /// Losses averaged at each end of the history for the summary. Default: 50.
    pub summary_window: usize,

    /// Compute device: `cpu` or `cuda:<ordinal>`. Default: `cpu`.
    pub device: String,

    // =========================================================================
    // Tracking and reporting
    // =========================================================================
    /// Namespace for tracking records and artifacts. Default: `test`.
    pub experiment_name: String,

    /// Traces printed by the post-training evaluation. Default: 3.
    pub n_trace: usize,

    /// Sources to condition the evaluation on (`K * p` values), if any.
    pub eval_theta: Option<Vec<f64>>,

    /// Print the evaluation report. Default: true.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,

            physical_dim: 2,
            num_sources: 2,
            num_rounds: 5,
            num_probes: 1,
            noise_scale: DEFAULT_NOISE_SCALE,
            base_signal: DEFAULT_BASE_SIGNAL,
            max_signal: DEFAULT_MAX_SIGNAL,
            lower_bound: vec![0.0, 0.0],
            upper_bound: vec![1.0, 1.0],

            theta_loc: None,
            theta_covmat: None,

            design_network_type: DesignNetworkType::Adaptive.to_string(),
            hidden_dim: 128,
            encoding_dim: 8,

            num_inner_samples: DEFAULT_INNER_SAMPLES,
            num_outer_samples: DEFAULT_OUTER_SAMPLES,

            num_steps: 500,
            learning_rate: DEFAULT_LEARNING_RATE,
            decay_gamma: DEFAULT_DECAY_GAMMA,
            adam_betas: DEFAULT_ADAM_BETAS,
            weight_decay: 0.0,
            eval_interval: DEFAULT_EVAL_INTERVAL,
            anneal_interval: DEFAULT_ANNEAL_INTERVAL,
            summary_window: DEFAULT_SUMMARY_WINDOW,
            device: "cpu".to_string(),

            experiment_name: "test".to_string(),
            n_trace: DEFAULT_EVAL_TRACES,
            eval_theta: None,
            verbose: true,
        }
    }
}

impl Config {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a small configuration for smoke runs and tests.
    ///
    /// - 1 source, 2 rounds
    /// - 16 hidden units, 4 encoding dims
    /// - 32 outer / 16 inner samples, 20 steps
    /// - quiet evaluation
    pub fn quick() -> Self {
        Self {
            seed: Some(DEFAULT_SEED),
            num_sources: 1,
            num_rounds: 2,
            hidden_dim: 16,
            encoding_dim: 4,
            num_outer_samples: 32,
            num_inner_samples: 16,
            num_steps: 20,
            learning_rate: 1e-3,
            eval_interval: 5,
            anneal_interval: 10,
            summary_window: 5,
            n_trace: 1,
            verbose: false,
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the physical dimension and reset the design box to `[0, 1]^p`.
    pub fn physical_dim(mut self, p: usize) -> Self {
        assert!(p > 0, "physical_dim must be positive");
        self.physical_dim = p;
        self.lower_bound = vec![0.0; p];
        self.upper_bound = vec![1.0; p];
        self
    }

    /// Set the number of sources.
    pub fn num_sources(mut self, k: usize) -> Self {
        assert!(k > 0, "num_sources must be positive");
        self.num_sources = k;
        self
    }

    /// Set the number of rounds.
    pub fn num_rounds(mut self, t: usize) -> Self {
        assert!(t > 0, "num_rounds must be positive");
        self.num_rounds = t;
        self
    }

    /// Set the number of probes per round.
    pub fn num_probes(mut self, n: usize) -> Self {
        assert!(n > 0, "num_probes must be positive");
        self.num_probes = n;
        self
    }

    /// Set the observation noise scale.
    pub fn noise_scale(mut self, scale: f64) -> Self {
        assert!(scale > 0.0, "noise_scale must be positive");
        self.noise_scale = scale;
        self
    }

    /// Set the base signal.
    pub fn base_signal(mut self, signal: f64) -> Self {
        self.base_signal = signal;
        self
    }

    /// Set the attenuation saturation constant.
    pub fn max_signal(mut self, signal: f64) -> Self {
        assert!(signal > 0.0, "max_signal must be positive");
        self.max_signal = signal;
        self
    }

    /// Set the design box.
    pub fn bounds(mut self, lower: Vec<f64>, upper: Vec<f64>) -> Self {
        self.lower_bound = lower;
        self.upper_bound = upper;
        self
    }

    /// Set the prior mean (`K * p` values, row-major).
    pub fn theta_loc(mut self, loc: Vec<f64>) -> Self {
        self.theta_loc = Some(loc);
        self
    }

    /// Set the prior covariance (`p * p` values, row-major).
    pub fn theta_covmat(mut self, cov: Vec<f64>) -> Self {
        self.theta_covmat = Some(cov);
        self
    }

    /// Select the design network.
    pub fn design_network(mut self, kind: DesignNetworkType) -> Self {
        self.design_network_type = kind.to_string();
        self
    }

    /// Set the encoder hidden width and embedding size.
    pub fn network_dims(mut self, hidden_dim: usize, encoding_dim: usize) -> Self {
        assert!(hidden_dim > 0, "hidden_dim must be positive");
        assert!(encoding_dim > 0, "encoding_dim must be positive");
        self.hidden_dim = hidden_dim;
        self.encoding_dim = encoding_dim;
        self
    }

    /// Set the contrastive sample counts.
    pub fn samples(mut self, outer: usize, inner: usize) -> Self {
        assert!(outer > 0, "num_outer_samples must be positive");
        assert!(inner > 0, "num_inner_samples must be positive");
        self.num_outer_samples = outer;
        self.num_inner_samples = inner;
        self
    }

    /// Set the number of gradient steps.
    pub fn num_steps(mut self, steps: usize) -> Self {
        self.num_steps = steps;
        self
    }

    /// Set the initial learning rate.
    pub fn learning_rate(mut self, lr: f64) -> Self {
        assert!(lr > 0.0, "learning_rate must be positive");
        self.learning_rate = lr;
        self
    }

    /// Set the learning-rate decay factor.
    pub fn decay_gamma(mut self, gamma: f64) -> Self {
        assert!(gamma > 0.0 && gamma <= 1.0, "decay_gamma must be in (0, 1]");
        self.decay_gamma = gamma;
        self
    }

    /// Set the Adam betas and weight decay.
    pub fn adam(mut self, beta1: f64, beta2: f64, weight_decay: f64) -> Self {
        assert!((0.0..1.0).contains(&beta1), "adam beta1 must be in [0, 1)");
        assert!((0.0..1.0).contains(&beta2), "adam beta2 must be in [0, 1)");
        assert!(weight_decay >= 0.0, "weight_decay must be non-negative");
        self.adam_betas = (beta1, beta2);
        self.weight_decay = weight_decay;
        self
    }

    /// Set the evaluation and annealing cadence.
    pub fn intervals(mut self, eval_interval: usize, anneal_interval: usize) -> Self {
        assert!(eval_interval > 0, "eval_interval must be positive");
        assert!(anneal_interval > 0, "anneal_interval must be positive");
        self.eval_interval = eval_interval;
        self.anneal_interval = anneal_interval;
        self
    }

    /// Set the experiment name.
    pub fn experiment_name(mut self, name: &str) -> Self {
        self.experiment_name = name.to_string();
        self
    }

    /// Set the device string.
    pub fn device(mut self, device: &str) -> Self {
        self.device = device.to_string();
        self
    }

    /// Set whether the evaluation report is printed.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    // =========================================================================
    // Resolution methods
    // =========================================================================

    /// Parse the design network type.
    pub fn design_network_kind(&self) -> std::result::Result<DesignNetworkType, ConfigError> {
        self.design_network_type.parse()
    }

    /// Shape of one design.
    pub fn design_shape(&self) -> DesignShape {
        DesignShape::new(self.num_probes, self.physical_dim)
    }

    /// Prior mean as a `K x p` matrix.
    pub fn prior_mean(&self) -> std::result::Result<Matrix, ConfigError> {
        let (k, p) = (self.num_sources, self.physical_dim);
        match &self.theta_loc {
            None => Ok(Matrix::zeros(k, p)),
            Some(values) if values.len() == k * p => Ok(Matrix::from_row_slice(k, p, values)),
            Some(values) => Err(ConfigError::PriorShape {
                which: "theta_loc",
                expected: k * p,
                actual: values.len(),
            }),
        }
    }

    /// Prior covariance of one source as a `p x p` matrix.
    pub fn prior_covariance(&self) -> std::result::Result<Matrix, ConfigError> {
        let p = self.physical_dim;
        match &self.theta_covmat {
            None => Ok(Matrix::identity(p, p)),
            Some(values) if values.len() == p * p => Ok(Matrix::from_row_slice(p, p, values)),
            Some(values) => Err(ConfigError::PriorShape {
                which: "theta_covmat",
                expected: p * p,
                actual: values.len(),
            }),
        }
    }

    /// Resolve the compute device.
    pub fn resolve_device(&self) -> std::result::Result<Device, ConfigError> {
        let name = self.device.trim().to_ascii_lowercase();
        if name == "cpu" {
            return Ok(Device::Cpu);
        }
        let ordinal = match name.as_str() {
            "cuda" => Some(0),
            other => other.strip_prefix("cuda:").and_then(|o| o.parse::<usize>().ok()),
        };
        match ordinal {
            Some(ordinal) => {
                Device::new_cuda(ordinal).map_err(|_| ConfigError::InvalidDevice(self.device.clone()))
            }
            None => Err(ConfigError::InvalidDevice(self.device.clone())),
        }
    }

    /// Steps the trainer will actually take.
    ///
    /// The random baseline has nothing to learn and always runs zero steps.
    pub fn effective_num_steps(&self) -> usize {
        match self.design_network_kind() {
            Ok(DesignNetworkType::Random) => 0,
            _ => self.num_steps,
        }
    }

    /// Check that the configuration describes a well-defined run.
    ///
    /// Called by every constructor that consumes a config, before any
    /// simulation begins.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.design_network_kind()?;

        for (name, value) in [
            ("physical_dim", self.physical_dim),
            ("num_sources", self.num_sources),
            ("num_probes", self.num_probes),
            ("hidden_dim", self.hidden_dim),
            ("encoding_dim", self.encoding_dim),
        ] {
            if value == 0 {
                return Err(ConfigError::EmptyDimension(name));
            }
        }
        if self.num_rounds == 0 {
            return Err(ConfigError::NoRounds);
        }
        if !(self.max_signal > 0.0) {
            return Err(ConfigError::NonPositiveMaxSignal(self.max_signal));
        }
        if !(self.noise_scale > 0.0) {
            return Err(ConfigError::NonPositiveNoiseScale(self.noise_scale));
        }
        if self.num_inner_samples == 0 {
            return Err(ConfigError::NoInnerSamples);
        }
        if self.num_outer_samples == 0 {
            return Err(ConfigError::NoOuterSamples);
        }

        self.validate_bounds()?;
        self.validate_prior()?;

        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }
        if !(self.decay_gamma > 0.0 && self.decay_gamma <= 1.0) {
            return Err(ConfigError::InvalidGamma(self.decay_gamma));
        }
        let (beta1, beta2) = self.adam_betas;
        if !(0.0..1.0).contains(&beta1) || !(0.0..1.0).contains(&beta2) {
            return Err(ConfigError::InvalidBetas(beta1, beta2));
        }
        if !(self.weight_decay >= 0.0) {
            return Err(ConfigError::InvalidWeightDecay(self.weight_decay));
        }
        for (name, value) in [
            ("eval_interval", self.eval_interval),
            ("anneal_interval", self.anneal_interval),
            ("summary_window", self.summary_window),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        if let Some(theta) = &self.eval_theta {
            let expected = self.num_sources * self.physical_dim;
            if theta.len() != expected {
                return Err(ConfigError::PriorShape {
                    which: "eval_theta",
                    expected,
                    actual: theta.len(),
                });
            }
        }
        Ok(())
    }

    fn validate_bounds(&self) -> std::result::Result<(), ConfigError> {
        let p = self.physical_dim;
        for (which, bound) in [("lower_bound", &self.lower_bound), ("upper_bound", &self.upper_bound)] {
            if bound.len() != p {
                return Err(ConfigError::BoundsLength {
                    which,
                    expected: p,
                    actual: bound.len(),
                });
            }
        }
        for (index, (&lower, &upper)) in self.lower_bound.iter().zip(&self.upper_bound).enumerate() {
            if !(lower < upper) {
                return Err(ConfigError::InvertedBounds { index, lower, upper });
            }
        }
        Ok(())
    }

    fn validate_prior(&self) -> std::result::Result<(), ConfigError> {
        self.prior_mean()?;
        let cov = self.prior_covariance()?;
        let symmetric = (&cov - cov.transpose()).amax() <= 1e-12 * cov.amax().max(1.0);
        if !symmetric || Cholesky::new(cov).is_none() {
            return Err(ConfigError::PriorNotPositiveDefinite);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.num_steps, 500);
        assert_eq!(config.num_inner_samples, 100);
        assert_eq!(config.num_outer_samples, 200);
        assert_eq!(config.learning_rate, 1e-4);
        assert_eq!(config.decay_gamma, 0.95);
        assert_eq!(config.adam_betas, (0.8, 0.998));
        assert_eq!(config.design_shape(), DesignShape::new(1, 2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_quick_config_is_valid() {
        let quick = Config::quick();
        assert!(quick.validate().is_ok());
        assert_eq!(quick.seed, Some(DEFAULT_SEED));
        assert!(!quick.verbose);
    }

    #[test]
    fn test_builder_methods() {
        let config = Config::new()
            .physical_dim(3)
            .num_sources(4)
            .num_rounds(7)
            .samples(64, 32)
            .decay_gamma(1.0)
            .design_network(DesignNetworkType::Static);

        assert_eq!(config.lower_bound, vec![0.0; 3]);
        assert_eq!(config.upper_bound, vec![1.0; 3]);
        assert_eq!(config.num_sources, 4);
        assert_eq!(config.num_rounds, 7);
        assert_eq!(config.num_outer_samples, 64);
        assert_eq!(config.num_inner_samples, 32);
        assert_eq!(config.design_network_kind(), Ok(DesignNetworkType::Static));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_random_forces_zero_steps() {
        let config = Config::new().design_network(DesignNetworkType::Random).num_steps(100);
        assert_eq!(config.effective_num_steps(), 0);
        let config = Config::new().num_steps(100);
        assert_eq!(config.effective_num_steps(), 100);
    }

    #[test]
    fn test_validation_rejects_unknown_network() {
        let mut config = Config::default();
        config.design_network_type = "transformer".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownDesignNetwork("transformer".to_string()))
        );
    }

    #[test]
    fn test_validation_rejects_non_positive_max_signal() {
        let mut config = Config::default();
        config.max_signal = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveMaxSignal(0.0)));
        config.max_signal = -1.0;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveMaxSignal(-1.0)));
    }

    #[test]
    fn test_validation_rejects_zero_inner_samples() {
        let mut config = Config::default();
        config.num_inner_samples = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoInnerSamples));
    }

    #[test]
    fn test_validation_rejects_bad_bounds() {
        let mut config = Config::default();
        config.lower_bound = vec![0.0];
        assert!(matches!(config.validate(), Err(ConfigError::BoundsLength { .. })));

        let config = Config::default().bounds(vec![0.0, 1.0], vec![1.0, 1.0]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedBounds { index: 1, lower: 1.0, upper: 1.0 })
        );
    }

    #[test]
    fn test_validation_rejects_indefinite_prior() {
        let config = Config::default().theta_covmat(vec![1.0, 2.0, 2.0, 1.0]);
        assert_eq!(config.validate(), Err(ConfigError::PriorNotPositiveDefinite));

        let config = Config::default().theta_covmat(vec![1.0, 0.5, 0.0, 1.0]);
        assert_eq!(config.validate(), Err(ConfigError::PriorNotPositiveDefinite));
    }

    #[test]
    fn test_validation_rejects_wrong_prior_mean_length() {
        let config = Config::default().theta_loc(vec![0.0; 3]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PriorShape { which: "theta_loc", expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_resolve_device() {
        assert!(matches!(Config::default().resolve_device(), Ok(Device::Cpu)));
        let config = Config::default().device("tpu");
        assert_eq!(
            config.resolve_device().unwrap_err(),
            ConfigError::InvalidDevice("tpu".to_string())
        );
    }

    #[test]
    fn test_json_round_trip_with_defaults() {
        let config: Config = serde_json::from_str(r#"{"num_sources": 3, "seed": 7}"#).unwrap();
        assert_eq!(config.num_sources, 3);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.num_rounds, 5);
    }

    #[test]
    #[should_panic(expected = "max_signal must be positive")]
    fn test_invalid_max_signal_builder() {
        Config::new().max_signal(0.0);
    }

    #[test]
    #[should_panic(expected = "decay_gamma must be in (0, 1]")]
    fn test_invalid_gamma_builder() {
        Config::new().decay_gamma(1.5);
    }
}
