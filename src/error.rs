//! Error types.
//!
//! Configuration problems are reported as [`ConfigError`] before any
//! simulation starts. Everything that can go wrong afterwards is wrapped in
//! the crate-wide [`Error`].

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the library.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration was rejected during validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Two components disagreed on a tensor shape.
    ///
    /// These are programming errors; they are never resolved by reshaping.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    Shape {
        /// Which boundary detected the mismatch.
        context: &'static str,
        /// Shape the receiving component requires.
        expected: String,
        /// Shape that was actually supplied.
        actual: String,
    },

    /// A rollout was driven outside its state machine.
    #[error(transparent)]
    Rollout(#[from] RolloutError),

    /// The experiment-tracking collaborator failed.
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    /// An artifact could not be written or read back.
    #[error("artifact error at {path}: {message}")]
    Artifact {
        /// Location of the artifact.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// Tensor backend failure.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialisation failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn shape(context: &'static str, expected: impl Into<String>, actual: &[usize]) -> Self {
        Error::Shape {
            context,
            expected: expected.into(),
            actual: format!("{:?}", actual),
        }
    }
}

/// Reasons a [`Config`](crate::Config) is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `design_network_type` is not one of `adaptive`, `static`, `random`.
    #[error("design_network_type={0} not supported")]
    UnknownDesignNetwork(String),

    /// The forward map divides by `max_signal + d²`; it must stay positive.
    #[error("max_signal must be > 0 (got {0}); the forward map is undefined at a source")]
    NonPositiveMaxSignal(f64),

    /// Observation noise must be strictly positive.
    #[error("noise_scale must be > 0 (got {0})")]
    NonPositiveNoiseScale(f64),

    /// Without contrastive samples the bound collapses to the outer log-density.
    #[error("num_inner_samples must be > 0; with no contrastive samples the bound is meaningless")]
    NoInnerSamples,

    /// At least one outer rollout is needed to estimate the bound.
    #[error("num_outer_samples must be > 0")]
    NoOuterSamples,

    /// An experiment needs at least one round.
    #[error("num_rounds must be > 0")]
    NoRounds,

    /// A structural dimension was zero.
    #[error("{0} must be > 0")]
    EmptyDimension(&'static str),

    /// Design bounds do not have one entry per physical dimension.
    #[error("{which} has {actual} entries, expected physical_dim={expected}")]
    BoundsLength {
        /// `lower_bound` or `upper_bound`.
        which: &'static str,
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// Some lower bound is not strictly below its upper bound.
    #[error("lower_bound[{index}]={lower} must be < upper_bound[{index}]={upper}")]
    InvertedBounds {
        /// Offending coordinate.
        index: usize,
        /// Lower bound value.
        lower: f64,
        /// Upper bound value.
        upper: f64,
    },

    /// Prior mean or covariance has the wrong number of entries.
    #[error("{which} has {actual} entries, expected {expected}")]
    PriorShape {
        /// `theta_loc` or `theta_covmat`.
        which: &'static str,
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// Prior covariance is not symmetric positive definite.
    #[error("theta_covmat must be symmetric positive definite")]
    PriorNotPositiveDefinite,

    /// Decay factor outside (0, 1].
    #[error("decay_gamma must be in (0, 1] (got {0})")]
    InvalidGamma(f64),

    /// Learning rate must be finite and positive.
    #[error("learning_rate must be > 0 (got {0})")]
    InvalidLearningRate(f64),

    /// Adam moment coefficients must lie in [0, 1).
    #[error("adam betas must be in [0, 1) (got {0}, {1})")]
    InvalidBetas(f64, f64),

    /// Weight decay must be non-negative.
    #[error("weight_decay must be >= 0 (got {0})")]
    InvalidWeightDecay(f64),

    /// Device string could not be parsed.
    #[error("device must be `cpu` or `cuda:<ordinal>` (got {0})")]
    InvalidDevice(String),

    /// A cadence interval was zero.
    #[error("{0} must be > 0")]
    ZeroInterval(&'static str),
}

/// Failure reported by an experiment-tracking sink.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// The sink could not persist the record.
    #[error("tracking sink unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    /// The record could not be encoded.
    #[error("tracking record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink was already closed.
    #[error("tracking sink already closed")]
    Closed,

    /// A record arrived before any run was started on the sink.
    #[error("no run started on tracking sink")]
    NoActiveRun,
}

/// Misuse of the rollout state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RolloutError {
    /// `step` was called on a rollout that already produced its trace.
    #[error("rollout already complete after {rounds} rounds; start a fresh rollout")]
    AlreadyComplete {
        /// Number of rounds the rollout ran.
        rounds: usize,
    },

    /// The trace was requested before all rounds ran.
    #[error("rollout stopped at round {completed} of {rounds}; no rounds may be skipped")]
    Incomplete {
        /// Rounds executed so far.
        completed: usize,
        /// Rounds required.
        rounds: usize,
    },
}
