//! Numeric constants and configuration defaults.

/// Default deterministic seed for RNG operations.
///
/// Same seed + same configuration = same sample sequences.
/// The value `0x6C6F6366696E64` is "locfind" encoded in ASCII.
pub const DEFAULT_SEED: u64 = 0x6C6F6366696E64;

/// Natural log of 2*pi, used in the Gaussian log-density.
pub const LOG_2PI: f64 = 1.8378770664093453;

// =============================================================================
// Forward model defaults
// =============================================================================

/// Constant background signal added before the log link.
pub const DEFAULT_BASE_SIGNAL: f64 = 0.1;

/// Saturation term in the inverse-square attenuation `1 / (max_signal + d²)`.
pub const DEFAULT_MAX_SIGNAL: f64 = 1e-4;

/// Standard deviation of the additive observation noise.
pub const DEFAULT_NOISE_SCALE: f64 = 0.5;

// =============================================================================
// Estimator and optimizer defaults
// =============================================================================

/// Default number of contrastive (inner) latents per outer rollout.
pub const DEFAULT_INNER_SAMPLES: usize = 100;

/// Default number of outer rollouts per loss estimate.
pub const DEFAULT_OUTER_SAMPLES: usize = 200;

/// Default Adam learning rate.
pub const DEFAULT_LEARNING_RATE: f64 = 1e-4;

/// Default multiplicative learning-rate decay.
pub const DEFAULT_DECAY_GAMMA: f64 = 0.95;

/// Default Adam first/second moment coefficients.
pub const DEFAULT_ADAM_BETAS: (f64, f64) = (0.8, 0.998);

/// Adam epsilon (PyTorch default).
pub const ADAM_EPS: f64 = 1e-8;

// =============================================================================
// Training loop cadence
// =============================================================================

/// Steps between gradient-free loss evaluations.
pub const DEFAULT_EVAL_INTERVAL: usize = 50;

/// Steps between learning-rate decays.
pub const DEFAULT_ANNEAL_INTERVAL: usize = 1000;

/// Number of losses averaged at each end of the history for the summary.
pub const DEFAULT_SUMMARY_WINDOW: usize = 50;

/// Default number of traces printed by the evaluation report.
pub const DEFAULT_EVAL_TRACES: usize = 3;
