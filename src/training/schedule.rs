//! Step-wise learning-rate annealing.

/// Multiply the learning rate by `gamma` every `interval` steps.
///
/// Decay is checked after the optimizer step, so step 0 decays too. With
/// `gamma = 1` the rate never changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDecay {
    gamma: f64,
    interval: usize,
}

impl StepDecay {
    /// Create a schedule. `interval` must be positive.
    pub fn new(gamma: f64, interval: usize) -> Self {
        assert!(interval > 0, "anneal_interval must be positive");
        assert!(gamma > 0.0 && gamma <= 1.0, "decay_gamma must be in (0, 1]");
        Self { gamma, interval }
    }

    /// Whether the rate decays after `step`.
    pub fn decays_at(&self, step: usize) -> bool {
        step % self.interval == 0
    }

    /// Learning rate to use after `step`, if it changes.
    pub fn next(&self, lr: f64, step: usize) -> Option<f64> {
        self.decays_at(step).then_some(lr * self.gamma)
    }
}
