//! End-of-training loss statistics.

use serde::{Deserialize, Serialize};

/// How much the loss moved over training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    /// Gradient steps taken.
    pub steps: usize,
    /// Mean of the last `window` losses, excluding the final one.
    pub loss_av50: f64,
    /// `loss_av50 / mean(first window) - 1`. Zero when nothing was trained.
    pub loss_diff50: f64,
}

impl FitSummary {
    /// Summarise a loss history.
    ///
    /// Returns `None` for an empty history; use [`FitSummary::single_shot`]
    /// there instead.
    pub fn from_history(history: &[f64], window: usize) -> Option<Self> {
        if history.is_empty() {
            return None;
        }
        let len = history.len();
        let tail = &history[len.saturating_sub(window + 1)..len - 1];
        let tail = if tail.is_empty() { history } else { tail };
        let head = &history[..window.min(len)];

        let loss_av50 = mean(tail);
        let head_mean = mean(head);
        let loss_diff50 = if head_mean == 0.0 { 0.0 } else { loss_av50 / head_mean - 1.0 };
        Some(Self {
            steps: len,
            loss_av50,
            loss_diff50,
        })
    }

    /// Summary for a run with no optimisation, from one direct loss estimate.
    pub fn single_shot(loss: f64) -> Self {
        Self {
            steps: 0,
            loss_av50: loss,
            loss_diff50: 0.0,
        }
    }
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_exclude_final_loss() {
        let history: Vec<f64> = (0..10).map(|i| i as f64 + 1.0).collect();
        let s = FitSummary::from_history(&history, 3).unwrap();
        // tail = [7, 8, 9], head = [1, 2, 3]
        assert_eq!(s.loss_av50, 8.0);
        assert_eq!(s.loss_diff50, 8.0 / 2.0 - 1.0);
        assert_eq!(s.steps, 10);
    }

    #[test]
    fn single_step_uses_whole_history() {
        let s = FitSummary::from_history(&[-2.0], 50).unwrap();
        assert_eq!(s.loss_av50, -2.0);
        assert_eq!(s.loss_diff50, 0.0);
    }

    #[test]
    fn empty_history_has_no_summary() {
        assert!(FitSummary::from_history(&[], 50).is_none());
        let s = FitSummary::single_shot(-1.5);
        assert_eq!((s.steps, s.loss_av50, s.loss_diff50), (0, -1.5, 0.0));
    }
}
