//! Generative rollouts: seeded sampling, history and the round state machine.

mod history;
mod sampler;
mod state;

pub use history::{History, HistoryEntry};
pub use sampler::{Density, Draw, Sampler};
pub use state::{Phase, Rollout, RolloutMode, Trace};
