//! Physical model: prior over sources, forward map, design transform.
//!
//! Nothing here has learnable parameters. The design policy is the only
//! component gradients flow back into.

mod forward;
mod prior;
mod transform;

pub use forward::{LocationForwardModel, ObservationDistribution};
pub use prior::SourcePrior;
pub use transform::{logit, BoundedTransform};
