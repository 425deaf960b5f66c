//! Non-adaptive design policies used for ablation.

use candle_core::Tensor;
use candle_nn::VarMap;

use crate::error::{Error, Result};
use crate::model::logit;
use crate::policy::{init, DesignStrategy};
use crate::rollout::{History, Sampler};
use crate::types::DesignShape;

// =============================================================================
// Static table
// =============================================================================

/// A learned `[T, n, p]` table of raw designs.
///
/// Round `t` always gets row `t`, whatever was observed before it.
pub struct StaticDesigns {
    table: Tensor,
    rounds: usize,
    params: VarMap,
}

impl StaticDesigns {
    /// Table initialised from a standard normal.
    pub fn new(rounds: usize, shape: DesignShape, sampler: &mut Sampler) -> Result<Self> {
        let params = VarMap::new();
        let start = sampler.standard_normal(&[rounds, shape.n, shape.p])?;
        let table = init::register(&params, "designs", start)?;
        Ok(Self { table, rounds, params })
    }

    /// Trainable parameters.
    pub fn params(&self) -> &VarMap {
        &self.params
    }

    /// Mutable access, used when restoring saved weights.
    pub fn params_mut(&mut self) -> &mut VarMap {
        &mut self.params
    }

    /// Raw design table, `[T, n, p]`.
    pub fn table(&self) -> &Tensor {
        &self.table
    }
}

impl DesignStrategy for StaticDesigns {
    fn next_design(&self, history: &History, _sampler: &mut Sampler) -> Result<Tensor> {
        let t = history.len();
        if t >= self.rounds {
            return Err(Error::shape(
                "static design round",
                format!("round < {}", self.rounds),
                &[t],
            ));
        }
        let DesignShape { n, p } = history.shape();
        let row = self.table.narrow(0, t, 1)?;
        if row.dims() != [1, n, p] {
            return Err(Error::shape("static design table", format!("[1, {n}, {p}]"), row.dims()));
        }
        Ok(row.broadcast_as((history.batch_size(), n, p))?.contiguous()?)
    }
}

impl std::fmt::Debug for StaticDesigns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticDesigns")
            .field("rounds", &self.rounds)
            .field("table", &self.table.dims())
            .finish()
    }
}

// =============================================================================
// Random
// =============================================================================

/// Independent draws every round; nothing to learn.
///
/// Raw coordinates are `logit(u)` with `u ~ U(0, 1)`, so after the bounded
/// transform designs are uniform over the design box.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDesigns;

impl DesignStrategy for RandomDesigns {
    fn next_design(&self, history: &History, sampler: &mut Sampler) -> Result<Tensor> {
        let DesignShape { n, p } = history.shape();
        let batch = history.batch_size();
        let data: Vec<f32> = sampler
            .uniform_vec(batch * n * p)
            .into_iter()
            .map(|u| logit(u) as f32)
            .collect();
        Ok(Tensor::from_vec(data, (batch, n, p), sampler.device())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn static_ignores_outcomes() {
        let shape = DesignShape::new(1, 2);
        let mut sampler = Sampler::new(4, &Device::Cpu);
        let designs = StaticDesigns::new(3, shape, &mut sampler).unwrap();

        let mut a = History::new(shape, 2);
        let mut b = History::new(shape, 2);
        let first_a = designs.next_design(&a, &mut sampler).unwrap();
        let first_b = designs.next_design(&b, &mut sampler).unwrap();
        assert_eq!(first_a.to_vec3::<f32>().unwrap(), first_b.to_vec3::<f32>().unwrap());

        a.push(first_a, sampler.standard_normal(&[2, 1]).unwrap()).unwrap();
        b.push(first_b, sampler.standard_normal(&[2, 1]).unwrap()).unwrap();
        let second_a = designs.next_design(&a, &mut sampler).unwrap().to_vec3::<f32>().unwrap();
        let second_b = designs.next_design(&b, &mut sampler).unwrap().to_vec3::<f32>().unwrap();
        assert_eq!(second_a, second_b);

        let row1 = designs.table().get(1).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(second_a[0], row1);
        assert_eq!(second_a[1], row1);
    }

    #[test]
    fn static_rejects_rounds_past_table() {
        let shape = DesignShape::new(1, 1);
        let mut sampler = Sampler::new(4, &Device::Cpu);
        let designs = StaticDesigns::new(1, shape, &mut sampler).unwrap();
        let mut h = History::new(shape, 1);
        let d = designs.next_design(&h, &mut sampler).unwrap();
        h.push(d, sampler.standard_normal(&[1, 1]).unwrap()).unwrap();
        assert!(designs.next_design(&h, &mut sampler).is_err());
    }

    #[test]
    fn random_is_stochastic() {
        let shape = DesignShape::new(2, 2);
        let mut sampler = Sampler::new(4, &Device::Cpu);
        let h = History::new(shape, 3);
        let a = RandomDesigns.next_design(&h, &mut sampler).unwrap();
        let b = RandomDesigns.next_design(&h, &mut sampler).unwrap();
        assert_eq!(a.dims(), &[3, 2, 2]);
        assert_ne!(a.to_vec3::<f32>().unwrap(), b.to_vec3::<f32>().unwrap());
    }
}
