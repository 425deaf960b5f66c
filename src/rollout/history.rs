//! Accumulated (design, outcome) history of a rollout.

use candle_core::Tensor;

use crate::error::{Error, Result};
use crate::types::DesignShape;

/// One completed round.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Unconstrained design, `[B, n, p]`.
    pub design: Tensor,
    /// Observation, `[B, n]`.
    pub observation: Tensor,
}

/// Ordered record of completed rounds.
///
/// Order is kept for bookkeeping and replay only; the adaptive policy pools
/// it as an unordered set. Entries are immutable once appended.
#[derive(Debug, Clone)]
pub struct History {
    shape: DesignShape,
    batch: usize,
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Empty history for `batch` parallel experiments.
    pub fn new(shape: DesignShape, batch: usize) -> Self {
        Self {
            shape,
            batch,
            entries: Vec::new(),
        }
    }

    /// Append a round. Shapes must match `[B, n, p]` and `[B, n]` exactly.
    pub fn push(&mut self, design: Tensor, observation: Tensor) -> Result<()> {
        let DesignShape { n, p } = self.shape;
        if design.dims() != [self.batch, n, p] {
            return Err(Error::shape(
                "history design",
                format!("[{}, {}, {}]", self.batch, n, p),
                design.dims(),
            ));
        }
        if observation.dims() != [self.batch, n] {
            return Err(Error::shape(
                "history observation",
                format!("[{}, {}]", self.batch, n),
                observation.dims(),
            ));
        }
        self.entries.push(HistoryEntry { design, observation });
        Ok(())
    }

    /// Design shape of every entry.
    pub fn shape(&self) -> DesignShape {
        self.shape
    }

    /// Number of parallel experiments.
    pub fn batch_size(&self) -> usize {
        self.batch
    }

    /// Completed rounds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No round completed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate rounds in the order they were appended.
    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.entries.iter()
    }

    /// Entries as a slice.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Copy of this history with rounds reordered by `order`.
    ///
    /// `order` must be a permutation of `0..len()`.
    pub fn permuted(&self, order: &[usize]) -> Result<Self> {
        let mut seen = vec![false; self.len()];
        for &i in order {
            if i >= self.len() || seen[i] {
                return Err(Error::shape("history permutation", format!("permutation of 0..{}", self.len()), order));
            }
            seen[i] = true;
        }
        if order.len() != self.len() {
            return Err(Error::shape("history permutation", format!("permutation of 0..{}", self.len()), order));
        }
        Ok(Self {
            shape: self.shape,
            batch: self.batch,
            entries: order.iter().map(|&i| self.entries[i].clone()).collect(),
        })
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    fn zeros(dims: &[usize]) -> Tensor {
        Tensor::zeros(dims, DType::F32, &Device::Cpu).unwrap()
    }

    #[test]
    fn push_checks_shapes() {
        let mut h = History::new(DesignShape::new(2, 3), 4);
        assert!(h.push(zeros(&[4, 2, 3]), zeros(&[4, 2])).is_ok());
        assert!(h.push(zeros(&[4, 3, 2]), zeros(&[4, 2])).is_err());
        assert!(h.push(zeros(&[4, 2, 3]), zeros(&[4, 1])).is_err());
        assert!(h.push(zeros(&[5, 2, 3]), zeros(&[5, 2])).is_err());
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn permuted_rejects_non_permutations() {
        let mut h = History::new(DesignShape::new(1, 1), 1);
        for _ in 0..3 {
            h.push(zeros(&[1, 1, 1]), zeros(&[1, 1])).unwrap();
        }
        assert!(h.permuted(&[2, 0, 1]).is_ok());
        assert!(h.permuted(&[0, 0, 1]).is_err());
        assert!(h.permuted(&[0, 1]).is_err());
        assert!(h.permuted(&[0, 1, 3]).is_err());
    }
}
