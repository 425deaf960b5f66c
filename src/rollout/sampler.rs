//! Seeded sampling of reparameterised random variables.
//!
//! Every random number in a run comes from one `Xoshiro256PlusPlus` stream.
//! Draws are generated on the host and uploaded as tensors, so the sequence
//! depends only on the seed, never on the tensor backend.

use candle_core::{Device, Tensor};
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::error::Result;

/// A distribution that can be sampled by reparameterisation and scored.
pub trait Density {
    /// Draw a value whose dependence on the distribution's parameters is
    /// differentiable.
    fn rsample(&self, sampler: &mut Sampler) -> Result<Tensor>;

    /// Log-density of `value`, summed over the event dimension.
    fn log_prob(&self, value: &Tensor) -> Result<Tensor>;
}

/// A sampled value together with its log-density.
#[derive(Debug, Clone)]
pub struct Draw {
    /// The sampled value.
    pub value: Tensor,
    /// Log-density of `value` under the distribution it came from.
    pub log_density: Tensor,
}

/// Owner of the run's random stream.
pub struct Sampler {
    rng: Xoshiro256PlusPlus,
    seed: u64,
    device: Device,
}

impl Sampler {
    /// Create a sampler seeded with `seed`.
    pub fn new(seed: u64, device: &Device) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            seed,
            device: device.clone(),
        }
    }

    /// Create a sampler with a fresh seed from OS entropy.
    pub fn from_entropy(device: &Device) -> Self {
        let seed = rand::rng().random::<u64>();
        Self::new(seed, device)
    }

    /// Seed this sampler was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Device uploaded tensors are placed on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Draw from `dist` and record the log-density of the draw.
    pub fn draw<P: Density + ?Sized>(&mut self, dist: &P) -> Result<Draw> {
        let value = dist.rsample(self)?;
        let log_density = dist.log_prob(&value)?;
        Ok(Draw { value, log_density })
    }

    /// Host-side standard normal draws.
    pub fn normal_vec(&mut self, len: usize) -> Vec<f64> {
        (0..len).map(|_| self.rng.sample(StandardNormal)).collect()
    }

    /// Host-side uniform draws on the open interval (0, 1).
    pub fn uniform_vec(&mut self, len: usize) -> Vec<f64> {
        (0..len)
            .map(|_| loop {
                let u: f64 = self.rng.random();
                if u > 0.0 {
                    break u;
                }
            })
            .collect()
    }

    /// Host-side uniform draws on `[low, high)`.
    pub fn uniform_range_vec(&mut self, len: usize, low: f64, high: f64) -> Vec<f64> {
        (0..len).map(|_| self.rng.random_range(low..high)).collect()
    }

    /// Standard normal tensor of the given shape.
    pub fn standard_normal(&mut self, dims: &[usize]) -> Result<Tensor> {
        let len = dims.iter().product();
        let data: Vec<f32> = self.normal_vec(len).into_iter().map(|x| x as f32).collect();
        Ok(Tensor::from_vec(data, dims, &self.device)?)
    }

    /// Uniform (0, 1) tensor of the given shape.
    pub fn uniform(&mut self, dims: &[usize]) -> Result<Tensor> {
        let len = dims.iter().product();
        let data: Vec<f32> = self.uniform_vec(len).into_iter().map(|x| x as f32).collect();
        Ok(Tensor::from_vec(data, dims, &self.device)?)
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("seed", &self.seed)
            .field("device", &self.device)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Sampler::new(42, &Device::Cpu);
        let mut b = Sampler::new(42, &Device::Cpu);
        assert_eq!(a.normal_vec(16), b.normal_vec(16));
        assert_eq!(a.uniform_vec(16), b.uniform_vec(16));
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = Sampler::new(1, &Device::Cpu);
        let mut b = Sampler::new(2, &Device::Cpu);
        assert_ne!(a.normal_vec(8), b.normal_vec(8));
    }

    #[test]
    fn uniform_stays_open() {
        let mut s = Sampler::new(7, &Device::Cpu);
        assert!(s.uniform_vec(10_000).iter().all(|&u| u > 0.0 && u < 1.0));
    }

    #[test]
    fn tensor_shapes() {
        let mut s = Sampler::new(7, &Device::Cpu);
        assert_eq!(s.standard_normal(&[3, 4, 2]).unwrap().dims(), &[3, 4, 2]);
        assert_eq!(s.uniform(&[5]).unwrap().dims(), &[5]);
    }
}
