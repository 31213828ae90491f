//! The engine's random-number service.
//!
//! One seedable generator (Xoshiro256++) owned by the engine and threaded
//! through the generation loop. Given the same seed and the same sequence of
//! draws, results are bit-identical across runs.

use crate::errors::SimError;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Geometric, Poisson};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::{SystemTime, UNIX_EPOCH};

/// Precomputed cumulative table for weighted discrete draws.
#[derive(Debug, Clone)]
pub struct CumulativeTable {
    sums: Vec<f64>,
    total: f64,
}

impl CumulativeTable {
    pub fn from_weights(weights: &[f64]) -> Result<Self, SimError> {
        let mut sums = Vec::with_capacity(weights.len());
        let mut total = 0.0;
        for &w in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(SimError::config(format!(
                    "weighted draw requires finite non-negative weights, got {w}"
                )));
            }
            total += w;
            sums.push(total);
        }
        if total <= 0.0 {
            return Err(SimError::config(
                "weighted draw requires a positive total weight",
            ));
        }
        Ok(Self { sums, total })
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Index of the bin containing the point `x` in `[0, total)`.
    fn locate(&self, x: f64) -> usize {
        match self.sums.partition_point(|&s| s <= x) {
            i if i < self.sums.len() => i,
            _ => self.sums.len() - 1,
        }
    }
}

pub struct EngineRng {
    rng: Xoshiro256PlusPlus,
    seed: i64,
    bit_buffer: u64,
    bits_left: u32,
}

impl EngineRng {
    pub fn from_seed(seed: i64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed as u64),
            seed,
            bit_buffer: 0,
            bits_left: 0,
        }
    }

    /// The default seed when none is configured, derived from the process id
    /// and wall time.
    pub fn generate_seed() -> i64 {
        let pid = std::process::id() as u64;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        (pid ^ nanos.rotate_left(17)) as i64
    }

    /// The seed this generator was created from, for echoing into output.
    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn uniform_index(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        self.rng.random_range(0..n)
    }

    pub fn uniform_f64(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Exponential draw with the given mean; a non-positive mean yields 0.
    pub fn exponential(&mut self, mean: f64) -> f64 {
        if mean <= 0.0 {
            return 0.0;
        }
        Exp::new(1.0 / mean)
            .expect("rate is positive and finite")
            .sample(&mut self.rng)
    }

    /// Poisson draw with the given mean; a zero mean yields 0, a negative or
    /// non-finite mean is a configuration error.
    pub fn poisson(&mut self, mean: f64) -> Result<u64, SimError> {
        if mean == 0.0 {
            return Ok(0);
        }
        if !mean.is_finite() || mean < 0.0 {
            return Err(SimError::config(format!(
                "Poisson draw requires a finite non-negative mean, got {mean}"
            )));
        }
        let dist = Poisson::new(mean)
            .map_err(|e| SimError::config(format!("Poisson draw with mean {mean}: {e}")))?;
        Ok(dist.sample(&mut self.rng) as u64)
    }

    pub fn geometric(&mut self, p: f64) -> Result<u64, SimError> {
        let dist = Geometric::new(p)
            .map_err(|e| SimError::config(format!("geometric draw with p {p}: {e}")))?;
        Ok(dist.sample(&mut self.rng))
    }

    /// Weighted discrete draw over a precomputed cumulative table.
    pub fn weighted(&mut self, table: &CumulativeTable) -> usize {
        let x = self.uniform_f64() * table.total();
        table.locate(x)
    }

    /// One Bernoulli(1/2) trial from the buffered bit stream. One underlying
    /// draw refills a 64-bit buffer consumed bit by bit.
    pub fn random_bit(&mut self) -> bool {
        if self.bits_left == 0 {
            self.bit_buffer = self.rng.random::<u64>();
            self.bits_left = 64;
        }
        let bit = self.bit_buffer & 1 == 1;
        self.bit_buffer >>= 1;
        self.bits_left -= 1;
        bit
    }

    /// Bernoulli trial with probability `p`.
    pub fn coin(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            false
        } else if p >= 1.0 {
            true
        } else {
            self.uniform_f64() < p
        }
    }

    /// Direct access for distributions the service does not wrap (DFE draws).
    pub fn raw(&mut self) -> &mut Xoshiro256PlusPlus {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reproducible() {
        let mut a = EngineRng::from_seed(42);
        let mut b = EngineRng::from_seed(42);
        for _ in 0..1000 {
            assert_eq!(a.uniform_f64().to_bits(), b.uniform_f64().to_bits());
        }
        for _ in 0..1000 {
            assert_eq!(a.random_bit(), b.random_bit());
        }
        for _ in 0..100 {
            assert_eq!(a.poisson(3.5).unwrap(), b.poisson(3.5).unwrap());
        }
    }

    #[test]
    fn test_seeds_differ() {
        let mut a = EngineRng::from_seed(1);
        let mut b = EngineRng::from_seed(2);
        let same = (0..100).filter(|_| a.uniform_f64() == b.uniform_f64()).count();
        assert!(same < 5);
    }

    #[test]
    fn test_poisson_zero_mean() {
        let mut rng = EngineRng::from_seed(7);
        assert_eq!(rng.poisson(0.0).unwrap(), 0);
    }

    #[test]
    fn test_poisson_invalid_mean() {
        let mut rng = EngineRng::from_seed(7);
        assert!(rng.poisson(-1.0).is_err());
        assert!(rng.poisson(f64::NAN).is_err());
    }

    #[test]
    fn test_exponential_mean() {
        let mut rng = EngineRng::from_seed(11);
        let n = 20_000;
        let total: f64 = (0..n).map(|_| rng.exponential(5.0)).sum();
        let mean = total / n as f64;
        assert!((mean - 5.0).abs() < 0.2, "observed mean {mean}");
        assert_eq!(rng.exponential(0.0), 0.0);
    }

    #[test]
    fn test_weighted_table() {
        let table = CumulativeTable::from_weights(&[1.0, 0.0, 3.0]).unwrap();
        let mut rng = EngineRng::from_seed(13);
        let mut counts = [0usize; 3];
        for _ in 0..40_000 {
            counts[rng.weighted(&table)] += 1;
        }
        assert_eq!(counts[1], 0);
        let ratio = counts[2] as f64 / counts[0] as f64;
        assert!((ratio - 3.0).abs() < 0.3, "observed ratio {ratio}");
    }

    #[test]
    fn test_weighted_table_invalid() {
        assert!(CumulativeTable::from_weights(&[-1.0, 2.0]).is_err());
        assert!(CumulativeTable::from_weights(&[0.0, 0.0]).is_err());
        assert!(CumulativeTable::from_weights(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_geometric() {
        let mut rng = EngineRng::from_seed(19);
        // mean of Geometric(p) on {0, 1, ...} is (1 - p) / p
        let n = 20_000;
        let total: u64 = (0..n).map(|_| rng.geometric(0.25).unwrap()).sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 3.0).abs() < 0.1, "observed mean {mean}");
        assert!(rng.geometric(0.0).is_err());
    }

    #[test]
    fn test_uniform_index_range() {
        let mut rng = EngineRng::from_seed(3);
        for _ in 0..1000 {
            assert!(rng.uniform_index(7) < 7);
        }
    }

    #[test]
    fn test_random_bit_balance() {
        let mut rng = EngineRng::from_seed(5);
        let ones = (0..10_000).filter(|_| rng.random_bit()).count();
        assert!(ones > 4500 && ones < 5500, "observed {ones}");
    }
}
