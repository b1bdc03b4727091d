//! Reproducible random number source
//!
//! This module provides the single uniform source every sampling routine in
//! the engine draws from. Reproducibility is the core contract: the same seed
//! produces the same sequence on every run and platform, which makes a full
//! simulation a pure function of (configuration, seed).
//!
//! # Streams
//!
//! Replications must be statistically independent. Rather than sharing one
//! generator, each replication derives its own stream with
//! [`RandomSource::create_stream`]: the child is seeded from a SplitMix64
//! mix of the parent seed and the stream index, so streams are decorrelated
//! for any realistic replication count.
//!
//! # Generator choice
//!
//! Xoshiro256++ (via `rand_xoshiro`): 256 bits of state, period 2^256 - 1,
//! good equidistribution, and fast enough to sit inside the per-event hot
//! path. A linear-congruential generator would satisfy the reproducibility
//! contract but not the statistical-quality bar for production runs.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Seedable uniform random source with stream derivation
///
/// Thread safety is deliberately not provided per-instance: the concurrency
/// model is one independent `RandomSource` per replication thread.
#[derive(Debug, Clone)]
pub struct RandomSource {
    seed: u64,
    rng: Xoshiro256PlusPlus,
}

impl RandomSource {
    /// Create a source seeded with `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// The seed this source was created or last re-seeded with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next uniform value in `[0, 1)`
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Next uniform value in `[low, high)`
    #[inline]
    pub fn next_range(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }

    /// Deterministically re-seed, restarting the output sequence
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    }

    /// Derive an independent stream for replication `index`
    ///
    /// The child seed is `splitmix64(seed + GOLDEN * (index + 1))`, the same
    /// mixing finalizer `rand` uses inside `seed_from_u64`. Consecutive
    /// indices land in unrelated regions of the seed space, so sample paths
    /// across replications are independent for practical purposes.
    pub fn create_stream(&self, index: u64) -> RandomSource {
        let mixed = splitmix64(self.seed.wrapping_add(GOLDEN_GAMMA.wrapping_mul(index + 1)));
        RandomSource::new(mixed)
    }
}

/// Weyl-sequence increment used by SplitMix64
const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// SplitMix64 finalizer: bijective 64-bit mix with full avalanche
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = RandomSource::new(12345);
        let mut b = RandomSource::new(12345);

        for _ in 0..1000 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = RandomSource::new(1);
        let mut b = RandomSource::new(2);

        let matches = (0..100)
            .filter(|_| a.next_f64().to_bits() == b.next_f64().to_bits())
            .count();
        assert_eq!(matches, 0);
    }

    #[test]
    fn test_output_in_unit_interval() {
        let mut src = RandomSource::new(42);
        for _ in 0..10_000 {
            let u = src.next_f64();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_next_range_bounds() {
        let mut src = RandomSource::new(7);
        for _ in 0..1000 {
            let x = src.next_range(5.0, 9.0);
            assert!((5.0..9.0).contains(&x));
        }
    }

    #[test]
    fn test_reseed_restarts_sequence() {
        let mut src = RandomSource::new(99);
        let first: Vec<u64> = (0..10).map(|_| src.next_f64().to_bits()).collect();

        src.reseed(99);
        let second: Vec<u64> = (0..10).map(|_| src.next_f64().to_bits()).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_streams_are_deterministic() {
        let parent = RandomSource::new(1000);
        let mut s1 = parent.create_stream(3);
        let mut s2 = parent.create_stream(3);

        for _ in 0..100 {
            assert_eq!(s1.next_f64().to_bits(), s2.next_f64().to_bits());
        }
    }

    #[test]
    fn test_streams_do_not_collide() {
        let parent = RandomSource::new(1000);
        let mut seeds = std::collections::HashSet::new();
        for i in 0..10_000 {
            assert!(seeds.insert(parent.create_stream(i).seed()));
        }
    }

    #[test]
    fn test_adjacent_base_seeds_give_distinct_streams() {
        // base_seed + r is a common caller pattern; the mixer must keep
        // stream 1 of seed N away from stream 0 of seed N+1.
        let a = RandomSource::new(500).create_stream(1);
        let b = RandomSource::new(501).create_stream(0);
        assert_ne!(a.seed(), b.seed());
    }

    #[test]
    fn test_uniform_sample_mean() {
        let mut src = RandomSource::new(2024);
        let n = 100_000;
        let sum: f64 = (0..n).map(|_| src.next_f64()).sum();
        let mean = sum / n as f64;

        // Standard error of the mean of U(0,1) is ~0.000913 at n=100k
        assert!((mean - 0.5).abs() < 0.003, "uniform mean off: {}", mean);
    }
}
