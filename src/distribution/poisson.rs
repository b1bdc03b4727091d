//! Poisson distribution
//!
//! Integer event counts sampled with Knuth's product method: multiply
//! uniforms until the running product drops below `e^-lambda`. Runtime is
//! O(lambda) per sample, which is fine for the arrival-count magnitudes
//! this engine sees.

use super::Distribution;
use crate::error::SimError;
use crate::random::RandomSource;

/// Poisson distribution with rate `lambda`
#[derive(Debug, Clone, Copy)]
pub struct Poisson {
    lambda: f64,
    limit: f64,
}

impl Poisson {
    /// Create a Poisson distribution
    ///
    /// Requires `lambda > 0`.
    pub fn new(lambda: f64) -> Result<Self, SimError> {
        if !lambda.is_finite() || lambda <= 0.0 {
            return Err(SimError::InvalidDistributionParams {
                distribution: "poisson",
                reason: format!("lambda must be > 0, got {}", lambda),
            });
        }
        Ok(Self {
            lambda,
            limit: (-lambda).exp(),
        })
    }
}

impl Distribution for Poisson {
    fn sample(&mut self, rng: &mut RandomSource) -> f64 {
        let mut k = 0u64;
        let mut p = 1.0;

        loop {
            p *= rng.next_f64();
            if p <= self.limit {
                return k as f64;
            }
            k += 1;
        }
    }

    fn mean(&self) -> f64 {
        self.lambda
    }

    fn stddev(&self) -> f64 {
        self.lambda.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::tests::assert_sample_mean;

    #[test]
    fn test_poisson_non_negative_integers() {
        let mut dist = Poisson::new(4.0).unwrap();
        let mut rng = RandomSource::new(42);

        for _ in 0..10_000 {
            let x = dist.sample(&mut rng);
            assert!(x >= 0.0);
            assert_eq!(x, x.trunc());
        }
    }

    #[test]
    fn test_poisson_sample_mean() {
        let mut dist = Poisson::new(4.0).unwrap();
        assert_sample_mean(&mut dist, 29);
    }

    #[test]
    fn test_poisson_small_lambda() {
        let mut dist = Poisson::new(0.1).unwrap();
        let mut rng = RandomSource::new(8);

        // Mostly zeros at lambda = 0.1
        let zeros = (0..10_000)
            .filter(|_| dist.sample(&mut rng) == 0.0)
            .count();
        assert!(zeros > 8500, "zeros: {}", zeros);
    }

    #[test]
    fn test_poisson_invalid_params() {
        assert!(Poisson::new(0.0).is_err());
        assert!(Poisson::new(-2.0).is_err());
        assert!(Poisson::new(f64::INFINITY).is_err());
    }
}
