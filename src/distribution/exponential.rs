//! Exponential distribution
//!
//! The workhorse for inter-arrival times and memoryless service. Sampled by
//! inversion: `-mean * ln(1 - U)`.

use super::Distribution;
use crate::error::SimError;
use crate::random::RandomSource;

/// Exponential distribution with the given mean
#[derive(Debug, Clone, Copy)]
pub struct Exponential {
    mean: f64,
}

impl Exponential {
    /// Create an exponential distribution
    ///
    /// Requires `mean > 0`.
    pub fn new(mean: f64) -> Result<Self, SimError> {
        if !mean.is_finite() || mean <= 0.0 {
            return Err(SimError::InvalidDistributionParams {
                distribution: "exponential",
                reason: format!("mean must be > 0, got {}", mean),
            });
        }
        Ok(Self { mean })
    }

    /// Events per time unit (`1 / mean`)
    pub fn rate(&self) -> f64 {
        1.0 / self.mean
    }
}

impl Distribution for Exponential {
    fn sample(&mut self, rng: &mut RandomSource) -> f64 {
        // 1 - U stays in (0, 1], keeping ln() finite
        -self.mean * (1.0 - rng.next_f64()).ln()
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn stddev(&self) -> f64 {
        self.mean
    }
}
