//! Uniform distribution
//!
//! Equal density on `[min, max)`. Sampled as `min + U * (max - min)`.

use super::Distribution;
use crate::error::SimError;
use crate::random::RandomSource;

/// Continuous uniform distribution on `[min, max)`
#[derive(Debug, Clone, Copy)]
pub struct Uniform {
    min: f64,
    max: f64,
}

impl Uniform {
    /// Create a uniform distribution
    ///
    /// Requires `0 <= min < max`.
    pub fn new(min: f64, max: f64) -> Result<Self, SimError> {
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min >= max {
            return Err(SimError::InvalidDistributionParams {
                distribution: "uniform",
                reason: format!("requires 0 <= min < max, got min={}, max={}", min, max),
            });
        }
        Ok(Self { min, max })
    }
}

impl Distribution for Uniform {
    fn sample(&mut self, rng: &mut RandomSource) -> f64 {
        self.min + rng.next_f64() * (self.max - self.min)
    }

    fn mean(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    fn stddev(&self) -> f64 {
        (self.max - self.min) / 12f64.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::tests::assert_sample_mean;

    #[test]
    fn test_uniform_bounds() {
        let mut dist = Uniform::new(2.0, 6.0).unwrap();
        let mut rng = RandomSource::new(42);

        for _ in 0..10_000 {
            let x = dist.sample(&mut rng);
            assert!((2.0..6.0).contains(&x));
        }
    }

    #[test]
    fn test_uniform_sample_mean() {
        let mut dist = Uniform::new(2.0, 6.0).unwrap();
        assert_sample_mean(&mut dist, 7);
    }

    #[test]
    fn test_uniform_moments() {
        let dist = Uniform::new(0.0, 12.0).unwrap();
        assert!((dist.mean() - 6.0).abs() < 1e-12);
        assert!((dist.stddev() - 12.0 / 12f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_invalid_params() {
        assert!(Uniform::new(-1.0, 5.0).is_err());
        assert!(Uniform::new(5.0, 5.0).is_err());
        assert!(Uniform::new(6.0, 5.0).is_err());
        assert!(Uniform::new(0.0, f64::INFINITY).is_err());
    }
}
