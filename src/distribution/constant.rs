//! Constant distribution
//!
//! Degenerate distribution that always returns the same value. Used for
//! deterministic service times and for validation scenarios where queueing
//! behavior must be predictable.

use super::Distribution;
use crate::error::SimError;
use crate::random::RandomSource;

/// Fixed-duration distribution
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    value: f64,
}

impl Constant {
    /// Create a constant distribution
    ///
    /// Fails with `InvalidDistributionParams` if `value` is negative or
    /// non-finite.
    pub fn new(value: f64) -> Result<Self, SimError> {
        if !value.is_finite() || value < 0.0 {
            return Err(SimError::InvalidDistributionParams {
                distribution: "constant",
                reason: format!("value must be finite and >= 0, got {}", value),
            });
        }
        Ok(Self { value })
    }

    /// The fixed value
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Distribution for Constant {
    fn sample(&mut self, _rng: &mut RandomSource) -> f64 {
        self.value
    }

    fn mean(&self) -> f64 {
        self.value
    }

    fn stddev(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_samples_value() {
        let mut dist = Constant::new(5.0).unwrap();
        let mut rng = RandomSource::new(1);

        for _ in 0..100 {
            assert_eq!(dist.sample(&mut rng), 5.0);
        }
        assert_eq!(dist.mean(), 5.0);
        assert_eq!(dist.stddev(), 0.0);
    }

    #[test]
    fn test_constant_zero_allowed() {
        assert!(Constant::new(0.0).is_ok());
    }

    #[test]
    fn test_constant_negative_rejected() {
        assert!(Constant::new(-1.0).is_err());
    }

    #[test]
    fn test_constant_nan_rejected() {
        assert!(Constant::new(f64::NAN).is_err());
    }
}
