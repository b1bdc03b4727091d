//! Triangular distribution
//!
//! Three-point estimate sampled by inverse CDF, split at
//! `F = (mode - min) / (max - min)`.

use super::Distribution;
use crate::error::SimError;
use crate::random::RandomSource;

/// Triangular distribution on `[min, max]` with peak at `mode`
#[derive(Debug, Clone, Copy)]
pub struct Triangular {
    min: f64,
    mode: f64,
    max: f64,
}

impl Triangular {
    /// Create a triangular distribution
    ///
    /// Requires `0 <= min <= mode <= max`. `min == max` degenerates to a
    /// constant.
    pub fn new(min: f64, mode: f64, max: f64) -> Result<Self, SimError> {
        let finite = min.is_finite() && mode.is_finite() && max.is_finite();
        if !finite || min < 0.0 || min > mode || mode > max {
            return Err(SimError::InvalidDistributionParams {
                distribution: "triangular",
                reason: format!(
                    "requires 0 <= min <= mode <= max, got min={}, mode={}, max={}",
                    min, mode, max
                ),
            });
        }
        Ok(Self { min, mode, max })
    }
}

impl Distribution for Triangular {
    fn sample(&mut self, rng: &mut RandomSource) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            return self.min;
        }

        let u = rng.next_f64();
        let split = (self.mode - self.min) / range;

        if u < split {
            self.min + (u * range * (self.mode - self.min)).sqrt()
        } else {
            self.max - ((1.0 - u) * range * (self.max - self.mode)).sqrt()
        }
    }

    fn mean(&self) -> f64 {
        (self.min + self.mode + self.max) / 3.0
    }

    fn stddev(&self) -> f64 {
        let (a, b, c) = (self.min, self.mode, self.max);
        let var = (a * a + b * b + c * c - a * b - a * c - b * c) / 18.0;
        var.sqrt()
    }
}
