//! Normal distribution, truncated at zero
//!
//! Uses the Box-Muller transform with spare-value caching. Service times
//! must be non-negative, so samples are clamped to zero rather than
//! rejected or negated; with `mean >> stddev` the truncation is negligible,
//! which is the intended operating range for process times.

use super::Distribution;
use crate::error::SimError;
use crate::random::RandomSource;
use std::f64::consts::PI;

/// Normal distribution `N(mean, stddev)`, clamped at zero on sampling
#[derive(Debug, Clone, Copy)]
pub struct Normal {
    mean: f64,
    stddev: f64,

    /// Cached spare value from the Box-Muller transform
    spare: Option<f64>,
}

impl Normal {
    /// Create a normal distribution
    ///
    /// Requires `stddev >= 0`. A zero stddev degenerates to a clamped
    /// constant.
    pub fn new(mean: f64, stddev: f64) -> Result<Self, SimError> {
        if !mean.is_finite() || !stddev.is_finite() || stddev < 0.0 {
            return Err(SimError::InvalidDistributionParams {
                distribution: "normal",
                reason: format!("requires finite mean and stddev >= 0, got mean={}, stddev={}", mean, stddev),
            });
        }
        Ok(Self {
            mean,
            stddev,
            spare: None,
        })
    }

    /// Generate a standard normal variate, caching the Box-Muller spare
    fn next_standard(&mut self, rng: &mut RandomSource) -> f64 {
        if let Some(spare) = self.spare.take() {
            return spare;
        }

        let (z0, z1) = box_muller(rng);
        self.spare = Some(z1);
        z0
    }
}

impl Distribution for Normal {
    fn sample(&mut self, rng: &mut RandomSource) -> f64 {
        let z = self.next_standard(rng);
        (self.mean + z * self.stddev).max(0.0)
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn stddev(&self) -> f64 {
        self.stddev
    }
}

/// One Box-Muller step: two independent `N(0, 1)` variates from two uniforms
pub(crate) fn box_muller(rng: &mut RandomSource) -> (f64, f64) {
    // 1 - U keeps the log argument in (0, 1]
    let u1 = 1.0 - rng.next_f64();
    let u2 = rng.next_f64();

    let r = (-2.0 * u1.ln()).sqrt();
    let theta = 2.0 * PI * u2;

    (r * theta.cos(), r * theta.sin())
}

/// Standalone standard normal draw (no spare caching)
///
/// Used by samplers that need normal variates internally, like the
/// Marsaglia-Tsang gamma generator.
pub(crate) fn standard_normal(rng: &mut RandomSource) -> f64 {
    box_muller(rng).0
}
