//! PERT distribution
//!
//! Smoothed three-point estimate. The relative mode
//! `u = (mode - min) / (max - min)` parameterizes a Beta with
//! `alpha = 1 + 4u`, `beta = 1 + 4(1 - u)`, scaled back onto `[min, max]`.
//! The Beta variate is a gamma ratio `X / (X + Y)`; gammas come from the
//! Marsaglia-Tsang squeeze method.

use super::normal::standard_normal;
use super::Distribution;
use crate::error::SimError;
use crate::random::RandomSource;

/// PERT distribution on `[min, max]` with most-likely value `mode`
#[derive(Debug, Clone, Copy)]
pub struct Pert {
    min: f64,
    mode: f64,
    max: f64,
    alpha: f64,
    beta: f64,
}

impl Pert {
    /// Create a PERT distribution
    ///
    /// Requires `0 <= min <= mode <= max`. `min == max` degenerates to a
    /// constant.
    pub fn new(min: f64, mode: f64, max: f64) -> Result<Self, SimError> {
        let finite = min.is_finite() && mode.is_finite() && max.is_finite();
        if !finite || min < 0.0 || min > mode || mode > max {
            return Err(SimError::InvalidDistributionParams {
                distribution: "pert",
                reason: format!(
                    "requires 0 <= min <= mode <= max, got min={}, mode={}, max={}",
                    min, mode, max
                ),
            });
        }

        let range = max - min;
        let u = if range == 0.0 { 0.5 } else { (mode - min) / range };
        Ok(Self {
            min,
            mode,
            max,
            alpha: 1.0 + 4.0 * u,
            beta: 1.0 + 4.0 * (1.0 - u),
        })
    }
}

impl Distribution for Pert {
    fn sample(&mut self, rng: &mut RandomSource) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            return self.min;
        }

        let x = sample_gamma(self.alpha, rng);
        let y = sample_gamma(self.beta, rng);
        self.min + range * (x / (x + y))
    }

    fn mean(&self) -> f64 {
        (self.min + 4.0 * self.mode + self.max) / 6.0
    }

    fn stddev(&self) -> f64 {
        // Var = (mean - min)(max - mean) / 7
        let m = self.mean();
        (((m - self.min) * (self.max - m)) / 7.0).sqrt()
    }
}

/// Gamma(shape, 1) via Marsaglia-Tsang
///
/// For `shape < 1` the standard boost applies:
/// `Gamma(a) = Gamma(a + 1) * U^(1/a)`.
pub(crate) fn sample_gamma(shape: f64, rng: &mut RandomSource) -> f64 {
    if shape < 1.0 {
        let boost = rng.next_f64().powf(1.0 / shape);
        return sample_gamma(shape + 1.0, rng) * boost;
    }

    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();

    loop {
        let z = standard_normal(rng);
        let v = (1.0 + c * z).powi(3);
        if v <= 0.0 {
            continue;
        }

        let u = rng.next_f64();
        // Cheap squeeze first, exact log check second
        if u < 1.0 - 0.0331 * z.powi(4) {
            return d * v;
        }
        if u.ln() < 0.5 * z * z + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}
