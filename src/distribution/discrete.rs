//! Discrete distribution
//!
//! Explicit probability table sampled by inverse CDF over the cumulative
//! weights. Outcomes default to the probability indices; a parallel `values`
//! vector maps them onto arbitrary non-negative durations.

use super::Distribution;
use crate::error::SimError;
use crate::random::RandomSource;

/// Tolerated deviation of the probability sum from 1 before rejecting
const SUM_TOLERANCE: f64 = 1e-6;

/// Discrete distribution over an explicit outcome table
#[derive(Debug, Clone)]
pub struct Discrete {
    cumulative: Vec<f64>,
    values: Vec<f64>,
    mean: f64,
    stddev: f64,
}

impl Discrete {
    /// Create a discrete distribution
    ///
    /// Probabilities must be non-negative and sum to 1 within `1e-6`; sums
    /// inside the tolerance are normalized, anything further off is
    /// rejected. `values`, when given, must pair one non-negative outcome
    /// with each probability.
    pub fn new(probabilities: Vec<f64>, values: Option<Vec<f64>>) -> Result<Self, SimError> {
        let invalid = |reason: String| SimError::InvalidDistributionParams {
            distribution: "discrete",
            reason,
        };

        if probabilities.is_empty() {
            return Err(invalid("probabilities must be non-empty".to_string()));
        }
        if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(invalid(format!(
                "probabilities must be finite and >= 0, got {:?}",
                probabilities
            )));
        }

        let sum: f64 = probabilities.iter().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(invalid(format!("probabilities sum to {}, expected 1", sum)));
        }

        let values = match values {
            Some(v) => {
                if v.len() != probabilities.len() {
                    return Err(invalid(format!(
                        "{} values for {} probabilities",
                        v.len(),
                        probabilities.len()
                    )));
                }
                if v.iter().any(|x| !x.is_finite() || *x < 0.0) {
                    return Err(invalid("values must be finite and >= 0".to_string()));
                }
                v
            }
            None => (0..probabilities.len()).map(|i| i as f64).collect(),
        };

        let mut cumulative = Vec::with_capacity(probabilities.len());
        let mut acc = 0.0;
        for p in &probabilities {
            acc += p / sum;
            cumulative.push(acc);
        }
        // Guard the final bucket against rounding
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        let mean: f64 = probabilities
            .iter()
            .zip(&values)
            .map(|(p, v)| p / sum * v)
            .sum();
        let second: f64 = probabilities
            .iter()
            .zip(&values)
            .map(|(p, v)| p / sum * v * v)
            .sum();
        let stddev = (second - mean * mean).max(0.0).sqrt();

        Ok(Self {
            cumulative,
            values,
            mean,
            stddev,
        })
    }
}

impl Distribution for Discrete {
    fn sample(&mut self, rng: &mut RandomSource) -> f64 {
        let u = rng.next_f64();
        let idx = self
            .cumulative
            .iter()
            .position(|c| u < *c)
            .unwrap_or(self.cumulative.len() - 1);
        self.values[idx]
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn stddev(&self) -> f64 {
        self.stddev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::tests::assert_sample_mean;

    #[test]
    fn test_discrete_samples_from_table() {
        let mut dist = Discrete::new(vec![0.5, 0.5], Some(vec![2.0, 8.0])).unwrap();
        let mut rng = RandomSource::new(42);

        for _ in 0..1000 {
            let x = dist.sample(&mut rng);
            assert!(x == 2.0 || x == 8.0);
        }
    }

    #[test]
    fn test_discrete_default_values_are_indices() {
        let mut dist = Discrete::new(vec![0.2, 0.3, 0.5], None).unwrap();
        let mut rng = RandomSource::new(7);

        for _ in 0..1000 {
            let x = dist.sample(&mut rng);
            assert!(x == 0.0 || x == 1.0 || x == 2.0);
        }
    }

    #[test]
    fn test_discrete_sample_mean() {
        let mut dist = Discrete::new(vec![0.25, 0.25, 0.5], Some(vec![1.0, 3.0, 6.0])).unwrap();
        assert!((dist.mean() - 4.0).abs() < 1e-12);
        assert_sample_mean(&mut dist, 31);
    }

    #[test]
    fn test_discrete_proportions() {
        let mut dist = Discrete::new(vec![0.1, 0.9], Some(vec![0.0, 1.0])).unwrap();
        let mut rng = RandomSource::new(55);

        let n = 100_000;
        let ones = (0..n).filter(|_| dist.sample(&mut rng) == 1.0).count();
        let frac = ones as f64 / n as f64;
        assert!((frac - 0.9).abs() < 0.01, "fraction {}", frac);
    }

    #[test]
    fn test_discrete_normalizes_tiny_deviation() {
        // Sum = 1 + 5e-7, inside the tolerance
        let dist = Discrete::new(vec![0.5, 0.5 + 5e-7], None).unwrap();
        assert!((dist.cumulative.last().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_discrete_rejects_bad_sum() {
        assert!(Discrete::new(vec![0.5, 0.4], None).is_err());
        assert!(Discrete::new(vec![0.7, 0.7], None).is_err());
    }

    #[test]
    fn test_discrete_rejects_bad_inputs() {
        assert!(Discrete::new(vec![], None).is_err());
        assert!(Discrete::new(vec![-0.1, 1.1], None).is_err());
        assert!(Discrete::new(vec![0.5, 0.5], Some(vec![1.0])).is_err());
        assert!(Discrete::new(vec![0.5, 0.5], Some(vec![1.0, -2.0])).is_err());
    }
}
