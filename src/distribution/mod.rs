//! Parametric sampling distributions
//!
//! This module provides the named distributions used for service times,
//! setup times, and inter-arrival times. Each distribution validates its
//! parameters at construction and samples non-negative durations from a
//! [`RandomSource`](crate::random::RandomSource).
//!
//! # Distributions
//!
//! - **Constant**: fixed duration
//! - **Uniform**: equal density on `[min, max)`
//! - **Exponential**: memoryless inter-arrival / service times
//! - **Normal**: Box-Muller, truncated at zero
//! - **Triangular**: min/mode/max via inverse CDF
//! - **PERT**: smoothed three-point estimate (Beta via gamma ratio)
//! - **Poisson**: integer counts, Knuth's product method
//! - **Discrete**: explicit probability table
//!
//! # Declarative specs
//!
//! Configuration carries a [`ProcessTimeConfig`], the serde-friendly
//! description of a distribution. `build()` validates it and returns the
//! boxed sampler, failing with `SimError::InvalidDistributionParams` on bad
//! parameters so the problem surfaces before any replication starts.

pub mod constant;
pub mod discrete;
pub mod exponential;
pub mod normal;
pub mod pert;
pub mod poisson;
pub mod triangular;
pub mod uniform;

use crate::error::SimError;
use crate::random::RandomSource;
use serde::{Deserialize, Serialize};

pub use constant::Constant;
pub use discrete::Discrete;
pub use exponential::Exponential;
pub use normal::Normal;
pub use pert::Pert;
pub use poisson::Poisson;
pub use triangular::Triangular;
pub use uniform::Uniform;

/// Sampling interface shared by all distributions
///
/// Implementations are `Send` so a built distribution can move into the
/// replication thread that owns it. Sampling takes the caller's RNG rather
/// than holding one, which keeps the whole replication on a single stream.
pub trait Distribution: Send + std::fmt::Debug {
    /// Draw one non-negative sample
    fn sample(&mut self, rng: &mut RandomSource) -> f64;

    /// Analytical mean
    fn mean(&self) -> f64;

    /// Analytical standard deviation
    fn stddev(&self) -> f64;
}

/// Distribution family selector for declarative specs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionName {
    Constant,
    Uniform,
    Exponential,
    Normal,
    Triangular,
    Pert,
    Poisson,
    Discrete,
}

impl DistributionName {
    /// Parse a header-normalized table cell ("Normal", "exponential", ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "constant" | "fixed" => Some(Self::Constant),
            "uniform" => Some(Self::Uniform),
            "exponential" | "exp" => Some(Self::Exponential),
            "normal" | "gaussian" => Some(Self::Normal),
            "triangular" => Some(Self::Triangular),
            "pert" => Some(Self::Pert),
            "poisson" => Some(Self::Poisson),
            "discrete" => Some(Self::Discrete),
            _ => None,
        }
    }
}

/// Declarative distribution spec as it appears in configuration
///
/// Only the fields relevant to the selected family are read; the validator
/// rejects specs whose required fields are missing or out of range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessTimeConfig {
    pub distribution: DistributionName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Events per time unit; accepted as `1/mean` for exponential and as
    /// lambda for poisson
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<f64>>,
    /// Outcome values paired with `probabilities`; defaults to the indices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
}

impl ProcessTimeConfig {
    /// Shorthand for a constant duration
    pub fn constant(value: f64) -> Self {
        Self {
            mean: Some(value),
            ..Self::named(DistributionName::Constant)
        }
    }

    /// Shorthand for an exponential with the given mean
    pub fn exponential(mean: f64) -> Self {
        Self {
            mean: Some(mean),
            ..Self::named(DistributionName::Exponential)
        }
    }

    /// Empty spec for the given family; fill the relevant fields
    pub fn named(distribution: DistributionName) -> Self {
        Self {
            distribution,
            mean: None,
            stddev: None,
            min: None,
            mode: None,
            max: None,
            rate: None,
            probabilities: None,
            values: None,
        }
    }

    /// Validate and construct the sampler this spec describes
    pub fn build(&self) -> Result<Box<dyn Distribution>, SimError> {
        let missing = |field: &str, distribution: &'static str| SimError::InvalidDistributionParams {
            distribution,
            reason: format!("missing required field '{}'", field),
        };

        match self.distribution {
            DistributionName::Constant => {
                let value = self.mean.ok_or_else(|| missing("mean", "constant"))?;
                Ok(Box::new(Constant::new(value)?))
            }
            DistributionName::Uniform => {
                let min = self.min.ok_or_else(|| missing("min", "uniform"))?;
                let max = self.max.ok_or_else(|| missing("max", "uniform"))?;
                Ok(Box::new(Uniform::new(min, max)?))
            }
            DistributionName::Exponential => {
                let mean = match (self.mean, self.rate) {
                    (Some(m), _) => m,
                    (None, Some(r)) if r > 0.0 => 1.0 / r,
                    _ => return Err(missing("mean (or rate)", "exponential")),
                };
                Ok(Box::new(Exponential::new(mean)?))
            }
            DistributionName::Normal => {
                let mean = self.mean.ok_or_else(|| missing("mean", "normal"))?;
                let stddev = self.stddev.ok_or_else(|| missing("stddev", "normal"))?;
                Ok(Box::new(Normal::new(mean, stddev)?))
            }
            DistributionName::Triangular => {
                let min = self.min.ok_or_else(|| missing("min", "triangular"))?;
                let mode = self.mode.ok_or_else(|| missing("mode", "triangular"))?;
                let max = self.max.ok_or_else(|| missing("max", "triangular"))?;
                Ok(Box::new(Triangular::new(min, mode, max)?))
            }
            DistributionName::Pert => {
                let min = self.min.ok_or_else(|| missing("min", "pert"))?;
                let mode = self.mode.ok_or_else(|| missing("mode", "pert"))?;
                let max = self.max.ok_or_else(|| missing("max", "pert"))?;
                Ok(Box::new(Pert::new(min, mode, max)?))
            }
            DistributionName::Poisson => {
                let lambda = self
                    .rate
                    .or(self.mean)
                    .ok_or_else(|| missing("rate (or mean)", "poisson"))?;
                Ok(Box::new(Poisson::new(lambda)?))
            }
            DistributionName::Discrete => {
                let probabilities = self
                    .probabilities
                    .clone()
                    .ok_or_else(|| missing("probabilities", "discrete"))?;
                Ok(Box::new(Discrete::new(probabilities, self.values.clone())?))
            }
        }
    }
}
