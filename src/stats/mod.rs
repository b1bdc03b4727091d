//! Statistics collection
//!
//! Two collector kinds cover everything the engine measures, both gated by
//! a configurable warm-up time so the transient start of a replication does
//! not pollute steady-state metrics:
//!
//! - [`TimeWeighted`] integrates piecewise-constant signals over simulated
//!   time (utilization, queue length, WIP).
//! - [`Observations`] stores discrete per-entity measurements (cycle time,
//!   wait time) and derives order statistics and confidence half-widths.
//!
//! Both reset between replications. Cross-replication aggregation lives in
//! [`aggregator`].

pub mod aggregator;

/// Two-sided 95% Student's t critical values from a small internal table
///
/// Exact values for tiny samples, the normal approximation beyond 30
/// degrees of freedom.
pub fn t_value_95(df: usize) -> f64 {
    match df {
        0 => f64::NAN,
        1..=5 => 2.571,
        6..=10 => 2.228,
        11..=20 => 2.086,
        21..=30 => 2.042,
        _ => 1.960,
    }
}

/// Time-weighted accumulator for piecewise-constant signals
///
/// Tracks the last value and timestamp and accumulates `value * dt` area.
/// Updates before the warm-up boundary only move the held value; area
/// accrues from the warm-up time onward. The mean over `[warmup, now]` is
/// `area / (now - warmup)` with the held value extended to `now`.
#[derive(Debug, Clone)]
pub struct TimeWeighted {
    warmup: f64,
    last_time: f64,
    last_value: f64,
    area: f64,
}

impl TimeWeighted {
    /// Create a collector that starts integrating at `warmup`
    pub fn new(warmup: f64) -> Self {
        Self {
            warmup,
            last_time: warmup,
            last_value: 0.0,
            area: 0.0,
        }
    }

    /// Record that the signal changed to `value` at `time`
    ///
    /// The interval since the previous update is accounted at the previous
    /// value. Pre-warm-up updates set the value that will be held at the
    /// warm-up boundary.
    pub fn update(&mut self, time: f64, value: f64) {
        if time <= self.warmup {
            self.last_value = value;
            return;
        }

        let from = self.last_time.max(self.warmup);
        self.area += self.last_value * (time - from);
        self.last_time = time;
        self.last_value = value;
    }

    /// The value currently held
    pub fn current(&self) -> f64 {
        self.last_value
    }

    /// Time-weighted mean over `[warmup, now]`
    ///
    /// The held value is extended through `now` without mutating state.
    pub fn mean(&self, now: f64) -> f64 {
        let elapsed = now - self.warmup;
        if elapsed <= 0.0 {
            return 0.0;
        }

        let from = self.last_time.max(self.warmup);
        let pending = if now > from {
            self.last_value * (now - from)
        } else {
            0.0
        };
        (self.area + pending) / elapsed
    }

    /// Close the integration interval at `now`, holding the current value
    pub fn finalize(&mut self, now: f64) {
        let value = self.last_value;
        self.update(now, value);
    }

    /// Clear all state for the next replication
    pub fn reset(&mut self, warmup: f64) {
        *self = TimeWeighted::new(warmup);
    }
}

/// Observation series for discrete per-entity measurements
///
/// Samples recorded before the warm-up time are dropped. Percentiles use a
/// sorted copy with linear interpolation; the 95% confidence half-width
/// uses the internal t-table with `n - 1` degrees of freedom.
#[derive(Debug, Clone)]
pub struct Observations {
    warmup: f64,
    samples: Vec<f64>,
}

impl Observations {
    pub fn new(warmup: f64) -> Self {
        Self {
            warmup,
            samples: Vec::new(),
        }
    }

    /// Record `value` observed at simulated `time`; pre-warm-up drops
    pub fn record(&mut self, time: f64, value: f64) {
        if time >= self.warmup {
            self.samples.push(value);
        }
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Population standard deviation (divisor N)
    pub fn stddev_population(&self) -> f64 {
        let n = self.samples.len();
        if n == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let ss: f64 = self.samples.iter().map(|x| (x - mean).powi(2)).sum();
        (ss / n as f64).sqrt()
    }

    /// Sample standard deviation (divisor N - 1)
    pub fn stddev_sample(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let ss: f64 = self.samples.iter().map(|x| (x - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    }

    pub fn min(&self) -> f64 {
        self.samples.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.samples
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Percentile in `[0, 100]` via sorted copy with linear interpolation
    pub fn percentile(&self, p: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        if lo == hi {
            sorted[lo]
        } else {
            let frac = rank - lo as f64;
            sorted[lo] * (1.0 - frac) + sorted[hi] * frac
        }
    }

    /// 95% confidence half-width: `t(0.95, n-1) * s / sqrt(n)`
    pub fn half_width_95(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        t_value_95(n - 1) * self.stddev_sample() / (n as f64).sqrt()
    }

    /// Clear all samples for the next replication
    pub fn reset(&mut self, warmup: f64) {
        self.warmup = warmup;
        self.samples.clear();
    }
}
