//! Sample collection and statistics.

use serde::{Deserialize, Serialize};

use crate::issuer::Outcome;

/// Collects outcomes of a measurement phase.
#[derive(Debug, Clone, Default)]
pub struct SampleCollector {
    latencies: Vec<f64>,
    errors: u64,
}

impl SampleCollector {
    /// Create a new sample collector.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            latencies: Vec::with_capacity(capacity),
            errors: 0,
        }
    }

    /// Record one attempt outcome.
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome.latency_secs() {
            Some(latency) => self.record_success(latency),
            None => self.record_failure(),
        }
    }

    /// Record a successful request.
    pub fn record_success(&mut self, latency_secs: f64) {
        self.latencies.push(latency_secs);
    }

    /// Record a failed request.
    pub fn record_failure(&mut self) {
        self.errors += 1;
    }

    pub fn successes(&self) -> usize {
        self.latencies.len()
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Attempts recorded so far (successes + errors).
    pub fn attempts(&self) -> u64 {
        self.latencies.len() as u64 + self.errors
    }

    /// Consume the collector, returning `(latencies, errors)`.
    pub fn into_parts(self) -> (Vec<f64>, u64) {
        (self.latencies, self.errors)
    }
}

/// Statistics for one (concurrency, max_tokens) cell.
///
/// Field order is the column order of the results file and must not change.
/// Latencies are in seconds. Undefined statistics are `NaN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub concurrency: u32,
    pub max_tokens: u32,
    /// Successful measurement-phase samples.
    pub n: u64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
    pub mean: f64,
    /// Measurement-phase wall clock duration.
    #[serde(rename = "wall_sec")]
    pub wall_secs: f64,
    #[serde(rename = "rps")]
    pub requests_per_second: f64,
    /// Assumes every success produced exactly `max_tokens` tokens.
    #[serde(rename = "tok_per_sec")]
    pub tokens_per_second: f64,
    pub errors: u64,
}

impl RunResult {
    /// Attempts that were dispatched in the measurement phase.
    pub fn attempts(&self) -> u64 {
        self.n + self.errors
    }
}

/// Nearest-rank percentile of an ascending `sorted` slice, `p` in `[0, 1]`.
///
/// The rank is `round(p * (n - 1))` (ties away from zero) clamped to the slice,
/// so the result is always one of the observed values. Empty input gives `NaN`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let last = sorted.len() - 1;
    let rank = (p * last as f64).round();
    let index = if rank.is_nan() || rank <= 0.0 {
        0
    } else if rank >= last as f64 {
        last
    } else {
        rank as usize
    };
    sorted[index]
}

/// Reduce successful latencies of one phase to a [`RunResult`].
///
/// Pure and independent of the order of `latencies`.
pub fn aggregate(
    latencies: &[f64],
    errors: u64,
    wall_secs: f64,
    concurrency: u32,
    max_tokens: u32,
) -> RunResult {
    let mut sorted = latencies.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    // Summed in sorted order so the result does not depend on input order
    let mean = if n == 0 {
        f64::NAN
    } else {
        sorted.iter().sum::<f64>() / n as f64
    };

    let (requests_per_second, tokens_per_second) = if wall_secs > 0.0 {
        (
            n as f64 / wall_secs,
            (n as f64 * max_tokens as f64) / wall_secs,
        )
    } else {
        (f64::NAN, f64::NAN)
    };

    RunResult {
        concurrency,
        max_tokens,
        n: n as u64,
        p50: percentile(&sorted, 0.50),
        p95: percentile(&sorted, 0.95),
        p99: percentile(&sorted, 0.99),
        p999: percentile(&sorted, 0.999),
        mean,
        wall_secs,
        requests_per_second,
        tokens_per_second,
        errors,
    }
}
