//! Common test fixtures for load test tests.

/// Latency sample sets, in seconds.
pub mod latencies {
    /// Eleven distinct-ish latencies with one duplicate and one outlier.
    pub const MIXED: [f64; 11] = [0.31, 0.12, 0.95, 0.40, 0.12, 0.77, 0.05, 0.58, 0.26, 1.40, 0.33];

    /// `count` values spaced 10ms apart starting at 10ms, already sorted.
    pub fn linear_ms(count: usize) -> Vec<f64> {
        (1..=count).map(|i| i as f64 * 0.010).collect()
    }
}

/// Sweep levels used by the original smoke runs.
pub mod grids {
    pub const SMALL_CONCURRENCY: [u32; 2] = [1, 2];
    pub const SMALL_TOKENS: [u32; 2] = [16, 64];
    pub const GATE_LEVELS: [u32; 4] = [1, 2, 4, 8];
}

/// Questions used for probe tests.
pub mod questions {
    pub const SIMPLE: &str = "What is 1+1?";
    pub const INFRA: &str = "What does AI infrastructure mean?";
}
