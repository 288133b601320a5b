//! Shared test utilities for the inference-load-test workspace.
//!
//! This crate provides common testing infrastructure including:
//! - An in-process stub inference backend with delay and failure injection
//! - Common test fixtures (latency sets, sweep levels, probe questions)
//! - Approximate float assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{StubBackend, StubConfig, assert_approx_eq};
//! ```

pub mod fixtures;
pub mod stub;

// Re-export commonly used items at the crate root
pub use stub::{StubBackend, StubConfig};

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro asserting that a value lies in an inclusive range.
///
/// Wall clock based checks use this instead of exact comparisons.
///
/// ```ignore
/// use test_utils::assert_between;
///
/// assert_between!(0.52, 0.45, 1.5);
/// ```
#[macro_export]
macro_rules! assert_between {
    ($value:expr, $low:expr, $high:expr) => {{
        let value: f64 = $value as f64;
        let low: f64 = $low as f64;
        let high: f64 = $high as f64;
        if !(value >= low && value <= high) {
            panic!(
                "assertion failed: `{:?}` not in [{:?}, {:?}]",
                value, low, high
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_rejects_nan() {
        assert_approx_eq!(f64::NAN, 1.0, 0.001);
    }

    #[test]
    fn test_assert_between() {
        assert_between!(0.5, 0.45, 1.5);
        assert_between!(2, 2, 2);
    }
}
