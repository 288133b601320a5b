//! Error types for the load test harness.
//!
//! Only configuration and result-persistence problems surface here. Failures of
//! individual request attempts are counted, not raised (see [`crate::issuer::Outcome`]).

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using LoadTestError.
pub type LoadTestResult<T> = Result<T, LoadTestError>;

/// Primary error type for load test operations.
#[derive(Debug, Error)]
pub enum LoadTestError {
    // === Configuration Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid target URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Failed to read scenario file {path}: {source}")]
    ScenarioRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scenario file: {0}")]
    ScenarioParse(#[from] serde_yaml::Error),

    // === HTTP Client Errors ===
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    // === Output Errors ===
    #[error("Failed to serialize report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("Failed to prepare results file {path}: {source}")]
    SinkIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write result row to {path}: {source}")]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl LoadTestError {
    /// Shorthand for configuration validation failures.
    pub fn config(message: impl Into<String>) -> Self {
        LoadTestError::InvalidConfig(message.into())
    }

    /// Whether this error came from the result sink.
    pub fn is_sink_error(&self) -> bool {
        matches!(
            self,
            LoadTestError::SinkIo { .. } | LoadTestError::SinkWrite { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_error_classification() {
        let err = LoadTestError::SinkIo {
            path: PathBuf::from("/nope/results.csv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.is_sink_error());
        assert!(err.to_string().contains("/nope/results.csv"));

        assert!(!LoadTestError::config("concurrency must be > 0").is_sink_error());
    }
}
