//! Load testing framework for HTTP inference endpoints.
//!
//! This crate provides tools to:
//! - Issue a fixed number of requests at a bounded concurrency level
//! - Separate an unmeasured warm-up phase from the measurement phase
//! - Reduce latencies to nearest-rank percentiles and throughput
//! - Sweep a (max_tokens x concurrency) grid, appending one CSV row per cell

pub mod config;
pub mod error;
pub mod gate;
pub mod issuer;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod sink;
pub mod sweep;

pub use config::{EndpointProfile, LoadTestConfig, PayloadTemplate, RunPlan, RunSettings};
pub use error::{LoadTestError, LoadTestResult};
pub use gate::{ConcurrencyGate, GatePermit};
pub use issuer::{FailureKind, Outcome, ProbeResponse, RequestIssuer};
pub use metrics::{aggregate, percentile, RunResult, SampleCollector};
pub use report::{OutputFormat, ResultsReport};
pub use runner::{PhaseOutput, PhaseRunner};
pub use sink::{CsvResultSink, MemorySink, ResultSink, CSV_HEADER};
pub use sweep::{SweepCell, SweepGrid, SweepOrchestrator, SweepSummary};
