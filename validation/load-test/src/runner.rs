//! Warm-up and measurement phase execution with controlled concurrency.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::LoadTestConfig;
use crate::error::LoadTestResult;
use crate::gate::ConcurrencyGate;
use crate::issuer::{Outcome, RequestIssuer};
use crate::metrics::{aggregate, RunResult, SampleCollector};

/// What a measurement phase produced.
#[derive(Debug, Clone)]
pub struct PhaseOutput {
    /// Latencies (seconds) of successful attempts, in completion order.
    pub latencies: Vec<f64>,
    pub errors: u64,
    /// Wall clock from first dispatch to last completion.
    pub wall: Duration,
}

impl PhaseOutput {
    pub fn attempts(&self) -> u64 {
        self.latencies.len() as u64 + self.errors
    }

    /// Reduce to statistics for the given cell.
    pub fn aggregate(&self, concurrency: u32, max_tokens: u32) -> RunResult {
        aggregate(
            &self.latencies,
            self.errors,
            self.wall.as_secs_f64(),
            concurrency,
            max_tokens,
        )
    }
}

/// Runs the warm-up and measurement phases for one config.
///
/// Every attempt of a phase is spawned up front and waits on the shared
/// [`ConcurrencyGate`]; outcomes are funnelled back to this runner, which is the
/// only place samples are accumulated.
pub struct PhaseRunner {
    config: LoadTestConfig,
    issuer: Arc<RequestIssuer>,
    gate: ConcurrencyGate,
    show_progress: bool,
}

impl PhaseRunner {
    /// Create a runner. Fails if the config is invalid or the HTTP client cannot be built.
    pub fn new(config: LoadTestConfig) -> LoadTestResult<Self> {
        config.validate()?;
        let issuer = Arc::new(RequestIssuer::new(&config)?);
        let gate = ConcurrencyGate::new(config.concurrency as usize);

        Ok(Self {
            config,
            issuer,
            gate,
            show_progress: false,
        })
    }

    /// Draw a progress bar on stderr while phases run.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &LoadTestConfig {
        &self.config
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Run warm-up (discarded) then measurement.
    pub async fn run(&self) -> PhaseOutput {
        if self.config.warmup_requests > 0 {
            info!(
                requests = self.config.warmup_requests,
                concurrency = self.config.concurrency,
                "Starting warmup phase"
            );
            let warmup = self.dispatch(self.config.warmup_requests, "Warmup").await;
            info!(errors = warmup.errors(), "Warmup complete");
            // Warmup samples are dropped here and never reach aggregation
        }

        info!(
            requests = self.config.total_requests,
            concurrency = self.config.concurrency,
            max_tokens = self.config.max_tokens,
            "Starting measurement phase"
        );
        let start = Instant::now();
        let collector = self.dispatch(self.config.total_requests, "Measure").await;
        let wall = start.elapsed();

        let (latencies, errors) = collector.into_parts();
        info!(
            successes = latencies.len(),
            errors,
            wall_secs = wall.as_secs_f64(),
            "Measurement complete"
        );

        PhaseOutput {
            latencies,
            errors,
            wall,
        }
    }

    /// Start `count` attempts at once and wait for all of them.
    async fn dispatch(&self, count: u64, label: &'static str) -> SampleCollector {
        let pb = self.progress_bar(count, label);
        let mut attempts = JoinSet::new();

        for _ in 0..count {
            let gate = self.gate.clone();
            let issuer = self.issuer.clone();
            attempts.spawn(async move {
                let _permit = gate.acquire().await;
                issuer.issue().await
            });
        }

        let mut collector = SampleCollector::with_capacity(count as usize);
        while let Some(joined) = attempts.join_next().await {
            match joined {
                Ok(outcome) => {
                    if let Outcome::Failure(ref kind) = outcome {
                        pb.set_message(format!("last error: {}", kind));
                    }
                    collector.record(&outcome);
                }
                Err(e) => {
                    warn!(error = %e, "Request task aborted");
                    collector.record_failure();
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        collector
    }

    fn progress_bar(&self, count: u64, label: &'static str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(count);
        match ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            Ok(style) => pb.set_style(style.progress_chars("##-")),
            Err(e) => warn!(error = %e, "Invalid progress bar template"),
        }
        pb.set_prefix(format!("{} c={}", label, self.config.concurrency));
        pb
    }
}
