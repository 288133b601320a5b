//! Load test CLI for HTTP inference endpoints.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use inference_load_test::{
    CsvResultSink, EndpointProfile, OutputFormat, RequestIssuer, RunSettings, SweepOrchestrator,
};

const PROBE_QUESTIONS: [&str; 3] = [
    "What does AI infrastructure mean?",
    "Explain what AI infrastructure means in one sentence.",
    "What is 1+1?",
];

#[derive(Parser)]
#[command(name = "inference-load-test")]
#[command(about = "Load testing tool for HTTP inference endpoints", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a few questions once each and print the responses
    Probe(ProbeArgs),
}

/// Where and how to reach the endpoint.
#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Scenario YAML file; flags override its values
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Endpoint URL (default depends on --profile)
    #[arg(long, env = "LOADTEST_URL")]
    url: Option<String>,

    /// Endpoint flavour, selects payload schema and defaults
    #[arg(long, value_enum)]
    profile: Option<EndpointProfile>,

    /// Model name for completion-style endpoints
    #[arg(long)]
    model: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Maximum in-flight requests
    #[arg(short, long)]
    concurrency: Option<u32>,

    /// Measured requests per cell
    #[arg(short, long)]
    total: Option<u64>,

    /// Unmeasured warm-up requests per cell
    #[arg(long)]
    warmup: Option<u64>,

    /// Requested tokens per completion
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Prompt text sent with every request
    #[arg(long)]
    prompt: Option<String>,

    /// Results file, one row appended per cell
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Run a sweep over concurrency/max_tokens instead of a single cell
    #[arg(long)]
    sweep: bool,

    /// Sweep concurrency levels (comma separated)
    #[arg(long, value_delimiter = ',')]
    sweep_concurrency: Option<Vec<u32>>,

    /// Sweep token levels (comma separated)
    #[arg(long, value_delimiter = ',')]
    sweep_tokens: Option<Vec<u32>>,

    /// Extra per-cell output
    #[arg(short, long, value_enum, default_value = "line")]
    output: OutputFormat,

    /// Do not call GET /health before the run
    #[arg(long)]
    skip_health_check: bool,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug, Clone)]
struct ProbeArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Question to send (repeatable)
    #[arg(short, long = "question")]
    questions: Vec<String>,

    /// Requested tokens per answer
    #[arg(long, default_value = "32")]
    max_tokens: u32,
}

impl TargetArgs {
    fn settings(&self) -> anyhow::Result<RunSettings> {
        let file = match self.scenario.as_deref() {
            Some(path) => load_scenario(path)?,
            None => RunSettings::default(),
        };
        Ok(file.overlay(RunSettings {
            url: self.url.clone(),
            profile: self.profile,
            model: self.model.clone(),
            timeout_secs: self.timeout,
            ..Default::default()
        }))
    }
}

impl RunArgs {
    fn settings(&self) -> anyhow::Result<RunSettings> {
        Ok(self.target.settings()?.overlay(RunSettings {
            prompt: self.prompt.clone(),
            concurrency: self.concurrency,
            total_requests: self.total,
            warmup_requests: self.warmup,
            max_tokens: self.max_tokens,
            sweep: self.sweep.then_some(true),
            sweep_concurrency: self.sweep_concurrency.clone(),
            sweep_tokens: self.sweep_tokens.clone(),
            csv: self.csv.clone(),
            ..Default::default()
        }))
    }
}

fn load_scenario(path: &Path) -> anyhow::Result<RunSettings> {
    println!("Loading scenario: {}", path.display());
    RunSettings::from_file(path).with_context(|| format!("loading scenario {}", path.display()))
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{}'", level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Some(Commands::Probe(args)) => probe(args).await,
        None => run(cli.run).await,
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let plan = args.settings()?.resolve()?;

    println!("✓ Configuration loaded successfully");
    println!("  Name: {}", plan.name);
    println!("  Target: {}", plan.config.target_url);
    println!("  Requests per cell: {} (+{} warmup)", plan.config.total_requests, plan.config.warmup_requests);
    println!("  Timeout: {}s", plan.config.request_timeout_secs);
    println!("  Cells: {}", plan.grid.len());
    println!("  Results: {}", plan.csv_path.display());
    println!();

    if !args.skip_health_check {
        let issuer = RequestIssuer::new(&plan.config)?;
        match issuer.health_check().await {
            Ok(()) => info!(url = %issuer.url(), "Health check passed"),
            Err(e) => warn!(url = %issuer.url(), error = %e, "Health check failed, continuing"),
        }
    }

    let mut sink = CsvResultSink::new(&plan.csv_path);
    let orchestrator = SweepOrchestrator::new(plan.config, plan.grid)
        .with_output(args.output)
        .with_progress(!args.no_progress);

    let summary = orchestrator.run(&mut sink).await?;

    println!();
    println!(
        "✓ {} cell(s) complete: {} successful, {} failed requests. Rows appended to {}",
        summary.cells,
        summary.successes,
        summary.errors,
        sink.path().display()
    );
    Ok(())
}

async fn probe(args: ProbeArgs) -> anyhow::Result<()> {
    let settings = args.target.settings()?;
    let settings = RunSettings {
        profile: settings.profile.or(Some(EndpointProfile::Answer)),
        max_tokens: Some(args.max_tokens),
        ..settings
    };
    let plan = settings.resolve()?;
    let issuer = RequestIssuer::new(&plan.config)?;

    let questions: Vec<String> = if args.questions.is_empty() {
        PROBE_QUESTIONS.iter().map(|q| q.to_string()).collect()
    } else {
        args.questions
    };

    println!("Probing {}", issuer.url());
    for question in &questions {
        match issuer.probe(question).await {
            Ok(response) => println!(
                "{} -> {} ({:.3}s)",
                question,
                response.body,
                response.latency.as_secs_f64()
            ),
            Err(e) => println!("{} -> error: {}", question, e),
        }
    }
    Ok(())
}
