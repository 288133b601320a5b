//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LoadTestError, LoadTestResult};
use crate::sweep::SweepGrid;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_PROMPT: &str = "What does AI infrastructure mean?";
pub const DEFAULT_MODEL: &str = "meta-llama/Meta-Llama-3-8B-Instruct";
pub const DEFAULT_CONCURRENCY: u32 = 4;
pub const DEFAULT_TOTAL_REQUESTS: u64 = 40;
pub const DEFAULT_WARMUP_REQUESTS: u64 = 10;
pub const DEFAULT_MAX_TOKENS: u32 = 16;
pub const DEFAULT_CSV_PATH: &str = "results/loadtest_results.csv";

/// Settings for one measurement cell. Immutable while a phase runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTestConfig {
    pub target_url: String,
    pub payload: PayloadTemplate,
    pub concurrency: u32,
    pub total_requests: u64,
    pub warmup_requests: u64,
    pub max_tokens: u32,
    pub request_timeout_secs: f64,
}

impl LoadTestConfig {
    /// Validate configuration.
    pub fn validate(&self) -> LoadTestResult<()> {
        if self.concurrency == 0 {
            return Err(LoadTestError::config("concurrency must be > 0"));
        }
        if self.max_tokens == 0 {
            return Err(LoadTestError::config("max_tokens must be > 0"));
        }
        if !self.request_timeout_secs.is_finite() || self.request_timeout_secs <= 0.0 {
            return Err(LoadTestError::config(format!(
                "request timeout must be a positive number of seconds, got {}",
                self.request_timeout_secs
            )));
        }

        let url = reqwest::Url::parse(&self.target_url).map_err(|e| LoadTestError::InvalidUrl {
            url: self.target_url.clone(),
            message: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(LoadTestError::InvalidUrl {
                url: self.target_url.clone(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs)
    }

    /// Copy of this config retargeted at one sweep cell.
    pub fn for_cell(&self, concurrency: u32, max_tokens: u32) -> Self {
        Self {
            concurrency,
            max_tokens,
            ..self.clone()
        }
    }
}

/// Request body schema of the endpoint under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadTemplate {
    /// `{"prompt", "max_tokens"}`
    Prompt { prompt: String },
    /// OpenAI-style completions: `{"model", "prompt", "max_tokens", "temperature": 0}`
    Completion { model: String, prompt: String },
    /// `{"question", "max_tokens"}`
    Question { question: String },
}

impl PayloadTemplate {
    /// Build the JSON body for a request asking for `max_tokens` tokens.
    pub fn body(&self, max_tokens: u32) -> serde_json::Value {
        match self {
            PayloadTemplate::Prompt { prompt } => serde_json::json!({
                "prompt": prompt,
                "max_tokens": max_tokens,
            }),
            PayloadTemplate::Completion { model, prompt } => serde_json::json!({
                "model": model,
                "prompt": prompt,
                "max_tokens": max_tokens,
                "temperature": 0.0,
            }),
            PayloadTemplate::Question { question } => serde_json::json!({
                "question": question,
                "max_tokens": max_tokens,
            }),
        }
    }

    /// The prompt or question text.
    pub fn text(&self) -> &str {
        match self {
            PayloadTemplate::Prompt { prompt } | PayloadTemplate::Completion { prompt, .. } => {
                prompt
            }
            PayloadTemplate::Question { question } => question,
        }
    }

    /// Same schema with the text replaced.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        let text = text.into();
        match self {
            PayloadTemplate::Prompt { .. } => PayloadTemplate::Prompt { prompt: text },
            PayloadTemplate::Completion { model, .. } => PayloadTemplate::Completion {
                model: model.clone(),
                prompt: text,
            },
            PayloadTemplate::Question { .. } => PayloadTemplate::Question { question: text },
        }
    }
}

/// Known inference endpoint flavours and their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EndpointProfile {
    /// Plain `/infer` endpoint taking a prompt.
    #[default]
    Infer,
    /// OpenAI-compatible `/v1/completions`.
    Completions,
    /// Question-answering `/answer` endpoint.
    Answer,
}

impl EndpointProfile {
    pub fn default_path(&self) -> &'static str {
        match self {
            EndpointProfile::Infer => "/infer",
            EndpointProfile::Completions => "/v1/completions",
            EndpointProfile::Answer => "/answer",
        }
    }

    pub fn default_url(&self) -> String {
        format!("{}{}", DEFAULT_BASE_URL, self.default_path())
    }

    pub fn default_timeout_secs(&self) -> f64 {
        match self {
            EndpointProfile::Completions => 30.0,
            EndpointProfile::Infer | EndpointProfile::Answer => 120.0,
        }
    }

    pub fn payload_template(&self, text: &str, model: &str) -> PayloadTemplate {
        match self {
            EndpointProfile::Infer => PayloadTemplate::Prompt {
                prompt: text.to_string(),
            },
            EndpointProfile::Completions => PayloadTemplate::Completion {
                model: model.to_string(),
                prompt: text.to_string(),
            },
            EndpointProfile::Answer => PayloadTemplate::Question {
                question: text.to_string(),
            },
        }
    }

    /// Built-in sweep levels as `(concurrency_levels, token_levels)`.
    pub fn default_sweep(&self) -> (Vec<u32>, Vec<u32>) {
        match self {
            EndpointProfile::Completions => (
                vec![1, 2, 4, 8, 24, 32, 48, 56, 64],
                vec![16, 64, 256],
            ),
            EndpointProfile::Infer | EndpointProfile::Answer => (vec![1, 2, 4, 8], vec![16, 64]),
        }
    }
}

/// Partially specified run settings.
///
/// Loaded from a scenario YAML file and/or built from command line flags; layers
/// are combined with [`RunSettings::overlay`] and turned into a [`RunPlan`] by
/// [`RunSettings::resolve`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    pub name: Option<String>,
    pub description: Option<String>,
    pub profile: Option<EndpointProfile>,
    pub url: Option<String>,
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub payload: Option<PayloadTemplate>,
    pub concurrency: Option<u32>,
    pub total_requests: Option<u64>,
    pub warmup_requests: Option<u64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<f64>,
    pub sweep: Option<bool>,
    pub sweep_concurrency: Option<Vec<u32>>,
    pub sweep_tokens: Option<Vec<u32>>,
    pub csv: Option<PathBuf>,
}

/// Fully resolved run: base config, the grid to walk and where rows go.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub name: String,
    pub config: LoadTestConfig,
    pub grid: SweepGrid,
    pub csv_path: PathBuf,
}

impl RunSettings {
    /// Load settings from a scenario YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> LoadTestResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadTestError::ScenarioRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> LoadTestResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Combine two layers; values set in `top` win.
    pub fn overlay(self, top: RunSettings) -> RunSettings {
        RunSettings {
            name: top.name.or(self.name),
            description: top.description.or(self.description),
            profile: top.profile.or(self.profile),
            url: top.url.or(self.url),
            prompt: top.prompt.or(self.prompt),
            model: top.model.or(self.model),
            payload: top.payload.or(self.payload),
            concurrency: top.concurrency.or(self.concurrency),
            total_requests: top.total_requests.or(self.total_requests),
            warmup_requests: top.warmup_requests.or(self.warmup_requests),
            max_tokens: top.max_tokens.or(self.max_tokens),
            timeout_secs: top.timeout_secs.or(self.timeout_secs),
            sweep: top.sweep.or(self.sweep),
            sweep_concurrency: top.sweep_concurrency.or(self.sweep_concurrency),
            sweep_tokens: top.sweep_tokens.or(self.sweep_tokens),
            csv: top.csv.or(self.csv),
        }
    }

    /// Fill in defaults, build the grid and validate.
    pub fn resolve(self) -> LoadTestResult<RunPlan> {
        let profile = self.profile.unwrap_or_default();

        let mut payload = match self.payload {
            Some(payload) => payload,
            None => profile.payload_template(
                DEFAULT_PROMPT,
                self.model.as_deref().unwrap_or(DEFAULT_MODEL),
            ),
        };
        if let Some(prompt) = self.prompt {
            payload = payload.with_text(prompt);
        }

        let config = LoadTestConfig {
            target_url: self.url.unwrap_or_else(|| profile.default_url()),
            payload,
            concurrency: self.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            total_requests: self.total_requests.unwrap_or(DEFAULT_TOTAL_REQUESTS),
            warmup_requests: self.warmup_requests.unwrap_or(DEFAULT_WARMUP_REQUESTS),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            request_timeout_secs: self
                .timeout_secs
                .unwrap_or_else(|| profile.default_timeout_secs()),
        };

        // Sweeps ignore the single-value concurrency/max_tokens
        let grid = if self.sweep.unwrap_or(false) {
            let (default_conc, default_tokens) = profile.default_sweep();
            SweepGrid::new(
                &self.sweep_concurrency.unwrap_or(default_conc),
                &self.sweep_tokens.unwrap_or(default_tokens),
            )?
        } else {
            SweepGrid::single(config.concurrency, config.max_tokens)
        };

        // Every cell must be runnable before the first one starts
        for cell in grid.cells() {
            config.for_cell(cell.concurrency, cell.max_tokens).validate()?;
        }

        Ok(RunPlan {
            name: self.name.unwrap_or_else(|| format!("{:?}", profile).to_lowercase()),
            config,
            grid,
            csv_path: self.csv.unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_PATH)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> LoadTestConfig {
        LoadTestConfig {
            target_url: "http://localhost:8000/infer".to_string(),
            payload: PayloadTemplate::Prompt {
                prompt: "hi".to_string(),
            },
            concurrency: 4,
            total_requests: 40,
            warmup_requests: 10,
            max_tokens: 16,
            request_timeout_secs: 120.0,
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(base_config().validate().is_ok());

        let mut config = base_config();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.max_tokens = 0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.request_timeout_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.request_timeout_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.target_url = "ftp://localhost/infer".to_string();
        assert!(matches!(
            config.validate(),
            Err(LoadTestError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_zero_requests_is_valid() {
        let mut config = base_config();
        config.total_requests = 0;
        config.warmup_requests = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_completion_payload_is_deterministic() {
        let payload = EndpointProfile::Completions.payload_template("Hello", "opt-125m");
        let body = payload.body(64);
        assert_eq!(body["model"], "opt-125m");
        assert_eq!(body["prompt"], "Hello");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_question_payload_and_with_text() {
        let payload = EndpointProfile::Answer.payload_template("What is 1+1?", DEFAULT_MODEL);
        let body = payload.body(32);
        assert_eq!(body["question"], "What is 1+1?");
        assert_eq!(body["max_tokens"], 32);
        assert!(body.get("temperature").is_none());

        let swapped = payload.with_text("Why?");
        assert_eq!(swapped.text(), "Why?");
        assert!(matches!(swapped, PayloadTemplate::Question { .. }));
    }

    #[test]
    fn test_resolve_defaults() {
        let plan = RunSettings::default().resolve().unwrap();
        assert_eq!(plan.config.target_url, "http://localhost:8000/infer");
        assert_eq!(plan.config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(plan.config.total_requests, DEFAULT_TOTAL_REQUESTS);
        assert_eq!(plan.config.warmup_requests, DEFAULT_WARMUP_REQUESTS);
        assert_eq!(plan.config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(plan.config.payload.text(), DEFAULT_PROMPT);
        assert_eq!(plan.grid.len(), 1);
        assert_eq!(plan.csv_path, PathBuf::from(DEFAULT_CSV_PATH));
    }

    #[test]
    fn test_resolve_sweep_uses_profile_grid() {
        let settings = RunSettings {
            profile: Some(EndpointProfile::Completions),
            sweep: Some(true),
            ..Default::default()
        };
        let plan = settings.resolve().unwrap();
        assert_eq!(plan.grid.len(), 27);
        assert_eq!(plan.config.request_timeout_secs, 30.0);
        assert_eq!(plan.config.target_url, "http://localhost:8000/v1/completions");
    }

    #[test]
    fn test_overlay_prefers_top_layer() {
        let file = RunSettings::from_yaml(
            r#"
name: nightly
profile: answer
concurrency: 8
total_requests: 100
sweep_tokens: [32, 128]
"#,
        )
        .unwrap();
        let cli = RunSettings {
            concurrency: Some(2),
            ..Default::default()
        };

        let merged = file.overlay(cli);
        assert_eq!(merged.concurrency, Some(2));
        assert_eq!(merged.total_requests, Some(100));
        assert_eq!(merged.profile, Some(EndpointProfile::Answer));
        assert_eq!(merged.sweep_tokens, Some(vec![32, 128]));

        let plan = merged.resolve().unwrap();
        assert_eq!(plan.name, "nightly");
        assert!(matches!(plan.config.payload, PayloadTemplate::Question { .. }));
    }

    #[test]
    fn test_scenario_payload_and_unknown_fields() {
        let settings = RunSettings::from_yaml(
            r#"
url: http://gpu-01:8000/v1/completions
payload:
  type: completion
  model: facebook/opt-125m
  prompt: Hello AI infrastructure
"#,
        )
        .unwrap();
        let plan = settings.resolve().unwrap();
        assert_eq!(plan.config.payload.text(), "Hello AI infrastructure");

        assert!(RunSettings::from_yaml("concurency: 4").is_err());
    }

    #[test]
    fn test_resolve_rejects_zero_level_in_sweep() {
        let settings = RunSettings {
            sweep: Some(true),
            sweep_concurrency: Some(vec![1, 0]),
            ..Default::default()
        };
        assert!(settings.resolve().is_err());
    }
}
