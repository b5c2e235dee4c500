//! Application configuration for contentgen.
//!
//! User config lives at `~/.contentgen/contentgen.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ContentGenError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contentgen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contentgen";

// ---------------------------------------------------------------------------
// Config structs (matching contentgen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub stages: StagesConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Reject values that would leave the job manager or a backend unusable.
    pub fn validate(&self) -> Result<()> {
        if self.jobs.capacity == 0 {
            return Err(ContentGenError::config("jobs.capacity must be at least 1"));
        }
        if self.jobs.max_concurrent == 0 {
            return Err(ContentGenError::config("jobs.max_concurrent must be at least 1"));
        }
        if self.generation.max_in_flight == 0 {
            return Err(ContentGenError::config(
                "generation.max_in_flight must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Which generation backend content stages talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Deterministic rule-based content, no network.
    #[default]
    Rules,
    OpenRouter,
    Ollama,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rules => "rules",
            Self::OpenRouter => "openrouter",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = ContentGenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rules" => Ok(Self::Rules),
            "openrouter" => Ok(Self::OpenRouter),
            "ollama" => Ok(Self::Ollama),
            other => Err(ContentGenError::config(format!(
                "unknown provider '{other}': expected 'rules', 'openrouter', or 'ollama'"
            ))),
        }
    }
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub provider: Provider,

    /// Model override. Empty means the provider section's default model.
    #[serde(default)]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Concurrent calls allowed per cached backend handle.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Minimum spacing between call starts on one backend handle.
    #[serde(default)]
    pub min_interval_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: String::new(),
            temperature: default_temperature(),
            max_in_flight: default_max_in_flight(),
            min_interval_ms: 0,
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_in_flight() -> usize {
    1
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openrouter_url")]
    pub base_url: String,

    #[serde(default = "default_openrouter_model")]
    pub default_model: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_openrouter_url(),
            default_model: default_openrouter_model(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_openrouter_model() -> String {
    "google/gemini-2.0-flash-001".into()
}

/// `[ollama]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_ollama_model")]
    pub default_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            default_model: default_ollama_model(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".into()
}
fn default_ollama_model() -> String {
    "llama3.2".into()
}

/// Backoff shape between retry attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries beyond the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub backoff: BackoffKind,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Ceiling for exponential backoff.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff: BackoffKind::default(),
            delay_ms: default_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}
fn default_delay_ms() -> u64 {
    15_000
}
fn default_max_delay_ms() -> u64 {
    120_000
}

/// `[stages]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesConfig {
    /// Budget for one attempt of one stage.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

/// `[validation]` section.
///
/// The `rules` provider writes a fixed set of 15 questions and only answers
/// the ones its facts cover, so raising these minimums above what it emits
/// makes rules runs degrade those stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_questions")]
    pub min_questions: usize,

    #[serde(default = "default_min_faqs")]
    pub min_faqs: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_questions: default_min_questions(),
            min_faqs: default_min_faqs(),
        }
    }
}

fn default_min_questions() -> usize {
    15
}
fn default_min_faqs() -> usize {
    5
}

/// `[jobs]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Records kept before the oldest are evicted.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Pipelines allowed to execute at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_capacity() -> usize {
    100
}
fn default_max_concurrent() -> usize {
    2
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "output".into()
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub provider: Provider,
    /// Resolved model id (empty for the rules provider).
    pub model: String,
    pub temperature: f32,
    pub max_retries: u32,
    pub backoff: BackoffKind,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub stage_timeout: Duration,
    pub min_questions: usize,
    pub min_faqs: usize,
}

impl PipelineConfig {
    /// Re-resolve the model after a provider override.
    pub fn with_provider(mut self, provider: Provider, config: &AppConfig) -> Self {
        self.provider = provider;
        self.model = resolve_model(provider, config);
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            provider: config.generation.provider,
            model: resolve_model(config.generation.provider, config),
            temperature: config.generation.temperature,
            max_retries: config.retry.max_retries,
            backoff: config.retry.backoff,
            retry_delay: Duration::from_millis(config.retry.delay_ms),
            max_retry_delay: Duration::from_millis(config.retry.max_delay_ms),
            stage_timeout: Duration::from_secs(config.stages.timeout_secs),
            min_questions: config.validation.min_questions,
            min_faqs: config.validation.min_faqs,
        }
    }
}

fn resolve_model(provider: Provider, config: &AppConfig) -> String {
    if !config.generation.model.is_empty() {
        return config.generation.model.clone();
    }
    match provider {
        Provider::Rules => String::new(),
        Provider::OpenRouter => config.openrouter.default_model.clone(),
        Provider::Ollama => config.ollama.default_model.clone(),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contentgen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContentGenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contentgen/contentgen.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ContentGenError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ContentGenError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ContentGenError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ContentGenError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ContentGenError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the API key env var is set when the provider needs one.
pub fn validate_api_key(config: &AppConfig, provider: Provider) -> Result<()> {
    if provider != Provider::OpenRouter {
        return Ok(());
    }
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(ContentGenError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}
