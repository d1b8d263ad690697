//! Configuration loading for Paperlens.
//! Reads paperlens.toml from the current directory or the path in the PAPERLENS_CONFIG env var.

use std::path::{Path, PathBuf};

use paperlens_llm::{Pricing, Provider, RetryPolicy, SummariserConfig};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub processing: ProcessingConfig,
    pub storage: StorageConfig,
    pub pubmed: PubMedConfig,
    pub notify: NotifyConfig,
    pub costs: CostConfig,
    pub logging: LoggingConfig,
}

// ── LLM ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_compatible_model")]
    pub compatible_model: String,
    /// Required for `openai_compatible`; overrides the public endpoint otherwise.
    pub base_url: Option<String>,
    pub anthropic_api_key: Option<SecretString>,
    pub openai_api_key: Option<SecretString>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_anthropic_max_chars")]
    pub anthropic_max_chars: usize,
    #[serde(default = "default_openai_max_chars")]
    pub openai_max_chars: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_min_wait")]
    pub retry_min_wait_secs: u64,
    #[serde(default = "default_retry_max_wait")]
    pub retry_max_wait_secs: u64,
}

fn default_anthropic_model()    -> String { Provider::Anthropic.default_model().to_string() }
fn default_openai_model()       -> String { Provider::OpenAi.default_model().to_string() }
fn default_compatible_model()   -> String { Provider::OpenAiCompatible.default_model().to_string() }
fn default_max_tokens()         -> u32 { 4_000 }
fn default_temperature()        -> f32 { 0.3 }
fn default_anthropic_max_chars() -> usize { paperlens_ingestion::chunker::ANTHROPIC_MAX_CHARS }
fn default_openai_max_chars()   -> usize { paperlens_ingestion::chunker::OPENAI_MAX_CHARS }
fn default_max_retries()        -> u32 { 3 }
fn default_retry_min_wait()     -> u64 { 4 }
fn default_retry_max_wait()     -> u64 { 10 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            anthropic_model: default_anthropic_model(),
            openai_model: default_openai_model(),
            compatible_model: default_compatible_model(),
            base_url: None,
            anthropic_api_key: None,
            openai_api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            anthropic_max_chars: default_anthropic_max_chars(),
            openai_max_chars: default_openai_max_chars(),
            max_retries: default_max_retries(),
            retry_min_wait_secs: default_retry_min_wait(),
            retry_max_wait_secs: default_retry_max_wait(),
        }
    }
}

impl LlmConfig {
    pub fn model(&self) -> &str {
        match self.provider {
            Provider::Anthropic        => &self.anthropic_model,
            Provider::OpenAi           => &self.openai_model,
            Provider::OpenAiCompatible => &self.compatible_model,
        }
    }

    /// Chunk size for the active provider's context window.
    pub fn max_chars(&self) -> usize {
        match self.provider {
            Provider::Anthropic                              => self.anthropic_max_chars,
            Provider::OpenAi | Provider::OpenAiCompatible => self.openai_max_chars,
        }
    }

    /// API key for the active provider: the config value, or the provider's
    /// env var when the config leaves it empty.
    pub fn api_key(&self) -> Option<String> {
        let (configured, env_var) = match self.provider {
            Provider::Anthropic        => (&self.anthropic_api_key, "ANTHROPIC_API_KEY"),
            Provider::OpenAi           => (&self.openai_api_key, "OPENAI_API_KEY"),
            Provider::OpenAiCompatible => (&self.openai_api_key, "OPENAI_API_KEY"),
        };
        secret_or_env(configured.as_ref(), env_var)
    }

    pub fn summariser_config(&self) -> SummariserConfig {
        SummariserConfig {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            retry: RetryPolicy {
                max_retries: self.max_retries.max(1),
                min_wait: std::time::Duration::from_secs(self.retry_min_wait_secs),
                max_wait: std::time::Duration::from_secs(self.retry_max_wait_secs),
            },
        }
    }
}

// ── Processing ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_papers_dir")]
    pub papers_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Entries in the "top biomarkers" and "top diseases" lists.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_papers_dir() -> PathBuf { PathBuf::from("papers") }
fn default_output_dir() -> PathBuf { PathBuf::from("outputs") }
fn default_workers()    -> usize { 5 }
fn default_top_n()      -> usize { 10 }

pub const MAX_WORKERS: usize = 20;

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            papers_dir: default_papers_dir(),
            output_dir: default_output_dir(),
            workers: default_workers(),
            top_n: default_top_n(),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Local => "local",
            StorageBackend::S3    => "s3",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub prefix: String,
    /// MinIO or another S3-compatible endpoint.
    pub endpoint: Option<String>,
}

fn default_region() -> String { "us-east-1".to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            bucket: String::new(),
            region: default_region(),
            prefix: String::new(),
            endpoint: None,
        }
    }
}

// ── PubMed ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PubMedConfig {
    #[serde(default = "default_email")]
    pub email: String,
    pub api_key: Option<SecretString>,
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_days_back")]
    pub days_back: i64,
    /// Relative paths resolve against `processing.output_dir`.
    #[serde(default = "default_tracking_file")]
    pub tracking_file: PathBuf,
}

fn default_email()         -> String { "user@example.com".to_string() }
fn default_query()         -> String { "cancer biomarkers".to_string() }
fn default_max_results()   -> usize { 100 }
fn default_days_back()     -> i64 { 30 }
fn default_tracking_file() -> PathBuf { PathBuf::from("processed_papers.json") }

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            email: default_email(),
            api_key: None,
            query: default_query(),
            max_results: default_max_results(),
            days_back: default_days_back(),
            tracking_file: default_tracking_file(),
        }
    }
}

impl PubMedConfig {
    pub fn api_key(&self) -> Option<String> {
        secret_or_env(self.api_key.as_ref(), "NCBI_API_KEY")
    }
}

// ── Notify ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,
    pub webhook_url: Option<SecretString>,
}

impl NotifyConfig {
    pub fn webhook_url(&self) -> Option<String> {
        secret_or_env(self.webhook_url.as_ref(), "PAPERLENS_WEBHOOK_URL")
    }
}

// ── Costs ─────────────────────────────────────────────────────────────────────

/// USD per million tokens; unset values use the provider list price.
#[derive(Debug, Default, Deserialize)]
pub struct CostConfig {
    pub input_per_million: Option<f64>,
    pub output_per_million: Option<f64>,
}

impl CostConfig {
    pub fn pricing(&self, provider: Provider) -> Pricing {
        let base = Pricing::for_provider(provider);
        Pricing {
            input_per_million: self.input_per_million.unwrap_or(base.input_per_million),
            output_per_million: self.output_per_million.unwrap_or(base.output_per_million),
        }
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Command-line values that take precedence over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub papers_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub provider: Option<Provider>,
}

impl Config {
    /// Load configuration from a TOML file.
    /// Checks PAPERLENS_CONFIG env var first, then paperlens.toml in the
    /// current directory. Without either, every setting takes its default.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("PAPERLENS_CONFIG") {
            Ok(path) => {
                if !Path::new(&path).exists() {
                    anyhow::bail!(
                        "Config file not found: {}\n\
                         Copy paperlens.example.toml to paperlens.toml and edit it.",
                        path
                    );
                }
                Self::from_file(Path::new(&path))
            }
            Err(_) => {
                let path = Path::new("paperlens.toml");
                if path.exists() {
                    Self::from_file(path)
                } else {
                    tracing::info!("No paperlens.toml found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(dir) = &overrides.papers_dir {
            self.processing.papers_dir = dir.clone();
        }
        if let Some(dir) = &overrides.output_dir {
            self.processing.output_dir = dir.clone();
        }
        if let Some(workers) = overrides.workers {
            self.processing.workers = workers;
        }
        if let Some(provider) = overrides.provider {
            self.llm.provider = provider;
        }
    }

    /// Tracking file path with relative paths placed under the output directory.
    pub fn tracking_file(&self) -> PathBuf {
        if self.pubmed.tracking_file.is_absolute() {
            self.pubmed.tracking_file.clone()
        } else {
            self.processing.output_dir.join(&self.pubmed.tracking_file)
        }
    }

    /// Problems that would make a processing run fail. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let provider = self.llm.provider;

        if provider.requires_key() && self.llm.api_key().is_none() {
            let var = match provider {
                Provider::Anthropic => "ANTHROPIC_API_KEY",
                _                   => "OPENAI_API_KEY",
            };
            errors.push(format!("{var} is required when llm.provider is '{provider}'"));
        }
        if provider == Provider::OpenAiCompatible
            && self.llm.base_url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            errors.push("llm.base_url is required when llm.provider is 'openai_compatible'".to_string());
        }
        if !self.processing.papers_dir.is_dir() {
            errors.push(format!(
                "Papers directory does not exist: {}",
                self.processing.papers_dir.display()
            ));
        }
        if !(1..=MAX_WORKERS).contains(&self.processing.workers) {
            errors.push(format!(
                "processing.workers must be between 1 and {MAX_WORKERS}, got {}",
                self.processing.workers
            ));
        }
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            errors.push(format!(
                "llm.temperature must be between 0 and 1, got {}",
                self.llm.temperature
            ));
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.bucket.trim().is_empty() {
            errors.push("storage.bucket is required when storage.backend is 's3'".to_string());
        }
        errors
    }

    /// Effective settings as printable key/value pairs. Secrets are reported
    /// only as present or absent.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let present = |set: bool| if set { "set" } else { "not set" }.to_string();
        vec![
            ("provider",       self.llm.provider.to_string()),
            ("model",          self.llm.model().to_string()),
            ("api_key",        present(self.llm.api_key().is_some())),
            ("storage",        self.storage.backend.as_str().to_string()),
            ("workers",        self.processing.workers.to_string()),
            ("papers_dir",     self.processing.papers_dir.display().to_string()),
            ("output_dir",     self.processing.output_dir.display().to_string()),
            ("max_retries",    self.llm.max_retries.to_string()),
            ("pubmed_email",   self.pubmed.email.clone()),
            ("ncbi_api_key",   present(self.pubmed.api_key().is_some())),
            ("webhook",        present(self.notify.webhook_url().is_some())),
            ("log_level",      self.logging.level.clone()),
        ]
    }
}

/// The configured secret, or `env_var` when the secret is missing or empty.
fn secret_or_env(configured: Option<&SecretString>, env_var: &str) -> Option<String> {
    configured
        .map(|s| s.expose_secret().trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|v| !v.trim().is_empty()))
}

#[cfg(test)]
mod tests;
