//! Configuration management for the knowledge extractor
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::loader::fetcher::{DEFAULT_URL_TEMPLATE, GUID_PLACEHOLDER};
use crate::model::ArtmConfig;

/// Origins allowed to call the API by default
pub const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "https://1.next.demo.westlaw.com",
    "https://1.next.qed.westlaw.com",
    "http://10.143.24.72.ip.next.demo.westlaw.com",
];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP API configuration
    pub server: ServerConfig,

    /// Document loader configuration
    pub loader: LoaderConfig,

    /// On-disk locations
    pub storage: StorageConfig,

    /// Topic model hyper-parameters
    pub model: ArtmConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the API binds to
    pub bind_address: String,

    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,

    /// Enable per-request tracing
    pub enable_request_logging: bool,
}

/// Document loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Raw document URL with a `{guid}` placeholder
    pub url_template: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Initial retry delay in milliseconds
    pub retry_base_delay_ms: u64,

    /// Retry delay cap in milliseconds
    pub retry_max_delay_ms: u64,

    /// Rate limit (requests per second)
    pub rate_limit: u32,

    /// Maximum number of concurrent requests
    pub max_concurrent_requests: usize,
}

/// On-disk locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of extracted `<guid>.txt` documents
    pub documents_dir: PathBuf,

    /// Directory for Vowpal Wabbit collections
    pub work_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0:5000"),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
            enable_request_logging: true,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            url_template: String::from(DEFAULT_URL_TEMPLATE),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            rate_limit: 5,
            max_concurrent_requests: 4,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("documents"),
            work_dir: PathBuf::from("bigARTM"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables keep their defaults. `WAIT_TIME` (seconds)
    /// sets the retry base delay unless `KE_RETRY_BASE_DELAY_MS` is given.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(bind) = std::env::var("KE_BIND_ADDRESS") {
            config.server.bind_address = bind;
        }

        if let Ok(origins) = std::env::var("KE_CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(template) = std::env::var("KE_URL_TEMPLATE") {
            config.loader.url_template = template;
        }

        if let Some(timeout) = env_parse("KE_REQUEST_TIMEOUT") {
            config.loader.request_timeout_secs = timeout;
        }

        if let Some(retries) = env_parse("KE_MAX_RETRIES") {
            config.loader.max_retries = retries;
        }

        if let Some(wait) = env_parse::<f64>("WAIT_TIME") {
            if wait.is_finite() && wait >= 0.0 {
                config.loader.retry_base_delay_ms = (wait * 1000.0) as u64;
            }
        }

        if let Some(delay) = env_parse("KE_RETRY_BASE_DELAY_MS") {
            config.loader.retry_base_delay_ms = delay;
        }

        // A long base delay lifts the cap along with it
        config.loader.retry_max_delay_ms = config
            .loader
            .retry_max_delay_ms
            .max(config.loader.retry_base_delay_ms);

        if let Some(rate) = env_parse("KE_RATE_LIMIT") {
            config.loader.rate_limit = rate;
        }

        if let Some(concurrency) = env_parse("KE_MAX_CONCURRENT_REQUESTS") {
            config.loader.max_concurrent_requests = concurrency;
        }

        if let Ok(dir) = std::env::var("KE_DOCUMENTS_DIR") {
            config.storage.documents_dir = dir.into();
        }

        if let Ok(dir) = std::env::var("KE_WORK_DIR") {
            config.storage.work_dir = dir.into();
        }

        if let Some(topics) = env_parse("KE_NUM_TOPICS") {
            config.model.num_topics = topics;
        }

        if let Ok(level) = std::env::var("KE_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(format) = std::env::var("KE_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise from the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.loader.url_template.contains(GUID_PLACEHOLDER) {
            anyhow::bail!("url_template must contain {GUID_PLACEHOLDER}");
        }

        if self.loader.max_concurrent_requests == 0 {
            anyhow::bail!("max_concurrent_requests must be greater than 0");
        }

        if self.loader.rate_limit == 0 {
            anyhow::bail!("rate_limit must be positive");
        }

        if self.loader.retry_max_delay_ms < self.loader.retry_base_delay_ms {
            anyhow::bail!("retry_max_delay_ms must not be below retry_base_delay_ms");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json'");
        }

        self.model.validate().context("Invalid model configuration")?;

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.loader.request_timeout_secs)
    }
}
