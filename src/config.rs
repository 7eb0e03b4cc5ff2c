//! Configuration management for the interval poller
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with support for environment variable overrides.
//! The polling core never reads files or the environment itself; it receives
//! the values assembled here.

use crate::error::{LocalvoltsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "LOCALVOLTS_CONFIG";

const DEFAULT_PATHS: [&str; 3] = [
    "localvolts.yaml",
    "/data/localvolts.yaml",
    "/etc/localvolts/config.yaml",
];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metering API credentials and request policy
    pub api: ApiConfig,

    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Metering API connection parameters
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key, sent as `Authorization: apikey <key>`
    pub api_key: String,

    /// Partner identifier, sent as the `partner` header
    pub partner_id: String,

    /// National Metering Identifier of the tracked meter
    pub nmi: String,

    /// Scheme and host of the API
    pub base_url: String,

    /// Per-attempt request timeout
    pub request_timeout_secs: u64,

    /// Attempts per fetch, including the first
    pub max_attempts: u32,

    /// Backoff base; attempt `n` waits `base * 2^(n-1)`
    pub retry_base_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Console override of `level`
    pub console_level: Option<String>,

    /// File override of `level`
    pub file_level: Option<String>,

    /// Directory for daily rotated log files; console only when unset
    pub directory: Option<String>,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &redact(&self.api_key))
            .field("partner_id", &self.partner_id)
            .field("nmi", &self.nmi)
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "<redacted>" }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            partner_id: String::new(),
            nmi: String::new(),
            base_url: "https://api.localvolts.com".to_string(),
            request_timeout_secs: 10,
            max_attempts: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            directory: None,
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            poll_interval_ms: 10_000,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from the first file found, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => DEFAULT_PATHS
                .iter()
                .find(|p| Path::new(p).exists())
                .map(Self::from_file)
                .transpose()?
                .unwrap_or_default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override credentials from the environment; `lookup` abstracts `std::env::var`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut String); 4] = [
            ("LOCALVOLTS_API_KEY", &mut self.api.api_key),
            ("LOCALVOLTS_PARTNER_ID", &mut self.api.partner_id),
            ("LOCALVOLTS_NMI", &mut self.api.nmi),
            ("LOCALVOLTS_BASE_URL", &mut self.api.base_url),
        ];
        for (key, slot) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value.trim().to_string();
            }
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("api.api_key", &self.api.api_key),
            ("api.partner_id", &self.api.partner_id),
            ("api.nmi", &self.api.nmi),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(LocalvoltsError::validation(field, "Must not be empty"));
            }
        }

        if !(self.api.base_url.starts_with("https://") || self.api.base_url.starts_with("http://"))
        {
            return Err(LocalvoltsError::validation(
                "api.base_url",
                "Must be an http(s) URL",
            ));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(LocalvoltsError::validation(
                "api.request_timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.api.max_attempts == 0 {
            return Err(LocalvoltsError::validation(
                "api.max_attempts",
                "Must be at least 1",
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(LocalvoltsError::validation(
                "poll_interval_ms",
                "Must be greater than 0",
            ));
        }

        let levels = [
            Some(&self.logging.level),
            self.logging.console_level.as_ref(),
            self.logging.file_level.as_ref(),
        ];
        for level in levels.into_iter().flatten() {
            crate::logging::parse_log_level(level)?;
        }

        Ok(())
    }
}
