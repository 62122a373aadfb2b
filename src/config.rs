//! Configuration management for RouteSage
//!
//! Parses TOML configuration files and provides typed access to settings. Every
//! table is optional; a missing file section takes its defaults.

use crate::export::ExportFormat;
use crate::llm::Provider;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Maximum per-call timeout accepted by validation
pub const MAX_TIMEOUT_SECONDS: u64 = 600;
/// Maximum enrichment workers accepted by validation
pub const MAX_CONCURRENCY: usize = 32;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// LLM provider selection and sampling parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub name: Provider,
    /// Provider default when unset
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the API key (provider default when unset)
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Required for `local`; overrides the hosted endpoint otherwise
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: Provider::default(),
            model: None,
            api_key_env: None,
            base_url: None,
            timeout_seconds: default_timeout_seconds(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ProviderConfig {
    /// Model name that will be sent to the provider
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.name.default_model())
    }

    /// Name of the environment variable consulted for the API key
    pub fn api_key_env_name(&self) -> &str {
        self.api_key_env
            .as_deref()
            .or_else(|| self.name.api_key_env())
            .unwrap_or("(none)")
    }

    /// API key from the configured environment variable, if set and non-empty
    pub fn resolve_api_key(&self) -> Option<String> {
        let var = self
            .api_key_env
            .as_deref()
            .or_else(|| self.name.api_key_env())?;
        std::env::var(var).ok().filter(|key| !key.trim().is_empty())
    }
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

/// Outbound call budget: at most `count` calls start in any `window_seconds` window
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_count")]
    pub count: u32,
    #[serde(default = "default_rate_window")]
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            count: default_rate_count(),
            window_seconds: default_rate_window(),
        }
    }
}

fn default_rate_count() -> u32 {
    60
}

fn default_rate_window() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_seconds: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: f64,
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_seconds: default_base_delay(),
            max_delay_seconds: default_max_delay(),
            jitter: false,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    30.0
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `~/.routesage/cache.json` when unset; a leading `~/` is expanded
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Entry lifetime; 0 disables expiry
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl CacheConfig {
    /// Cache file location with `~` expanded
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => expand_home(path),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".routesage")
                .join("cache.json"),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn default_true() -> bool {
    true
}

fn default_ttl_seconds() -> u64 {
    7 * 24 * 60 * 60
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnrichmentConfig {
    /// Enrichment calls in flight at once; 1 is strictly sequential
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./docs")
}

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            crate::error::AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        config
            .validate()
            .map_err(|e| crate::error::AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing or after CLI overrides
    pub fn validate(&self) -> crate::error::AppResult<()> {
        let invalid = |message: String| Err(crate::error::AppError::Config(message));

        // ─── provider ───────────────────────────────────────────────────────────
        let provider = &self.provider;
        if provider.timeout_seconds == 0 || provider.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return invalid(format!(
                "provider.timeout_seconds={} is out of range. Must be between 1 and {}.",
                provider.timeout_seconds, MAX_TIMEOUT_SECONDS
            ));
        }
        if !provider.temperature.is_finite() || !(0.0..=2.0).contains(&provider.temperature) {
            return invalid(format!(
                "provider.temperature={} is out of range. Must be between 0.0 and 2.0.",
                provider.temperature
            ));
        }
        if provider.max_tokens == 0 {
            return invalid("provider.max_tokens must be greater than 0.".to_string());
        }
        if let Some(model) = &provider.model
            && model.trim().is_empty()
        {
            return invalid("provider.model must not be empty when set.".to_string());
        }
        match &provider.base_url {
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                return invalid(format!(
                    "provider.base_url '{}' must start with http:// or https://",
                    url
                ));
            }
            None if provider.name == Provider::Local => {
                return invalid(
                    "provider 'local' requires provider.base_url (e.g. http://localhost:11434/v1)"
                        .to_string(),
                );
            }
            _ => {}
        }

        // ─── rate_limit ─────────────────────────────────────────────────────────
        if self.rate_limit.count == 0 {
            return invalid("rate_limit.count must be greater than 0.".to_string());
        }
        if self.rate_limit.window_seconds == 0 {
            return invalid("rate_limit.window_seconds must be greater than 0.".to_string());
        }

        // ─── retry ──────────────────────────────────────────────────────────────
        let retry = &self.retry;
        for (name, value) in [
            ("base_delay_seconds", retry.base_delay_seconds),
            ("max_delay_seconds", retry.max_delay_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!(
                    "retry.{}={} is invalid. Must be a finite, non-negative number.",
                    name, value
                ));
            }
        }
        if retry.max_delay_seconds < retry.base_delay_seconds {
            return invalid(format!(
                "retry.max_delay_seconds={} is less than retry.base_delay_seconds={}.",
                retry.max_delay_seconds, retry.base_delay_seconds
            ));
        }

        // ─── enrichment ─────────────────────────────────────────────────────────
        if self.enrichment.concurrency == 0 || self.enrichment.concurrency > MAX_CONCURRENCY {
            return invalid(format!(
                "enrichment.concurrency={} is out of range. Must be between 1 and {}.",
                self.enrichment.concurrency, MAX_CONCURRENCY
            ));
        }

        // ─── observability ──────────────────────────────────────────────────────
        let level = self.observability.log_level.to_ascii_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            return invalid(format!(
                "observability.log_level '{}' is invalid. Must be one of: trace, debug, info, warn, error.",
                self.observability.log_level
            ));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = crate::error::AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(toml_str).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            }
        })?;

        config.validate()?;
        Ok(config)
    }
}
