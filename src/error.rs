//! Error types for RouteSage
//!
//! Only configuration and setup errors are fatal. Per-file and per-route problems are
//! recovered where they happen and reported in the run summary instead.

use crate::cache::CacheError;
use crate::llm::ProviderError;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Cannot scan {path}: {source}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set up LLM client: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to write {path}: {source}")]
    ExportFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to update {path}: {source}")]
    WriteBackFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Failed to serialize documentation: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error stems from configuration (file, flags or environment)
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ConfigFileRead { .. }
                | Self::ConfigParseFailed { .. }
                | Self::ConfigValidationFailed { .. }
                | Self::Provider(ProviderError::Configuration(_))
        )
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
