//! LLM client capability and provider variants
//!
//! The enrichment core depends only on [`LlmClient::invoke`]. Each provider is one
//! implementation, chosen at startup by [`build_client`]. Failures are typed as
//! [`ProviderError`] and classified into [`FailureClass`] for the retry controller.

pub mod anthropic;
pub mod gemini;
mod http;
pub mod local;
pub mod openai;
pub mod provider;

use crate::config::ProviderConfig;
use crate::models::HttpMethod;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use provider::Provider;

/// Maximum length of provider error bodies kept in error messages
const MAX_ERROR_BODY: usize = 300;

/// Whether retrying a failed call can help
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    /// Timeouts, throttling, 5xx: retry with backoff
    Transient,
    /// Credentials, malformed requests, policy rejections: surface immediately
    Permanent,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from one provider call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Transient: no response within the per-call timeout
    #[error("provider call timed out after {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },

    /// Transient: connection refused, reset, DNS failure, interrupted stream
    #[error("network error: {0}")]
    Network(String),

    /// Transient: provider signalled throttling (HTTP 429)
    #[error("rate limited by provider: {message}")]
    RateLimited { message: String },

    /// Transient: HTTP 408 or 5xx
    #[error("provider unavailable (HTTP {status}): {message}")]
    Unavailable { status: u16, message: String },

    /// Permanent: HTTP 401/403
    #[error("invalid credentials (HTTP {status}): {message}")]
    InvalidCredentials { status: u16, message: String },

    /// Permanent: HTTP 400/404/422 and other 4xx
    #[error("malformed request (HTTP {status}): {message}")]
    BadRequest { status: u16, message: String },

    /// Permanent: the provider refused the content
    #[error("content policy rejection: {message}")]
    ContentPolicy { message: String },

    /// Permanent: response had no usable text
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Permanent: the client could not be constructed or configured
    #[error("client configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    pub fn class(&self) -> FailureClass {
        if self.is_retryable() {
            FailureClass::Transient
        } else {
            FailureClass::Permanent
        }
    }

    /// Returns true if this error is transient
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Network(_)
                | Self::RateLimited { .. }
                | Self::Unavailable { .. }
        )
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Network(_) => "network",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable { .. } => "unavailable",
            Self::InvalidCredentials { .. } => "invalid_credentials",
            Self::BadRequest { .. } => "bad_request",
            Self::ContentPolicy { .. } => "content_policy",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Classify a non-success HTTP status and its body
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate(body.trim());
        match status {
            429 => Self::RateLimited { message },
            408 | 500..=599 => Self::Unavailable { status, message },
            401 | 403 => Self::InvalidCredentials { status, message },
            _ if mentions_policy(body) => Self::ContentPolicy { message },
            _ => Self::BadRequest { status, message },
        }
    }
}

fn mentions_policy(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    ["content_policy", "content policy", "safety", "content_filter", "policy violation"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_ERROR_BODY {
        return text.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// One enrichment call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRequest {
    pub method: HttpMethod,
    pub path: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Capability interface every provider implements
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider identity, part of the cache fingerprint
    fn provider(&self) -> &str;

    /// Model identity, part of the cache fingerprint
    fn model(&self) -> &str;

    /// Perform one call; no retries, no timeout
    async fn invoke(&self, request: &EnrichmentRequest) -> Result<String, ProviderError>;
}

/// Everything a concrete client needs
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Construct the client for the configured provider
///
/// `api_key` overrides the key found through the environment.
pub fn build_client(
    config: &ProviderConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn LlmClient>, ProviderError> {
    let provider = config.name;
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string());

    if !provider.known_models().is_empty() && !provider.known_models().contains(&model.as_str())
    {
        tracing::warn!(
            provider = %provider,
            model = %model,
            known = ?provider.known_models(),
            "Model is not in the provider's known model list, using it anyway"
        );
    }

    let api_key = api_key.or_else(|| config.resolve_api_key());
    if provider.requires_api_key() && api_key.as_deref().is_none_or(str::is_empty) {
        return Err(ProviderError::Configuration(format!(
            "no API key for provider '{}': pass --api-key or set {}",
            provider,
            config.api_key_env_name()
        )));
    }

    let base_url = config
        .base_url
        .clone()
        .or_else(|| provider.default_base_url().map(str::to_string))
        .ok_or_else(|| {
            ProviderError::Configuration(format!("provider '{}' requires base_url", provider))
        })?;

    let settings = ClientSettings {
        model,
        api_key,
        base_url: base_url.trim_end_matches('/').to_string(),
        temperature: config.temperature as f32,
        max_tokens: config.max_tokens,
        timeout: Duration::from_secs(config.timeout_seconds),
    };

    tracing::info!(
        provider = %provider,
        model = %settings.model,
        base_url = %settings.base_url,
        "Configured LLM client"
    );

    let client: Arc<dyn LlmClient> = match provider {
        Provider::OpenAi | Provider::DeepSeek => {
            Arc::new(openai::OpenAiClient::new(provider, settings)?)
        }
        Provider::Anthropic => Arc::new(anthropic::AnthropicClient::new(settings)?),
        Provider::Gemini => Arc::new(gemini::GeminiClient::new(settings)?),
        Provider::Local => Arc::new(local::LocalClient::new(settings)),
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status(429, "slow down"),
            ProviderError::RateLimited { .. }
        ));
        for status in [408, 500, 502, 503, 504] {
            let err = ProviderError::from_status(status, "");
            assert_eq!(err.class(), FailureClass::Transient, "status {}", status);
        }
        for status in [401, 403] {
            assert!(matches!(
                ProviderError::from_status(status, ""),
                ProviderError::InvalidCredentials { .. }
            ));
        }
        for status in [400, 404, 422] {
            let err = ProviderError::from_status(status, "bad field");
            assert!(matches!(err, ProviderError::BadRequest { .. }));
            assert_eq!(err.class(), FailureClass::Permanent);
        }
    }

    #[test]
    fn test_policy_body_is_content_policy() {
        let err = ProviderError::from_status(
            400,
            r#"{"error":{"code":"content_policy_violation"}}"#,
        );
        assert!(matches!(err, ProviderError::ContentPolicy { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_error_mentioning_safety_stays_transient() {
        let err = ProviderError::from_status(503, "safety system overloaded");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_variants() {
        assert!(ProviderError::Timeout { timeout_seconds: 5 }.is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(!ProviderError::InvalidResponse("empty".into()).is_retryable());
        assert!(!ProviderError::Configuration("no key".into()).is_retryable());
    }

    #[test]
    fn test_long_error_bodies_are_truncated() {
        let body = "é".repeat(400);
        let ProviderError::BadRequest { message, .. } = ProviderError::from_status(400, &body)
        else {
            panic!("expected BadRequest");
        };
        assert!(message.len() <= MAX_ERROR_BODY + 3);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn test_failure_class_display() {
        assert_eq!(FailureClass::Transient.to_string(), "transient");
        assert_eq!(FailureClass::Permanent.to_string(), "permanent");
    }
}
