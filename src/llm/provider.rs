//! Supported LLM providers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
    #[serde(rename = "deepseek")]
    DeepSeek,
    /// Self-hosted OpenAI-compatible endpoint
    Local,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Gemini,
        Provider::DeepSeek,
        Provider::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::DeepSeek => "deepseek",
            Self::Local => "local",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-3.5-turbo",
            Self::Anthropic => "claude-3-opus",
            Self::Gemini => "gemini-pro",
            Self::DeepSeek => "deepseek-chat",
            Self::Local => "local-model",
        }
    }

    /// Models the provider is known to serve; empty for self-hosted endpoints
    pub fn known_models(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["gpt-3.5-turbo", "gpt-4", "gpt-4-turbo-preview"],
            Self::Anthropic => &["claude-3-opus", "claude-3-sonnet", "claude-3-haiku"],
            Self::Gemini => &["gemini-pro", "gemini-2.0-flash"],
            Self::DeepSeek => &["deepseek-chat", "deepseek-coder"],
            Self::Local => &[],
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Self::Local => None,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Local)
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Anthropic => Some("https://api.anthropic.com/v1"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
            Self::DeepSeek => Some("https://api.deepseek.com/v1"),
            Self::Local => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(Provider::as_str).collect();
                format!("unknown provider '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}
