//! OpenAI chat completions (also serves DeepSeek, which speaks the same protocol)

use super::http::{self, text_at};
use super::{ClientSettings, EnrichmentRequest, LlmClient, Provider, ProviderError};
use async_trait::async_trait;
use serde_json::json;

pub struct OpenAiClient {
    provider: Provider,
    settings: ClientSettings,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(provider: Provider, settings: ClientSettings) -> Result<Self, ProviderError> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            ProviderError::Configuration(format!("provider '{}' requires an API key", provider))
        })?;
        Ok(Self {
            provider,
            http: http::client(settings.timeout)?,
            settings,
            api_key,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> &str {
        self.provider.as_str()
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn invoke(&self, request: &EnrichmentRequest) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });

        let response = http::send_json(
            self.http
                .post(format!("{}/chat/completions", self.settings.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        if response.pointer("/choices/0/finish_reason").and_then(|v| v.as_str())
            == Some("content_filter")
        {
            return Err(ProviderError::ContentPolicy {
                message: "completion stopped by content filter".to_string(),
            });
        }

        text_at(&response, "/choices/0/message/content")
    }
}
