//! Anthropic messages API

use super::http::{self, text_at};
use super::{ClientSettings, EnrichmentRequest, LlmClient, ProviderError};
use async_trait::async_trait;
use serde_json::json;

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    settings: ClientSettings,
    api_key: String,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ProviderError> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            ProviderError::Configuration("provider 'anthropic' requires an API key".to_string())
        })?;
        Ok(Self {
            http: http::client(settings.timeout)?,
            settings,
            api_key,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn invoke(&self, request: &EnrichmentRequest) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.settings.model,
            "system": request.system_prompt,
            "messages": [
                { "role": "user", "content": request.user_prompt },
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });

        let response = http::send_json(
            self.http
                .post(format!("{}/messages", self.settings.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body),
        )
        .await?;

        text_at(&response, "/content/0/text")
    }
}
