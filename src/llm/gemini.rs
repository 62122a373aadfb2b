//! Google Gemini generateContent API

use super::http::{self, text_at};
use super::{ClientSettings, EnrichmentRequest, LlmClient, ProviderError};
use async_trait::async_trait;
use serde_json::json;

pub struct GeminiClient {
    settings: ClientSettings,
    api_key: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ProviderError> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            ProviderError::Configuration("provider 'gemini' requires an API key".to_string())
        })?;
        Ok(Self {
            http: http::client(settings.timeout)?,
            settings,
            api_key,
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn invoke(&self, request: &EnrichmentRequest) -> Result<String, ProviderError> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": request.system_prompt }] },
            "contents": [
                { "role": "user", "parts": [{ "text": request.user_prompt }] },
            ],
            "generationConfig": {
                "temperature": self.settings.temperature,
                "maxOutputTokens": self.settings.max_tokens,
            },
        });

        let response = http::send_json(
            self.http
                .post(format!(
                    "{}/models/{}:generateContent",
                    self.settings.base_url, self.settings.model
                ))
                .query(&[("key", self.api_key.as_str())])
                .json(&body),
        )
        .await?;

        // Blocked prompts come back as 200 with a block reason and no candidates
        if let Some(reason) = response
            .pointer("/promptFeedback/blockReason")
            .and_then(|v| v.as_str())
        {
            return Err(ProviderError::ContentPolicy {
                message: format!("prompt blocked: {}", reason),
            });
        }
        if response.pointer("/candidates/0/finishReason").and_then(|v| v.as_str())
            == Some("SAFETY")
        {
            return Err(ProviderError::ContentPolicy {
                message: "candidate blocked by safety settings".to_string(),
            });
        }

        text_at(&response, "/candidates/0/content/parts/0/text")
    }
}
