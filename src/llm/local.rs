//! Self-hosted OpenAI-compatible endpoints (Ollama, LM Studio, llama.cpp, vLLM)
//!
//! Queried through open-agent-sdk's streaming API; text blocks are concatenated and
//! any other block type is ignored.

use super::{ClientSettings, EnrichmentRequest, LlmClient, ProviderError};
use async_trait::async_trait;
use futures::StreamExt;
use open_agent::ContentBlock;

pub struct LocalClient {
    settings: ClientSettings,
}

impl LocalClient {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl LlmClient for LocalClient {
    fn provider(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn invoke(&self, request: &EnrichmentRequest) -> Result<String, ProviderError> {
        let options = open_agent::AgentOptions::builder()
            .model(&self.settings.model)
            .base_url(&self.settings.base_url)
            .max_tokens(self.settings.max_tokens)
            .temperature(self.settings.temperature)
            .build()
            .map_err(|e| {
                tracing::error!(
                    model = %self.settings.model,
                    base_url = %self.settings.base_url,
                    error = %e,
                    "Failed to build AgentOptions from provider configuration"
                );
                ProviderError::Configuration(format!("invalid agent options: {}", e))
            })?;

        let prompt = format!("{}\n\n{}", request.system_prompt, request.user_prompt);

        let mut stream = open_agent::query(&prompt, &options)
            .await
            .map_err(|e| ProviderError::Network(format!("failed to query model: {}", e)))?;

        let mut response_text = String::new();
        let mut block_count = 0;
        while let Some(result) = stream.next().await {
            match result {
                Ok(ContentBlock::Text(text_block)) => {
                    block_count += 1;
                    response_text.push_str(&text_block.text);
                }
                Ok(other_block) => {
                    block_count += 1;
                    tracing::debug!(
                        block_type = ?other_block,
                        block_number = block_count,
                        "Skipping non-text content block"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        base_url = %self.settings.base_url,
                        error = %e,
                        block_count = block_count,
                        partial_response_length = response_text.len(),
                        "Stream interrupted, discarding partial response"
                    );
                    return Err(ProviderError::Network(format!(
                        "stream interrupted after {} bytes: {}",
                        response_text.len(),
                        e
                    )));
                }
            }
        }

        if response_text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "model returned no text".to_string(),
            ));
        }
        Ok(response_text)
    }
}
