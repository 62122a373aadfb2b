//! Shared HTTP plumbing for hosted providers

use super::ProviderError;
use serde_json::Value;
use std::time::Duration;

/// Build a reqwest client; the per-call deadline is enforced by the retry controller
pub(crate) fn client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Configuration(format!("failed to create HTTP client: {}", e)))
}

/// Send a request and decode a JSON success body, classifying every failure
pub(crate) async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
    let response = request.send().await.map_err(map_transport_error)?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body_length = body.len(), "Provider returned error status");
        return Err(ProviderError::from_status(status.as_u16(), &body));
    }

    // A body cut off mid-read is a transport failure, only a complete body can be malformed
    let body = response.bytes().await.map_err(map_transport_error)?;
    serde_json::from_slice::<Value>(&body)
        .map_err(|e| ProviderError::InvalidResponse(format!("response body is not JSON: {}", e)))
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Network(format!("request timed out: {}", e))
    } else if e.is_builder() {
        ProviderError::Configuration(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Non-empty text at a JSON pointer
pub(crate) fn text_at(body: &Value, pointer: &str) -> Result<String, ProviderError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidResponse(format!("no text at {}", pointer)))
}
