//! Hosted provider clients against a mock HTTP server
//!
//! Verifies request shape per provider and that HTTP outcomes map onto the right
//! [`ProviderError`] variant and failure class.

use routesage::config::ProviderConfig;
use routesage::enrich::{EnrichSource, Orchestrator, RecordOutcome};
use routesage::limiter::RateLimiter;
use routesage::llm::{
    EnrichmentRequest, FailureClass, LlmClient, Provider, ProviderError, build_client,
};
use routesage::metrics::Metrics;
use routesage::models::{HttpMethod, RouteRecord};
use routesage::retry::{RetryController, RetryPolicy};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(provider: Provider, server: &MockServer) -> Arc<dyn LlmClient> {
    client_at(provider, server.uri())
}

fn client_at(provider: Provider, base_url: String) -> Arc<dyn LlmClient> {
    let config = ProviderConfig {
        name: provider,
        base_url: Some(base_url),
        timeout_seconds: 5,
        ..ProviderConfig::default()
    };
    build_client(&config, Some("test-key".to_string())).expect("client should build")
}

fn request() -> EnrichmentRequest {
    EnrichmentRequest {
        method: HttpMethod::Get,
        path: "/users/{id}".to_string(),
        system_prompt: "Document this route.".to_string(),
        user_prompt: "Method: GET\nPath: /users/{id}".to_string(),
    }
}

fn chat_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

async fn openai_with(response: ResponseTemplate) -> (MockServer, Arc<dyn LlmClient>) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(response)
        .mount(&server)
        .await;
    let client = client_for(Provider::OpenAi, &server);
    (server, client)
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI-compatible
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_openai_success_returns_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("Fetch a user.")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(Provider::OpenAi, &server);
    assert_eq!(client.provider(), "openai");
    assert_eq!(client.model(), "gpt-3.5-turbo");
    assert_eq!(client.invoke(&request()).await.unwrap(), "Fetch a user.");
}

#[tokio::test]
async fn test_openai_429_is_transient_rate_limit() {
    let (_server, client) =
        openai_with(ResponseTemplate::new(429).set_body_string("slow down")).await;

    let err = client.invoke(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited { .. }), "got {:?}", err);
    assert_eq!(err.class(), FailureClass::Transient);
}

#[tokio::test]
async fn test_openai_503_is_transient() {
    let (_server, client) =
        openai_with(ResponseTemplate::new(503).set_body_string("overloaded")).await;

    let err = client.invoke(&request()).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::Unavailable {
            status: 503,
            message: "overloaded".to_string()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_openai_401_is_permanent_credentials_error() {
    let (_server, client) = openai_with(
        ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})),
    )
    .await;

    let err = client.invoke(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidCredentials { status: 401, .. }));
    assert_eq!(err.class(), FailureClass::Permanent);
}

#[tokio::test]
async fn test_openai_policy_rejection_is_permanent() {
    let (_server, client) = openai_with(ResponseTemplate::new(400).set_body_json(json!({
        "error": { "code": "content_policy_violation", "message": "rejected" }
    })))
    .await;

    let err = client.invoke(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::ContentPolicy { .. }), "got {:?}", err);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_openai_content_filter_finish_is_policy_rejection() {
    let mut body = chat_completion("");
    body["choices"][0]["finish_reason"] = json!("content_filter");
    let (_server, client) = openai_with(ResponseTemplate::new(200).set_body_json(body)).await;

    let err = client.invoke(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::ContentPolicy { .. }));
}

#[tokio::test]
async fn test_openai_blank_content_is_invalid_response() {
    let (_server, client) =
        openai_with(ResponseTemplate::new(200).set_body_json(chat_completion("   "))).await;

    let err = client.invoke(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
    assert_eq!(err.class(), FailureClass::Permanent);
}

#[tokio::test]
async fn test_openai_non_json_body_is_invalid_response() {
    let (_server, client) =
        openai_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>")).await;

    let err = client.invoke(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let server = MockServer::start().await;
    let client = client_for(Provider::OpenAi, &server);
    drop(server);

    let err = client.invoke(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Network(_)), "got {:?}", err);
    assert!(err.is_retryable());
}

// ─────────────────────────────────────────────────────────────────────────────
// Connections dropped mid-body
// ─────────────────────────────────────────────────────────────────────────────

/// 200 head promising 500 bytes, followed by only the first few
const CUT_OFF_RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 500\r\n\r\n{\"choi";

/// Consume one request: head, then `Content-Length` bytes of body
async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let mut expected = None;
    loop {
        if let Some(total) = expected {
            if buf.len() >= total {
                return;
            }
        }
        let Ok(n) = stream.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if expected.is_none() {
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                expected = Some(end + 4 + length);
            }
        }
    }
}

/// Raw HTTP server: the first `cut_off` connections get a truncated 200 body, later
/// ones a complete chat completion carrying `content`
async fn flaky_server(cut_off: usize, content: &str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = chat_completion(content).to_string();
    let connections = Arc::new(AtomicUsize::new(0));
    let seen = connections.clone();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let index = seen.fetch_add(1, Ordering::SeqCst);
            read_request(&mut stream).await;
            let reply = if index < cut_off {
                CUT_OFF_RESPONSE.to_string()
            } else {
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                )
            };
            let _ = stream.write_all(reply.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{}", addr), connections)
}

#[tokio::test]
async fn test_body_cut_off_mid_read_is_network_error() {
    let (base_url, _) = flaky_server(usize::MAX, "unused").await;
    let client = client_at(Provider::OpenAi, base_url);

    let err = client.invoke(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Network(_)), "got {:?}", err);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_orchestrator_retries_after_cut_off_body() {
    let (base_url, connections) =
        flaky_server(1, r#"{"description": "Fetch a user by id.", "tags": ["users"]}"#).await;

    let orchestrator = Orchestrator::new(
        client_at(Provider::OpenAi, base_url),
        Arc::new(RateLimiter::new(10, Duration::from_secs(1))),
        RetryController::new(RetryPolicy::new(
            3,
            Duration::from_millis(5),
            Duration::from_millis(20),
        )),
        Metrics::new().unwrap(),
    );

    let mut route = RouteRecord::new(HttpMethod::Get, "/users/{id}");
    let outcome = orchestrator.enrich_one(&mut route).await;

    assert_eq!(
        outcome,
        RecordOutcome::Enriched {
            source: EnrichSource::Provider
        }
    );
    assert_eq!(route.description.as_deref(), Some("Fetch a user by id."));
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Anthropic and Gemini
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_anthropic_request_and_response_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "Fetch a user." }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(Provider::Anthropic, &server);
    assert_eq!(client.provider(), "anthropic");
    assert_eq!(client.invoke(&request()).await.unwrap(), "Fetch a user.");
}

#[tokio::test]
async fn test_anthropic_529_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded_error"))
        .mount(&server)
        .await;

    let err = client_for(Provider::Anthropic, &server)
        .invoke(&request())
        .await
        .unwrap_err();
    assert_eq!(err.class(), FailureClass::Transient);
}

#[tokio::test]
async fn test_gemini_request_and_response_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-pro:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Fetch a user." }] },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(Provider::Gemini, &server);
    assert_eq!(client.model(), "gemini-pro");
    assert_eq!(client.invoke(&request()).await.unwrap(), "Fetch a user.");
}

#[tokio::test]
async fn test_gemini_blocked_prompt_is_policy_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let err = client_for(Provider::Gemini, &server)
        .invoke(&request())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::ContentPolicy { .. }));
}

// ─────────────────────────────────────────────────────────────────────────────
// Retry through the orchestrator
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_orchestrator_retries_transient_http_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_completion(
                r#"{"description": "Fetch a user by id.", "tags": ["users"]}"#,
            )),
        )
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::new(
        client_for(Provider::OpenAi, &server),
        Arc::new(RateLimiter::new(10, Duration::from_secs(1))),
        RetryController::new(RetryPolicy::new(
            3,
            Duration::from_millis(5),
            Duration::from_millis(20),
        )),
        Metrics::new().unwrap(),
    );

    let mut route = RouteRecord::new(HttpMethod::Get, "/users/{id}");
    let outcome = orchestrator.enrich_one(&mut route).await;

    assert_eq!(
        outcome,
        RecordOutcome::Enriched {
            source: EnrichSource::Provider
        }
    );
    assert_eq!(route.description.as_deref(), Some("Fetch a user by id."));
    assert!(route.tags.contains("users"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}
