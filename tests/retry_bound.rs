//! Retry bound: K transient failures followed by success
//!
//! With `max_retries = K` the call succeeds on attempt K+1. With `max_retries = K-1`
//! it gives up after K attempts and the route is reported as failed.

use async_trait::async_trait;
use routesage::enrich::{EnrichSource, Orchestrator, RecordOutcome};
use routesage::limiter::RateLimiter;
use routesage::llm::{EnrichmentRequest, FailureClass, LlmClient, ProviderError};
use routesage::metrics::Metrics;
use routesage::models::{HttpMethod, RouteRecord};
use routesage::retry::{NoopObserver, RetryController, RetryOutcome, RetryPolicy};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const K: u32 = 3;

/// Fails with HTTP 503 for the first `failures` calls, then succeeds
struct FlakyProvider {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyProvider {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl LlmClient for FlakyProvider {
    fn provider(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "flaky"
    }

    async fn invoke(&self, request: &EnrichmentRequest) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(ProviderError::Unavailable {
                status: 503,
                message: format!("attempt {} failed", call),
            });
        }
        Ok(format!("desc-for-{}", request.path))
    }
}

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_retries,
        Duration::from_millis(2),
        Duration::from_millis(10),
    )
}

fn orchestrator(client: Arc<FlakyProvider>, max_retries: u32) -> Orchestrator {
    Orchestrator::new(
        client,
        Arc::new(RateLimiter::new(100, Duration::from_secs(1))),
        RetryController::new(policy(max_retries)),
        Metrics::new().unwrap(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Retry controller alone
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_k_failures_with_k_retries_succeeds_on_attempt_k_plus_one() {
    let client = FlakyProvider::new(K);
    let request = EnrichmentRequest {
        method: HttpMethod::Get,
        path: "/users/{id}".to_string(),
        system_prompt: String::new(),
        user_prompt: String::new(),
    };

    let outcome = RetryController::new(policy(K))
        .execute(&CancellationToken::new(), &NoopObserver, |_| {
            let client = client.clone();
            let request = request.clone();
            async move { client.invoke(&request).await }
        })
        .await;

    assert_eq!(
        outcome,
        RetryOutcome::Success {
            value: "desc-for-/users/{id}".to_string(),
            attempts: K + 1
        }
    );
    assert_eq!(client.calls.load(Ordering::SeqCst), K + 1);
}

#[tokio::test]
async fn test_k_failures_with_k_minus_one_retries_fails_after_k_attempts() {
    let client = FlakyProvider::new(K);
    let request = EnrichmentRequest {
        method: HttpMethod::Get,
        path: "/users/{id}".to_string(),
        system_prompt: String::new(),
        user_prompt: String::new(),
    };

    let outcome = RetryController::new(policy(K - 1))
        .execute(&CancellationToken::new(), &NoopObserver, |_| {
            let client = client.clone();
            let request = request.clone();
            async move { client.invoke(&request).await }
        })
        .await;

    let RetryOutcome::Failed { error, attempts } = outcome else {
        panic!("expected final failure, got {:?}", outcome);
    };
    assert_eq!(attempts, K);
    assert_eq!(error.class(), FailureClass::Transient);
    assert_eq!(
        error,
        ProviderError::Unavailable {
            status: 503,
            message: format!("attempt {} failed", K),
        },
        "final failure carries the last error"
    );
    assert_eq!(client.calls.load(Ordering::SeqCst), K);
}

// ─────────────────────────────────────────────────────────────────────────────
// Through the orchestrator
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_orchestrator_enriches_after_retries() {
    let client = FlakyProvider::new(K);
    let mut route = RouteRecord::new(HttpMethod::Get, "/users/{id}");

    let outcome = orchestrator(client.clone(), K).enrich_one(&mut route).await;

    assert_eq!(
        outcome,
        RecordOutcome::Enriched {
            source: EnrichSource::Provider
        }
    );
    assert_eq!(route.description.as_deref(), Some("desc-for-/users/{id}"));
    assert_eq!(client.calls.load(Ordering::SeqCst), K + 1);
}

#[tokio::test]
async fn test_orchestrator_reports_exhausted_retries() {
    let client = FlakyProvider::new(K);
    let report = orchestrator(client.clone(), K - 1)
        .enrich_all(vec![RouteRecord::new(HttpMethod::Get, "/users/{id}")])
        .await;

    assert_eq!(report.summary.failed, 1);
    let failure = &report.summary.route_failures[0];
    assert_eq!(failure.attempts, K);
    assert_eq!(failure.class, "transient");
    assert!(failure.error.contains("HTTP 503"));
    assert!(report.routes[0].description.is_none());
}

#[tokio::test]
async fn test_permanent_failure_is_attempted_once() {
    struct Rejecting(AtomicU32);

    #[async_trait]
    impl LlmClient for Rejecting {
        fn provider(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "rejecting"
        }

        async fn invoke(&self, _request: &EnrichmentRequest) -> Result<String, ProviderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::InvalidCredentials {
                status: 401,
                message: "invalid api key".to_string(),
            })
        }
    }

    let client = Arc::new(Rejecting(AtomicU32::new(0)));
    let report = Orchestrator::new(
        client.clone(),
        Arc::new(RateLimiter::new(100, Duration::from_secs(1))),
        RetryController::new(policy(5)),
        Metrics::new().unwrap(),
    )
    .enrich_all(vec![
        RouteRecord::new(HttpMethod::Get, "/a"),
        RouteRecord::new(HttpMethod::Get, "/b"),
    ])
    .await;

    assert_eq!(client.0.load(Ordering::SeqCst), 2, "one attempt per route");
    assert_eq!(report.summary.failed, 2);
    assert!(
        report
            .summary
            .route_failures
            .iter()
            .all(|f| f.class == "permanent" && f.attempts == 1)
    );
}
