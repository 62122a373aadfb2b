//! Enrichment orchestrator
//!
//! For each route: fingerprint → cache lookup → on miss, rate limiter → retry
//! controller around the LLM client → cache write → merge description and tags into
//! the record. One route failing never stops the others.

pub mod prompt;

use crate::cache::{CacheStore, Fingerprint, PutOutcome};
use crate::llm::{LlmClient, ProviderError};
use crate::limiter::RateLimiter;
use crate::metrics::{CacheLookup, CacheWrite, Metrics};
use crate::models::{RouteFailure, RouteRecord, RunSummary};
use crate::retry::{RetryController, RetryEvent, RetryObserver, RetryOutcome};
use futures::stream::{self, StreamExt};
use prompt::Enrichment;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Where an enriched record's description came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichSource {
    Cache,
    Provider,
}

/// Result of processing one record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Enriched { source: EnrichSource },
    Failed(RouteFailure),
    /// Cancellation fired before the record finished; it is left unenriched
    Skipped,
}

/// Enriched records, in input order, plus the run summary
#[derive(Debug, Clone)]
pub struct EnrichmentReport {
    pub routes: Vec<RouteRecord>,
    pub summary: RunSummary,
}

pub struct Orchestrator {
    client: Arc<dyn LlmClient>,
    cache: Option<Arc<CacheStore>>,
    limiter: Arc<RateLimiter>,
    retry: RetryController,
    cancel: CancellationToken,
    metrics: Metrics,
    concurrency: usize,
    /// Fingerprints already written this run
    written: Mutex<HashSet<Fingerprint>>,
}

impl Orchestrator {
    /// Sequential orchestrator without a cache
    pub fn new(
        client: Arc<dyn LlmClient>,
        limiter: Arc<RateLimiter>,
        retry: RetryController,
        metrics: Metrics,
    ) -> Self {
        Self {
            client,
            cache: None,
            limiter,
            retry,
            cancel: CancellationToken::new(),
            metrics,
            concurrency: 1,
            written: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Records processed at once; clamped to at least 1
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Enrich every record, keeping input order
    pub async fn enrich_all<I>(&self, routes: I) -> EnrichmentReport
    where
        I: IntoIterator<Item = RouteRecord>,
    {
        let results: Vec<(RouteRecord, RecordOutcome)> = stream::iter(routes)
            .map(|mut route| async move {
                let outcome = self.enrich_one(&mut route).await;
                (route, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut summary = RunSummary {
            routes_found: results.len(),
            ..RunSummary::default()
        };
        let mut routes = Vec::with_capacity(results.len());
        for (route, outcome) in results {
            match outcome {
                RecordOutcome::Enriched {
                    source: EnrichSource::Cache,
                } => summary.enriched_from_cache += 1,
                RecordOutcome::Enriched {
                    source: EnrichSource::Provider,
                } => summary.enriched_from_provider += 1,
                RecordOutcome::Failed(failure) => {
                    summary.failed += 1;
                    summary.route_failures.push(failure);
                }
                RecordOutcome::Skipped => summary.skipped += 1,
            }
            routes.push(route);
        }

        tracing::info!(
            routes = summary.routes_found,
            from_cache = summary.enriched_from_cache,
            from_provider = summary.enriched_from_provider,
            failed = summary.failed,
            skipped = summary.skipped,
            "Enrichment finished"
        );

        EnrichmentReport { routes, summary }
    }

    /// Enrich a single record in place
    pub async fn enrich_one(&self, route: &mut RouteRecord) -> RecordOutcome {
        if self.cancel.is_cancelled() {
            return RecordOutcome::Skipped;
        }

        let label = route.label();
        let provider = self.client.provider();
        let fingerprint = Fingerprint::compute(provider, self.client.model(), route);

        if let Some(enrichment) = self.lookup(&fingerprint, &label).await {
            apply(route, enrichment);
            return RecordOutcome::Enriched {
                source: EnrichSource::Cache,
            };
        }

        let waited = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return RecordOutcome::Skipped,
            waited = self.limiter.acquire() => waited,
        };
        if !waited.is_zero() {
            self.metrics.record_rate_limit_wait();
            tracing::debug!(
                route = %label,
                waited_ms = waited.as_millis() as u64,
                "Waited for rate limiter"
            );
        }

        let request = prompt::build_request(route);
        let observer = RouteObserver {
            route: &label,
            provider,
            metrics: &self.metrics,
        };
        let outcome = self
            .retry
            .execute(&self.cancel, &observer, |attempt| {
                let client = Arc::clone(&self.client);
                let request = request.clone();
                let metrics = self.metrics.clone();
                async move {
                    tracing::debug!(
                        route = %format!("{} {}", request.method, request.path),
                        attempt = attempt,
                        "Calling provider"
                    );
                    let started = Instant::now();
                    let result = client.invoke(&request).await;
                    record(
                        metrics.observe_provider_latency(client.provider(), started.elapsed()),
                        "provider latency",
                    );
                    let raw = result?;
                    let enrichment = prompt::parse_response(&raw)?;
                    Ok::<_, ProviderError>((raw, enrichment))
                }
            })
            .await;

        match outcome {
            RetryOutcome::Success {
                value: (raw, enrichment),
                attempts,
            } => {
                self.store(&fingerprint, &raw, &label).await;
                tracing::info!(route = %label, attempts = attempts, "Route enriched");
                apply(route, enrichment);
                RecordOutcome::Enriched {
                    source: EnrichSource::Provider,
                }
            }
            RetryOutcome::Failed { error, attempts } => {
                let class = error.class();
                record(self.metrics.record_enrichment_failure(class), "enrichment failure");
                tracing::warn!(
                    route = %label,
                    file = %route.source_file.display(),
                    line = route.line,
                    error = %error,
                    class = %class,
                    attempts = attempts,
                    "Route enrichment failed"
                );
                RecordOutcome::Failed(RouteFailure {
                    route: label,
                    source_file: route.source_file.clone(),
                    line: route.line,
                    error: error.to_string(),
                    class: class.as_str().to_string(),
                    attempts,
                })
            }
            RetryOutcome::Cancelled { attempts } => {
                tracing::debug!(route = %label, attempts = attempts, "Enrichment cancelled");
                RecordOutcome::Skipped
            }
        }
    }

    async fn lookup(&self, fingerprint: &Fingerprint, label: &str) -> Option<Enrichment> {
        let cache = self.cache.as_ref()?;
        let Some(entry) = cache.get(fingerprint).await else {
            record(self.metrics.record_cache_lookup(CacheLookup::Miss), "cache lookup");
            return None;
        };
        match prompt::parse_response(&entry.response) {
            Ok(enrichment) => {
                record(self.metrics.record_cache_lookup(CacheLookup::Hit), "cache lookup");
                tracing::debug!(route = %label, fingerprint = %fingerprint, "Cache hit");
                Some(enrichment)
            }
            Err(e) => {
                record(self.metrics.record_cache_lookup(CacheLookup::Miss), "cache lookup");
                tracing::warn!(route = %label, error = %e, "Cached response unusable, ignoring");
                None
            }
        }
    }

    /// At most one write per fingerprint per run; failures are logged only
    async fn store(&self, fingerprint: &Fingerprint, raw: &str, label: &str) {
        let Some(cache) = &self.cache else {
            return;
        };
        if !self.written.lock().await.insert(fingerprint.clone()) {
            tracing::debug!(route = %label, "Fingerprint already written this run");
            return;
        }

        let result = match cache.put(fingerprint, raw).await {
            Ok(PutOutcome::Stored) => CacheWrite::Stored,
            Ok(PutOutcome::SkippedEmpty | PutOutcome::SkippedTooLarge) => CacheWrite::Skipped,
            Err(e) => {
                tracing::warn!(
                    route = %label,
                    path = %cache.path().display(),
                    error = %e,
                    "Failed to write response cache"
                );
                CacheWrite::Failed
            }
        };
        record(self.metrics.record_cache_write(result), "cache write");
    }
}

fn apply(route: &mut RouteRecord, enrichment: Enrichment) {
    route.description = Some(enrichment.description);
    route.tags = enrichment.tags;
}

fn record(result: Result<(), prometheus::Error>, what: &str) {
    if let Err(e) = result {
        tracing::error!(error = %e, metric = what, "Failed to record metric");
    }
}

/// Turns retry transitions into log lines and counters for one route
struct RouteObserver<'a> {
    route: &'a str,
    provider: &'a str,
    metrics: &'a Metrics,
}

impl RetryObserver for RouteObserver<'_> {
    fn on_event(&self, event: &RetryEvent<'_>) {
        match event {
            RetryEvent::AttemptFailed {
                attempt,
                class,
                error,
                next_delay,
            } => {
                record(
                    self.metrics.record_provider_call(self.provider, error.kind()),
                    "provider call",
                );
                match next_delay {
                    Some(delay) => {
                        record(self.metrics.record_retry(*class), "retry");
                        tracing::warn!(
                            route = %self.route,
                            attempt = attempt,
                            error = %error,
                            retry_in_ms = delay.as_millis() as u64,
                            "Provider call failed, retrying"
                        );
                    }
                    None => tracing::debug!(
                        route = %self.route,
                        attempt = attempt,
                        class = %class,
                        "Provider call failed, not retrying"
                    ),
                }
            }
            RetryEvent::Succeeded { attempts } => {
                record(
                    self.metrics.record_provider_call(self.provider, "success"),
                    "provider call",
                );
                if *attempts > 1 {
                    tracing::info!(
                        route = %self.route,
                        attempts = attempts,
                        "Provider call succeeded after retries"
                    );
                }
            }
            RetryEvent::GaveUp { .. } => {}
            RetryEvent::Cancelled { attempts } => {
                tracing::debug!(route = %self.route, attempts = attempts, "Retry loop cancelled");
            }
        }
    }
}
