//! Prometheus metrics collection for RouteSage
//!
//! Tracks one batch run:
//! - Routes extracted and files skipped
//! - Cache lookups and writes
//! - Provider calls by outcome, with latency
//! - Retries and final enrichment failures
//!
//! `routesage generate --metrics <file>` writes the text exposition when the run ends.

use crate::llm::FailureClass;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Cache lookup result label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
}

impl CacheLookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLookup::Hit => "hit",
            CacheLookup::Miss => "miss",
        }
    }
}

/// Cache write result label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    Stored,
    /// Empty or oversized response
    Skipped,
    Failed,
}

impl CacheWrite {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheWrite::Stored => "stored",
            CacheWrite::Skipped => "skipped",
            CacheWrite::Failed => "failed",
        }
    }
}

/// Metrics collector for one run
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    routes_extracted: IntCounter,
    files_skipped: IntCounter,
    cache_lookups: IntCounterVec,
    cache_writes: IntCounterVec,
    provider_calls: IntCounterVec,
    provider_call_duration: HistogramVec,
    retries: IntCounterVec,
    enrichment_failures: IntCounterVec,
    rate_limit_waits: IntCounter,
}

impl Metrics {
    /// Create a new Metrics instance with its own registry
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let routes_extracted = IntCounter::new(
            "routesage_routes_extracted_total",
            "Route declarations extracted from source files",
        )?;

        let files_skipped = IntCounter::new(
            "routesage_files_skipped_total",
            "Source files skipped or only partially decoded",
        )?;

        let cache_lookups = IntCounterVec::new(
            Opts::new("routesage_cache_lookups_total", "Cache lookups by result"),
            &["result"],
        )?;

        let cache_writes = IntCounterVec::new(
            Opts::new("routesage_cache_writes_total", "Cache writes by result"),
            &["result"],
        )?;

        // Labels:
        // - provider: openai, anthropic, gemini, deepseek, local (or a test stub)
        // - outcome: "success" or a ProviderError kind (timeout, rate_limited, ...)
        let provider_calls = IntCounterVec::new(
            Opts::new(
                "routesage_provider_calls_total",
                "Individual provider call attempts by provider and outcome",
            ),
            &["provider", "outcome"],
        )?;

        let provider_call_duration = HistogramVec::new(
            HistogramOpts::new(
                "routesage_provider_call_duration_seconds",
                "Provider call latency in seconds, per attempt",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["provider"],
        )?;

        let retries = IntCounterVec::new(
            Opts::new(
                "routesage_retries_total",
                "Retries scheduled after a failed attempt",
            ),
            &["class"],
        )?;

        let enrichment_failures = IntCounterVec::new(
            Opts::new(
                "routesage_enrichment_failures_total",
                "Routes left unenriched after retries, by failure class",
            ),
            &["class"],
        )?;

        let rate_limit_waits = IntCounter::new(
            "routesage_rate_limit_waits_total",
            "Provider calls that had to wait for the rate limiter",
        )?;

        registry.register(Box::new(routes_extracted.clone()))?;
        registry.register(Box::new(files_skipped.clone()))?;
        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(cache_writes.clone()))?;
        registry.register(Box::new(provider_calls.clone()))?;
        registry.register(Box::new(provider_call_duration.clone()))?;
        registry.register(Box::new(retries.clone()))?;
        registry.register(Box::new(enrichment_failures.clone()))?;
        registry.register(Box::new(rate_limit_waits.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            routes_extracted,
            files_skipped,
            cache_lookups,
            cache_writes,
            provider_calls,
            provider_call_duration,
            retries,
            enrichment_failures,
            rate_limit_waits,
        })
    }

    pub fn record_routes_extracted(&self, count: usize) {
        self.routes_extracted.inc_by(count as u64);
    }

    pub fn record_files_skipped(&self, count: usize) {
        self.files_skipped.inc_by(count as u64);
    }

    pub fn record_cache_lookup(&self, result: CacheLookup) -> Result<(), prometheus::Error> {
        self.cache_lookups
            .get_metric_with_label_values(&[result.as_str()])?
            .inc();
        Ok(())
    }

    pub fn record_cache_write(&self, result: CacheWrite) -> Result<(), prometheus::Error> {
        self.cache_writes
            .get_metric_with_label_values(&[result.as_str()])?
            .inc();
        Ok(())
    }

    /// Count one provider attempt; `outcome` is "success" or a `ProviderError` kind
    pub fn record_provider_call(
        &self,
        provider: &str,
        outcome: &str,
    ) -> Result<(), prometheus::Error> {
        self.provider_calls
            .get_metric_with_label_values(&[provider, outcome])?
            .inc();
        Ok(())
    }

    /// Latency of one provider attempt that returned (successfully or not)
    pub fn observe_provider_latency(
        &self,
        provider: &str,
        elapsed: Duration,
    ) -> Result<(), prometheus::Error> {
        self.provider_call_duration
            .get_metric_with_label_values(&[provider])?
            .observe(elapsed.as_secs_f64());
        Ok(())
    }

    pub fn record_retry(&self, class: FailureClass) -> Result<(), prometheus::Error> {
        self.retries
            .get_metric_with_label_values(&[class.as_str()])?
            .inc();
        Ok(())
    }

    pub fn record_enrichment_failure(&self, class: FailureClass) -> Result<(), prometheus::Error> {
        self.enrichment_failures
            .get_metric_with_label_values(&[class.as_str()])?
            .inc();
        Ok(())
    }

    pub fn record_rate_limit_wait(&self) {
        self.rate_limit_waits.inc();
    }

    /// Encode all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    metric_family_count = metric_families.len(),
                    "Prometheus text encoder failed"
                );
                e
            })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("metrics output is not valid UTF-8: {}", e))
        })
    }
}
