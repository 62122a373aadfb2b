//! One batch run: discover → extract → enrich → document

use crate::cache::CacheStore;
use crate::config::{CacheConfig, Config};
use crate::enrich::Orchestrator;
use crate::error::{AppError, AppResult};
use crate::extractor::RouteExtractor;
use crate::limiter::RateLimiter;
use crate::llm::{self, LlmClient};
use crate::metrics::Metrics;
use crate::models::{ApiDocumentation, RouteRecord};
use crate::retry::{RetryController, RetryPolicy};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

pub struct Pipeline {
    config: Config,
    client: Arc<dyn LlmClient>,
    metrics: Metrics,
    cancel: CancellationToken,
    use_cache: bool,
}

impl Pipeline {
    /// Pipeline around an existing client
    pub fn new(config: Config, client: Arc<dyn LlmClient>, metrics: Metrics) -> Self {
        Self {
            config,
            client,
            metrics,
            cancel: CancellationToken::new(),
            use_cache: true,
        }
    }

    /// Pipeline with the client selected by `config.provider`
    ///
    /// # Errors
    ///
    /// Fails when the provider cannot be configured (e.g. no API key).
    pub fn from_config(config: Config, api_key: Option<String>, metrics: Metrics) -> AppResult<Self> {
        let client = llm::build_client(&config.provider, api_key)?;
        Ok(Self::new(config, client, metrics))
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bypass the response cache for this run
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Scan `root` and enrich every route found
    ///
    /// Only an unscannable root is an error. Unparseable files and failed routes end up
    /// in the summary; a cancelled run returns the partial documentation.
    pub async fn run(&self, root: &Path) -> AppResult<ApiDocumentation> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", run_id = %run_id);
        self.run_inner(root).instrument(span).await
    }

    async fn run_inner(&self, root: &Path) -> AppResult<ApiDocumentation> {
        tracing::info!(
            root = %root.display(),
            provider = %self.client.provider(),
            model = %self.client.model(),
            "Starting documentation run"
        );

        let extractor =
            RouteExtractor::from_root(root).map_err(|source| AppError::SourceUnavailable {
                path: root.display().to_string(),
                source,
            })?;

        let mut routes = extractor.routes();
        let records: Vec<RouteRecord> = routes.by_ref().collect();
        let app = routes.app_info().cloned().unwrap_or_default();
        tracing::info!(
            files = routes.files_scanned(),
            routes = records.len(),
            dynamic_skipped = routes.dynamic_skipped(),
            warnings = routes.warnings().len(),
            "Extraction finished"
        );
        let file_warnings = routes.into_warnings();
        self.metrics.record_routes_extracted(records.len());
        self.metrics.record_files_skipped(file_warnings.len());

        let report = self.orchestrator().enrich_all(records).await;
        let mut summary = report.summary;
        summary.file_warnings = file_warnings;

        if self.cancel.is_cancelled() {
            tracing::warn!(skipped = summary.skipped, "Run cancelled, documentation is partial");
        }

        Ok(ApiDocumentation::new(app, report.routes, summary))
    }

    fn orchestrator(&self) -> Orchestrator {
        let limiter = Arc::new(RateLimiter::from_config(&self.config.rate_limit));
        let retry = RetryController::new(RetryPolicy::from_config(
            &self.config.retry,
            self.config.provider.timeout_seconds,
        ));
        let orchestrator = Orchestrator::new(
            Arc::clone(&self.client),
            limiter,
            retry,
            self.metrics.clone(),
        )
        .with_cancellation(self.cancel.clone())
        .with_concurrency(self.config.enrichment.concurrency);

        match self.open_cache() {
            Some(cache) => orchestrator.with_cache(cache),
            None => orchestrator,
        }
    }

    fn open_cache(&self) -> Option<Arc<CacheStore>> {
        if !self.use_cache || !self.config.cache.enabled {
            tracing::debug!("Response cache disabled");
            return None;
        }
        Some(Arc::new(CacheStore::open(
            self.config.cache.resolved_path(),
            self.config.cache.ttl_seconds,
        )))
    }
}

/// Empty the configured cache file; returns the number of entries removed
pub async fn clear_cache(config: &CacheConfig) -> AppResult<usize> {
    let cache = CacheStore::open(config.resolved_path(), config.ttl_seconds);
    let removed = cache.clear().await?;
    tracing::info!(path = %cache.path().display(), removed = removed, "Cache cleared");
    Ok(removed)
}
