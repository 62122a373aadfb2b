//! Command-line interface for RouteSage
//!
//! Argument parsing and the config template. Subcommand dispatch lives in `main.rs`.

use crate::config::Config;
use crate::export::ExportFormat;
use crate::llm::Provider;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Config file used when `--config` is not given, if it exists
pub const DEFAULT_CONFIG_FILE: &str = "routesage.toml";

/// LLM-assisted documentation for FastAPI routes
#[derive(Parser)]
#[command(name = "routesage")]
#[command(version)]
#[command(about = "LLM-assisted documentation for FastAPI routes")]
#[command(
    long_about = "RouteSage scans a FastAPI project for route declarations, asks an LLM to \
    describe and tag each endpoint, and writes the result as Markdown or JSON. Responses \
    are cached on disk so unchanged routes are not sent again."
)]
pub struct Cli {
    /// Path to configuration file (defaults to ./routesage.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate documentation for a project
    Generate(GenerateArgs),

    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove every entry from the response cache
    ClearCache,

    /// List supported LLM providers and their models
    Providers,

    /// List supported output formats
    Formats,
}

#[derive(Args, Debug, Default)]
pub struct GenerateArgs {
    /// Project directory or single Python file to scan
    pub path: PathBuf,

    /// Directory to write documentation into
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Output format: markdown or json
    #[arg(short, long)]
    pub format: Option<ExportFormat>,

    /// LLM provider
    #[arg(short, long)]
    pub provider: Option<Provider>,

    /// Model name (provider default otherwise)
    #[arg(short, long)]
    pub model: Option<String>,

    /// API key (overrides the provider's environment variable)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Base URL for the provider API
    #[arg(long)]
    pub base_url: Option<String>,

    /// Routes enriched at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Bypass the response cache
    #[arg(long)]
    pub no_cache: bool,

    /// Write Prometheus metrics for the run to this file
    #[arg(long)]
    pub metrics: Option<PathBuf>,

    /// Add the generated description and tags to each route decorator in the sources
    #[arg(long)]
    pub write_back: bool,
}

impl GenerateArgs {
    /// Apply command-line overrides on top of file configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(provider) = self.provider {
            if provider != config.provider.name {
                // A model or key variable chosen for another provider does not carry over
                config.provider.model = None;
                config.provider.api_key_env = None;
                config.provider.base_url = None;
            }
            config.provider.name = provider;
        }
        if let Some(model) = &self.model {
            config.provider.model = Some(model.clone());
        }
        if let Some(base_url) = &self.base_url {
            config.provider.base_url = Some(base_url.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.enrichment.concurrency = concurrency;
        }
        if let Some(format) = self.format {
            config.export.format = format;
        }
        if let Some(output_dir) = &self.output_dir {
            config.export.output_dir = output_dir.clone();
        }
    }
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# RouteSage Configuration
# =======================
#
# Every table is optional. Values shown are the defaults unless marked otherwise.
# Command-line flags (--provider, --model, --format, ...) override this file.

# ─────────────────────────────────────────────────────────────────────────────
# LLM PROVIDER
# ─────────────────────────────────────────────────────────────────────────────

[provider]
# One of: openai, anthropic, gemini, deepseek, local
name = "openai"

# Model name; the provider's default is used when omitted
model = "gpt-3.5-turbo"

# Environment variable holding the API key (provider default otherwise:
# OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, DEEPSEEK_API_KEY)
# api_key_env = "OPENAI_API_KEY"

# API base URL. Required for "local" (any OpenAI-compatible server).
# base_url = "http://localhost:11434/v1"

# Per-call timeout in seconds (1-600); an expired call is retried
timeout_seconds = 30

# Sampling temperature (0.0-2.0)
temperature = 0.7

# Maximum tokens per response
max_tokens = 1000

# ─────────────────────────────────────────────────────────────────────────────
# RATE LIMIT
# ─────────────────────────────────────────────────────────────────────────────
#
# At most `count` provider calls may start within any `window_seconds` window.

[rate_limit]
count = 60
window_seconds = 60

# ─────────────────────────────────────────────────────────────────────────────
# RETRY
# ─────────────────────────────────────────────────────────────────────────────
#
# Transient failures (timeouts, HTTP 429/5xx, network errors) are retried with
# exponential backoff: base_delay * 2^(n-1), capped at max_delay.
# Permanent failures (bad credentials, malformed requests) are never retried.

[retry]
max_retries = 3
base_delay_seconds = 1.0
max_delay_seconds = 30.0
# Randomize each delay between 0 and the computed backoff
jitter = false

# ─────────────────────────────────────────────────────────────────────────────
# RESPONSE CACHE
# ─────────────────────────────────────────────────────────────────────────────

[cache]
enabled = true
# path = "~/.routesage/cache.json"
# Entry lifetime in seconds (0 = never expire). Default: one week.
ttl_seconds = 604800

# ─────────────────────────────────────────────────────────────────────────────
# ENRICHMENT
# ─────────────────────────────────────────────────────────────────────────────

[enrichment]
# Routes enriched at once (1-32)
concurrency = 1

# ─────────────────────────────────────────────────────────────────────────────
# EXPORT
# ─────────────────────────────────────────────────────────────────────────────

[export]
# "markdown" or "json"
format = "markdown"
output_dir = "./docs"

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
# RUST_LOG overrides this; --verbose forces "debug"
log_level = "info"
"#
}
