//! Logging setup
//!
//! Structured logging through tracing and tracing-subscriber. Output goes to stderr so
//! stdout stays free for `config` and `providers` output.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Initialize the tracing subscriber
///
/// Only the first call per process has an effect. `RUST_LOG` overrides
/// `default_level`.
///
/// # Examples
///
/// ```no_run
/// routesage::telemetry::init("info");
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}

/// Crate logs at `level`, dependencies at `warn`
fn default_directives(level: &str) -> String {
    format!("warn,routesage={}", level)
}
