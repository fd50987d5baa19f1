//! `tracing` subscriber installation.
//!
//! The crate only emits events. Embedders that want them printed call
//! [`init`] once at startup (later calls are no-ops).

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::PlatformConfig;

/// Environment variable holding a filter directive.
pub const LOG_ENV: &str = "SPARK_ELEMENTS_LOG";

const DEFAULT_FILTER: &str = "warn";

static TRACING_INSTALLED: Once = Once::new();

/// Filter from `SPARK_ELEMENTS_LOG`, else the config's `log_filter`, else
/// `warn`. Invalid directives fall back to the default.
pub fn filter(config: &PlatformConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return filter;
    }
    config
        .log_filter
        .as_deref()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a fmt subscriber as the global default.
pub fn init(config: &PlatformConfig) {
    TRACING_INSTALLED.call_once(|| {
        let result = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(filter(config))
            .try_init();
        if let Err(err) = result {
            // Another subscriber won the race; keep it.
            tracing::debug!(error = %err, "tracing subscriber already installed");
        }
    });
}
