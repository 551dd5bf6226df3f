//! Tracing subscriber setup. `log` records from the library are forwarded
//! into the same subscriber.

use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use propertypulse::config::LoggingConfig;

use crate::error::StartupError;

/// Installs the global subscriber. `RUST_LOG` wins over the configured
/// filter.
pub fn init(config: &LoggingConfig) -> Result<(), StartupError> {
    LogTracer::init().map_err(|e| StartupError::Logging(e.to_string()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
    } else {
        tracing::subscriber::set_global_default(registry.with(fmt::layer()))
    };
    installed.map_err(|e| StartupError::Logging(e.to_string()))
}
