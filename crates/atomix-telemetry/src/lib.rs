//! # Atomix Telemetry
//!
//! Observability plumbing for Atomix nodes:
//!
//! - structured logging via `tracing`, pretty for terminals and JSON for
//!   containers, filtered with the usual `RUST_LOG` syntax
//! - Prometheus counters and gauges for the swap engine
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = TelemetryConfig::from_env();
//! let _guard = atomix_telemetry::init_telemetry(&config)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    gather_metrics, ORDERS_CANCELLED, ORDERS_CREATED, ORDERS_FINISHED, PACKETS_DROPPED,
    PACKETS_PROCESSED, PACKETS_RETRIED, WATCHDOG_TICKS,
};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The tracing subscriber could not be installed.
    #[error("failed to initialize tracing: {0}")]
    TracingInit(String),

    /// Metric registration failed.
    #[error("failed to register metrics: {0}")]
    MetricsInit(String),
}

/// Guard that keeps telemetry active for the process lifetime.
pub struct TelemetryGuard {
    _private: (),
}

/// Initialize tracing and register the metric set.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    metrics::register_metrics()?;
    tracing_setup::init_tracing(config)?;
    Ok(TelemetryGuard { _private: () })
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "atomix");
        assert_eq!(config.log_level, "info");
    }
}
