//! Telemetry configuration from environment variables.

use std::env;

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to log lines.
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON-formatted logs (defaults on inside containers).
    pub json_logs: bool,

    /// Prometheus metrics port.
    pub metrics_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "atomix".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_port: 9200,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AX_SERVICE_NAME`: service name (default: atomix)
    /// - `AX_LOG_LEVEL` or `RUST_LOG`: log level (default: info)
    /// - `AX_JSON_LOGS`: JSON logs (default: true inside containers)
    /// - `AX_METRICS_PORT`: Prometheus port (default: 9200)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("AX_SERVICE_NAME").unwrap_or_else(|_| "atomix".to_string()),

            log_level: env::var("AX_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("AX_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            metrics_port: env::var("AX_METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert!(!config.json_logs);
        assert_eq!(config.metrics_port, 9200);
    }
}
