//! # Platform Telemetry
//!
//! Structured logging and Prometheus metrics shared by every platform
//! component.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use platform_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     // Logs and metrics are now being collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PC_SERVICE_NAME` | `platform-commons` | Service name in logs |
//! | `PC_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `PC_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `PC_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    gather_metrics, register_metrics, CONSUMER_FAILURES, EVENTS_PUBLISHED, LOCK_ACQUISITIONS,
    MESSAGES_RECEIVED, PUBLISH_FAILURES, QUEUES_CREATED, SCOPE_OPERATIONS, SUBSCRIPTIONS,
    TOPICS_CREATED, TOPIC_LOOKUPS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize metrics and structured logging.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(&config)?;
    tracing::info!(service = %config.service_name, "Telemetry initialized");
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_inc_macro() {
        let before = TOPICS_CREATED.get();
        metric_inc!(TOPICS_CREATED);
        metric_inc!(SCOPE_OPERATIONS, &["get"]);
        assert!(TOPICS_CREATED.get() > before);
    }
}
