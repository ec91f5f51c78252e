//! Configuration for topology provisioning

use std::env;

use serde::{Deserialize, Serialize};

/// Provisioning configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Explicit environment identifier; takes precedence over the host
    pub environment_name: Option<String>,
    /// Hostname the environment identifier is derived from
    pub environment_host: Option<String>,
    /// Owning service, embedded in queue and DLQ names
    pub service_name: Option<String>,
    /// How long a queue keeps an undelivered message (seconds)
    pub queue_retention_secs: u64,
    /// How long a received message stays invisible (seconds)
    pub queue_visibility_timeout_secs: u64,
    /// Default long-poll wait of a queue (seconds)
    pub queue_poll_wait_secs: u64,
    /// Receives before a message is moved to the DLQ
    pub dlq_max_receive_count: u32,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            environment_name: None,
            environment_host: None,
            service_name: None,
            queue_retention_secs: 1_209_600,
            queue_visibility_timeout_secs: 30,
            queue_poll_wait_secs: 20,
            dlq_max_receive_count: 5,
        }
    }
}

impl TopologyConfig {
    /// Create configuration from environment variables.
    ///
    /// - `PC_ENVIRONMENT_NAME`: environment override (default: unset)
    /// - `PC_ENVIRONMENT_HOST`: environment hostname (default: unset)
    /// - `PC_SERVICE_NAME`: owning service (default: unset)
    /// - `PC_QUEUE_RETENTION_SECS` (default: 1209600)
    /// - `PC_QUEUE_VISIBILITY_TIMEOUT_SECS` (default: 30)
    /// - `PC_QUEUE_POLL_WAIT_SECS` (default: 20)
    /// - `PC_DLQ_MAX_RECEIVE_COUNT` (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            environment_name: non_empty("PC_ENVIRONMENT_NAME"),
            environment_host: non_empty("PC_ENVIRONMENT_HOST"),
            service_name: non_empty("PC_SERVICE_NAME"),
            queue_retention_secs: parsed("PC_QUEUE_RETENTION_SECS")
                .unwrap_or(defaults.queue_retention_secs),
            queue_visibility_timeout_secs: parsed("PC_QUEUE_VISIBILITY_TIMEOUT_SECS")
                .unwrap_or(defaults.queue_visibility_timeout_secs),
            queue_poll_wait_secs: parsed("PC_QUEUE_POLL_WAIT_SECS")
                .unwrap_or(defaults.queue_poll_wait_secs),
            dlq_max_receive_count: parsed("PC_DLQ_MAX_RECEIVE_COUNT")
                .unwrap_or(defaults.dlq_max_receive_count),
        }
    }

    /// Configuration with fixed environment and service identifiers.
    pub fn for_service(environment: &str, service: &str) -> Self {
        Self {
            environment_name: Some(environment.to_string()),
            service_name: Some(service.to_string()),
            ..Self::default()
        }
    }
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TopologyConfig::default();
        assert_eq!(config.queue_retention_secs, 1_209_600);
        assert_eq!(config.queue_visibility_timeout_secs, 30);
        assert_eq!(config.queue_poll_wait_secs, 20);
        assert_eq!(config.dlq_max_receive_count, 5);
        assert!(config.environment_name.is_none());
    }

    #[test]
    fn test_for_service() {
        let config = TopologyConfig::for_service("dev", "billing");
        assert_eq!(config.environment_name.as_deref(), Some("dev"));
        assert_eq!(config.service_name.as_deref(), Some("billing"));
    }
}
