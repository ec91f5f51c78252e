//! Configuration for publishers and consumers

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Messaging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Long-poll wait per receive call (seconds)
    pub consumer_wait_secs: u64,
    /// Pause after a failed receive before polling again (milliseconds)
    pub consumer_error_backoff_ms: u64,
    /// Logical collection the event log is written to
    pub events_collection: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            consumer_wait_secs: 20,
            consumer_error_backoff_ms: 1000,
            events_collection: "events".to_string(),
        }
    }
}

impl MessagingConfig {
    /// Create configuration from environment variables.
    ///
    /// - `PC_CONSUMER_WAIT_SECS` (default: 20)
    /// - `PC_CONSUMER_ERROR_BACKOFF_MS` (default: 1000)
    /// - `PC_EVENTS_COLLECTION` (default: events)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            consumer_wait_secs: env::var("PC_CONSUMER_WAIT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.consumer_wait_secs),
            consumer_error_backoff_ms: env::var("PC_CONSUMER_ERROR_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.consumer_error_backoff_ms),
            events_collection: env::var("PC_EVENTS_COLLECTION")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.events_collection),
        }
    }

    pub fn consumer_wait(&self) -> Duration {
        Duration::from_secs(self.consumer_wait_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.consumer_error_backoff_ms)
    }
}
