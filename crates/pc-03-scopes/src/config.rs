//! Configuration for the scope store

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scope store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Logical collection holding scope documents
    pub scopes_collection: String,
    /// Logical collection holding lock documents
    pub locks_collection: String,
    /// Idle lifetime of a transaction scope (seconds)
    pub transaction_ttl_secs: u64,
    /// Idle lifetime of a session scope (seconds)
    pub session_ttl_secs: u64,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            scopes_collection: "scopes".to_string(),
            locks_collection: "locks".to_string(),
            transaction_ttl_secs: 60,
            session_ttl_secs: 3600,
        }
    }
}

impl ScopeConfig {
    /// Create configuration from environment variables.
    ///
    /// - `PC_SCOPES_COLLECTION` (default: scopes)
    /// - `PC_LOCKS_COLLECTION` (default: locks)
    /// - `PC_TRANSACTION_TTL_SECS` (default: 60)
    /// - `PC_SESSION_TTL_SECS` (default: 3600)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scopes_collection: env::var("PC_SCOPES_COLLECTION")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.scopes_collection),
            locks_collection: env::var("PC_LOCKS_COLLECTION")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.locks_collection),
            transaction_ttl_secs: env::var("PC_TRANSACTION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.transaction_ttl_secs),
            session_ttl_secs: env::var("PC_SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.session_ttl_secs),
        }
    }

    pub fn transaction_ttl(&self) -> Duration {
        Duration::from_secs(self.transaction_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
