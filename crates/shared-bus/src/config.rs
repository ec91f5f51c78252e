//! Broker connection settings from environment variables.

use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_PAGE_SIZE;

/// Which broker adapter to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerProvider {
    /// In-process broker.
    Memory,
    /// Managed cloud broker (adapter supplied by the host).
    Aws,
}

impl BrokerProvider {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "aws" => Self::Aws,
            _ => Self::Memory,
        }
    }
}

impl fmt::Display for BrokerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Aws => write!(f, "aws"),
        }
    }
}

/// Connection settings for the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    pub provider: BrokerProvider,
    pub region: String,
    pub account_id: String,
    /// Bucket holding provider credentials, when the provider needs one.
    pub secret_bucket: Option<String>,
    /// Page size for topic and subscription listings.
    pub list_page_size: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            provider: BrokerProvider::Memory,
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
            secret_bucket: None,
            list_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl BrokerSettings {
    /// Create settings from environment variables.
    ///
    /// - `PC_ENV_PROVIDER`: `memory` or `aws` (default: memory)
    /// - `PC_REGION`: provider region (default: us-east-1)
    /// - `PC_ACCOUNT_ID`: provider account (default: 000000000000)
    /// - `PC_SECRET_BUCKET`: credentials bucket (default: unset)
    /// - `PC_LIST_PAGE_SIZE`: listing page size (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            provider: env::var("PC_ENV_PROVIDER")
                .map(|v| BrokerProvider::parse(&v))
                .unwrap_or(defaults.provider),
            region: env::var("PC_REGION").unwrap_or(defaults.region),
            account_id: env::var("PC_ACCOUNT_ID").unwrap_or(defaults.account_id),
            secret_bucket: env::var("PC_SECRET_BUCKET").ok().filter(|v| !v.is_empty()),
            list_page_size: env::var("PC_LIST_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(defaults.list_page_size),
        }
    }
}
