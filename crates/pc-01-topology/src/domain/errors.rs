//! Error types for topology provisioning

use shared_bus::BrokerError;
use thiserror::Error;

use crate::domain::entities::{NameKind, ResourceKind};

/// All errors that can occur while provisioning
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// Name fails length or charset validation; raised before any broker call
    #[error("Invalid {kind} name {name:?}: expected 1-{max} characters of [A-Za-z0-9_-]")]
    InvalidName {
        kind: NameKind,
        name: String,
        max: usize,
    },

    /// Lookup returned nothing
    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },

    /// Broker failure, propagated verbatim
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Subscription group names no topics")]
    EmptySubscriptionGroup,

    #[error("Policy document could not be encoded: {0}")]
    Policy(String),
}

impl TopologyError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }
}
