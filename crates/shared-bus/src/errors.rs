//! Errors surfaced by broker adapters.

use thiserror::Error;

/// Failure reported by the broker transport.
///
/// Provisioning code propagates these verbatim; retry and backoff are the
/// transport client's concern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Queue does not exist: {0}")]
    QueueNotFound(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unsupported broker provider: {0}")]
    UnsupportedProvider(String),
}

impl BrokerError {
    /// Whether the broker reported that the addressed resource is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TopicNotFound(_) | Self::QueueNotFound(_) | Self::SubscriptionNotFound(_)
        )
    }
}
