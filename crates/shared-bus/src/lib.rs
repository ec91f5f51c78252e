//! # Shared Bus - Managed Pub/Sub Broker Port
//!
//! The driven port every messaging component talks to, plus the in-memory
//! adapter used for tests and single-process deployments.
//!
//! ## Model
//!
//! ```text
//!   publish()          fan-out (filter policy)        receive()
//! ──────────► [Topic] ─────────────────────────► [Queue] ─────────► consumer
//!                │                                  │
//!                └─► [Queue] ...                    └─► [DLQ] (redrive after
//!                                                        maxReceiveCount)
//! ```
//!
//! - **Control plane:** create/delete/list topics and queues, queue
//!   attributes, subscriptions and their attributes.
//! - **Data plane:** publish, send, long-poll receive, delete, change
//!   visibility.
//!
//! Messages fanned out from a topic are wrapped in a [`Notification`]
//! envelope; consumers decode the envelope first and the application payload
//! second.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod attributes;
pub mod broker;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod filter;
pub mod memory;

use std::sync::Arc;

pub use attributes::{MessageAttribute, MessageAttributes};
pub use broker::{
    Broker, BrokerOperation, ReceivedMessage, SubscriptionPage, SubscriptionSummary, TopicPage,
};
pub use config::{BrokerProvider, BrokerSettings};
pub use envelope::Notification;
pub use errors::BrokerError;
pub use filter::FilterPolicy;
pub use memory::InMemoryBroker;

/// Protocol used for queue endpoints in subscriptions.
pub const QUEUE_PROTOCOL: &str = "sqs";

/// Default page size for topic and subscription listings.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Build the broker adapter selected by the settings.
///
/// Only the in-memory adapter ships with this crate; vendor adapters are
/// provided by the host application and injected directly.
pub fn connect(settings: BrokerSettings) -> Result<Arc<dyn Broker>, BrokerError> {
    match settings.provider {
        BrokerProvider::Memory => Ok(Arc::new(InMemoryBroker::with_settings(settings))),
        other => Err(BrokerError::UnsupportedProvider(other.to_string())),
    }
}
