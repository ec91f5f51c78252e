//! # PC-01: Topology Provisioning
//!
//! Provisions messaging topology on a managed pub/sub broker: topics,
//! queues, the per-service dead-letter queue, and filtered subscriptions
//! between them.
//!
//! ## Architecture
//!
//! - **Domain**: name qualification, the topic id cache, queue policies
//! - **Ports**: Inbound ([`TopologyApi`]); outbound is [`shared_bus::Broker`]
//! - **Application**: [`BrokerProvisioner`]
//!
//! ## Naming
//!
//! | Resource | Qualified name |
//! |----------|----------------|
//! | Topic | `{env}_{topic}` |
//! | Queue | `{env}_{topic}_{service}_{queue}` |
//! | Multi-topic queue | `{env}_multipleTopics_{service}_{queue}` |
//! | Dead-letter queue | `{env}_{service}_DLQ` |
//!
//! ## Idempotency
//!
//! Re-running any provisioning step is safe: topic creation is idempotent
//! at the broker, queues are created by name, and `subscribe` checks for an
//! existing subscription before creating one. Two processes subscribing the
//! same pair at the same moment can still both create one.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::service::BrokerProvisioner;
pub use config::TopologyConfig;
pub use domain::cache::TopologyCache;
pub use domain::entities::*;
pub use domain::errors::TopologyError;
pub use domain::naming::{validate_name, NameQualifier, MULTI_TOPIC_SENTINEL, UNKNOWN_SERVICE};
pub use domain::policy::{AccessPolicy, RedrivePolicy};
pub use ports::inbound::TopologyApi;
