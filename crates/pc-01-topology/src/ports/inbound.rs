//! Inbound Ports (Driving Ports / API)

use async_trait::async_trait;
use shared_bus::FilterPolicy;

use crate::domain::entities::{ProvisionedQueue, Subscription, SubscriptionGroup, SubscriptionGroupSpec};
use crate::domain::errors::TopologyError;

/// Topology provisioning API.
///
/// Every operation validates its names before touching the broker, and
/// every operation except deletion is idempotent.
#[async_trait]
pub trait TopologyApi: Send + Sync {
    /// Create a topic, returning its identifier.
    async fn create_topic(&self, topic_name: &str) -> Result<String, TopologyError>;

    /// Cached identifier if known, else create the topic.
    async fn ensure_topic(&self, topic_name: &str) -> Result<String, TopologyError>;

    /// Delete a topic. A topic that no longer exists is an error.
    async fn delete_topic(&self, topic_name: &str) -> Result<(), TopologyError>;

    /// Resolve a topic identifier, from the cache or a full listing.
    async fn get_topic_id(&self, topic_name: &str) -> Result<String, TopologyError>;

    /// Create a queue with its dead-letter redrive and access policies.
    async fn create_queue(
        &self,
        topic_name: &str,
        queue_name: &str,
    ) -> Result<ProvisionedQueue, TopologyError>;

    /// Delete a queue. A queue that no longer exists is an error.
    async fn delete_queue(&self, topic_name: &str, queue_name: &str) -> Result<(), TopologyError>;

    async fn get_queue_url(&self, topic_name: &str, queue_name: &str)
        -> Result<String, TopologyError>;

    /// Resolve a queue's identifier (its ARN).
    async fn get_queue_id(&self, topic_name: &str, queue_name: &str)
        -> Result<String, TopologyError>;

    /// Subscribe a queue to a topic unless already subscribed.
    ///
    /// With `multi_topic` the queue is the one named with the multi-topic
    /// sentinel instead of `topic_name`.
    async fn subscribe(
        &self,
        topic_name: &str,
        queue_name: &str,
        multi_topic: bool,
    ) -> Result<Subscription, TopologyError>;

    /// Attach a filter to an existing subscription.
    ///
    /// Returns `false`, not an error, when there is no subscription.
    async fn set_subscription_filter(
        &self,
        topic_name: &str,
        queue_name: &str,
        multi_topic: bool,
        filter: &FilterPolicy,
    ) -> Result<bool, TopologyError>;

    /// Topics, then the queue, then subscriptions, then filters. The first
    /// failing stage aborts the rest; nothing is rolled back.
    async fn create_subscription_group(
        &self,
        spec: &SubscriptionGroupSpec,
    ) -> Result<SubscriptionGroup, TopologyError>;
}
