//! # Broker Port
//!
//! The control and data plane operations the platform requires from a
//! managed pub/sub provider.
//!
//! Provider guarantees relied upon:
//! - topic creation is idempotent by name (same identifier returned);
//! - attribute updates are atomic per resource;
//! - names longer than the provider's limits are rejected.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::attributes::MessageAttributes;
use crate::errors::BrokerError;

/// One page of a topic listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicPage {
    pub topic_arns: Vec<String>,
    /// Continuation token; `None` once the listing is exhausted.
    pub next_token: Option<String>,
}

/// A subscription as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSummary {
    pub subscription_arn: String,
    pub topic_arn: String,
    pub protocol: String,
    pub endpoint: String,
}

/// One page of a subscription listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionPage {
    pub subscriptions: Vec<SubscriptionSummary>,
    pub next_token: Option<String>,
}

/// A message handed out by a receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: String,
    /// Handle required to delete the message or change its visibility.
    pub receipt_handle: String,
    pub body: String,
    pub attributes: MessageAttributes,
    /// How many times this message has been received, this time included.
    pub receive_count: u32,
}

/// Identifies a broker operation for accounting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerOperation {
    CreateTopic,
    DeleteTopic,
    ListTopics,
    Publish,
    CreateQueue,
    DeleteQueue,
    GetQueueUrl,
    GetQueueAttributes,
    SetQueueAttributes,
    SendMessage,
    ReceiveMessage,
    DeleteMessage,
    ChangeMessageVisibility,
    Subscribe,
    ListSubscriptionsByTopic,
    SetSubscriptionAttributes,
}

impl fmt::Display for BrokerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Managed pub/sub provider.
///
/// Production: a vendor SDK adapter supplied by the host application.
/// Testing: [`InMemoryBroker`](crate::InMemoryBroker).
#[async_trait]
pub trait Broker: Send + Sync {
    // -------------------------------------------------------------------------
    // Topics
    // -------------------------------------------------------------------------

    /// Create a topic, returning its identifier. Idempotent by name.
    async fn create_topic(&self, name: &str) -> Result<String, BrokerError>;

    async fn delete_topic(&self, topic_arn: &str) -> Result<(), BrokerError>;

    /// List topic identifiers one page at a time.
    async fn list_topics(&self, next_token: Option<String>) -> Result<TopicPage, BrokerError>;

    /// Publish a message to every subscription of a topic whose filter matches.
    async fn publish(
        &self,
        topic_arn: &str,
        body: String,
        attributes: MessageAttributes,
    ) -> Result<String, BrokerError>;

    // -------------------------------------------------------------------------
    // Queues
    // -------------------------------------------------------------------------

    /// Create a queue with the given attributes, returning its URL.
    async fn create_queue(
        &self,
        name: &str,
        attributes: HashMap<String, String>,
    ) -> Result<String, BrokerError>;

    async fn delete_queue(&self, queue_url: &str) -> Result<(), BrokerError>;

    /// Look up a queue URL by name. `None` when no such queue exists.
    async fn get_queue_url(&self, name: &str) -> Result<Option<String>, BrokerError>;

    async fn get_queue_attributes(
        &self,
        queue_url: &str,
    ) -> Result<HashMap<String, String>, BrokerError>;

    async fn set_queue_attributes(
        &self,
        queue_url: &str,
        attributes: HashMap<String, String>,
    ) -> Result<(), BrokerError>;

    async fn send_message(
        &self,
        queue_url: &str,
        body: String,
        attributes: MessageAttributes,
    ) -> Result<String, BrokerError>;

    /// Long-poll for up to `max_messages`, waiting at most `wait`.
    async fn receive_messages(
        &self,
        queue_url: &str,
        max_messages: u32,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, BrokerError>;

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str)
        -> Result<(), BrokerError>;

    async fn change_message_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), BrokerError>;

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    /// Subscribe an endpoint to a topic, returning the subscription identifier.
    ///
    /// Providers are not required to deduplicate; callers check first.
    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<String, BrokerError>;

    async fn list_subscriptions_by_topic(
        &self,
        topic_arn: &str,
        next_token: Option<String>,
    ) -> Result<SubscriptionPage, BrokerError>;

    async fn set_subscription_attributes(
        &self,
        subscription_arn: &str,
        name: &str,
        value: &str,
    ) -> Result<(), BrokerError>;
}
