//! # In-Memory Broker
//!
//! A single-process broker with the semantics the platform depends on:
//! idempotent topic creation, paginated listings, filter-policy fan-out in a
//! [`Notification`] envelope, long-poll receive, visibility timeouts and
//! redrive to a dead-letter queue.
//!
//! Like the managed service it stands in for, `subscribe` does not
//! deduplicate: subscribing the same endpoint twice yields two
//! subscriptions. Callers are expected to check before subscribing.
//!
//! Every call is counted per [`BrokerOperation`] and any operation can be
//! made to fail, so tests can assert on broker traffic.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::attributes::{queue as queue_attr, subscription as sub_attr, MessageAttributes};
use crate::broker::{
    Broker, BrokerOperation, ReceivedMessage, SubscriptionPage, SubscriptionSummary, TopicPage,
};
use crate::config::BrokerSettings;
use crate::envelope::Notification;
use crate::errors::BrokerError;
use crate::filter::FilterPolicy;

/// Longest single wait inside a long poll before re-checking the queue.
const POLL_SLICE: Duration = Duration::from_millis(50);

/// Default visibility timeout when a queue does not configure one.
const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 30;

/// Provider name limits.
const MAX_TOPIC_NAME_LEN: usize = 256;
const MAX_QUEUE_NAME_LEN: usize = 80;

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
    attributes: MessageAttributes,
    receive_count: u32,
}

#[derive(Debug)]
struct InFlight {
    message: StoredMessage,
    visible_at: Instant,
}

#[derive(Debug)]
struct QueueRecord {
    arn: String,
    attributes: HashMap<String, String>,
    ready: VecDeque<StoredMessage>,
    in_flight: HashMap<String, InFlight>,
    notify: Arc<Notify>,
}

impl QueueRecord {
    fn visibility_timeout(&self) -> Duration {
        let secs = self
            .attributes
            .get(queue_attr::VISIBILITY_TIMEOUT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    fn redrive(&self) -> Option<RedrivePolicy> {
        self.attributes
            .get(queue_attr::REDRIVE_POLICY)
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// Return messages whose visibility timeout lapsed to the ready list.
    fn release_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        for receipt in expired {
            if let Some(flight) = self.in_flight.remove(&receipt) {
                self.ready.push_front(flight.message);
            }
        }
    }

    fn push(&mut self, message: StoredMessage) {
        self.ready.push_back(message);
        self.notify.notify_one();
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedrivePolicy {
    dead_letter_target_arn: String,
    #[serde(deserialize_with = "number_or_string")]
    max_receive_count: u32,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone)]
struct SubscriptionRecord {
    topic_arn: String,
    protocol: String,
    endpoint: String,
    attributes: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct BrokerState {
    /// topic arn -> topic name
    topics: BTreeMap<String, String>,
    /// queue url -> queue
    queues: HashMap<String, QueueRecord>,
    /// queue name -> queue url
    queue_urls: HashMap<String, String>,
    /// subscription arn -> subscription
    subscriptions: BTreeMap<String, SubscriptionRecord>,
}

impl BrokerState {
    fn queue_mut(&mut self, url: &str) -> Result<&mut QueueRecord, BrokerError> {
        self.queues
            .get_mut(url)
            .ok_or_else(|| BrokerError::QueueNotFound(url.to_string()))
    }

    fn queue_url_by_arn(&self, arn: &str) -> Option<String> {
        self.queues
            .iter()
            .find(|(_, q)| q.arn == arn)
            .map(|(url, _)| url.clone())
    }

    /// Hand out up to `max` visible messages, redriving over-received ones.
    fn take_visible(&mut self, url: &str, max: usize) -> Result<Vec<ReceivedMessage>, BrokerError> {
        let now = Instant::now();
        let queue = self.queue_mut(url)?;
        queue.release_expired(now);
        let redrive = queue.redrive();
        let visibility = queue.visibility_timeout();

        let mut delivered = Vec::new();
        let mut dead_lettered = Vec::new();
        while delivered.len() < max {
            let Some(mut message) = queue.ready.pop_front() else {
                break;
            };
            if let Some(policy) = &redrive {
                if message.receive_count >= policy.max_receive_count {
                    dead_lettered.push(message);
                    continue;
                }
            }
            message.receive_count += 1;
            let receipt_handle = Uuid::new_v4().to_string();
            delivered.push(ReceivedMessage {
                message_id: message.message_id.clone(),
                receipt_handle: receipt_handle.clone(),
                body: message.body.clone(),
                attributes: message.attributes.clone(),
                receive_count: message.receive_count,
            });
            queue.in_flight.insert(
                receipt_handle,
                InFlight {
                    message,
                    visible_at: now + visibility,
                },
            );
        }

        if let (Some(policy), false) = (redrive, dead_lettered.is_empty()) {
            match self.queue_url_by_arn(&policy.dead_letter_target_arn) {
                Some(dlq_url) => {
                    if let Some(dlq) = self.queues.get_mut(&dlq_url) {
                        debug!(
                            queue = url,
                            count = dead_lettered.len(),
                            "Redriving messages to dead-letter queue"
                        );
                        for message in dead_lettered {
                            dlq.push(message);
                        }
                    }
                }
                None => warn!(
                    queue = url,
                    target = %policy.dead_letter_target_arn,
                    "Dead-letter target missing, dropping messages"
                ),
            }
        }

        Ok(delivered)
    }
}

/// In-memory implementation of the [`Broker`] port.
pub struct InMemoryBroker {
    settings: BrokerSettings,
    state: Mutex<BrokerState>,
    calls: Mutex<HashMap<BrokerOperation, usize>>,
    failures: Mutex<HashMap<BrokerOperation, BrokerError>>,
}

impl InMemoryBroker {
    /// Create a broker with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(BrokerSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: BrokerSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(BrokerState::default()),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Number of times an operation has been invoked.
    pub fn call_count(&self, operation: BrokerOperation) -> usize {
        self.calls.lock().get(&operation).copied().unwrap_or(0)
    }

    /// Number of invocations across all operations.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Make every subsequent call of `operation` fail with `error`.
    pub fn fail(&self, operation: BrokerOperation, error: BrokerError) {
        self.failures.lock().insert(operation, error);
    }

    /// Stop injecting failures for `operation`.
    pub fn clear_failure(&self, operation: BrokerOperation) {
        self.failures.lock().remove(&operation);
    }

    /// All subscriptions of a topic, without counting as a broker call.
    pub fn subscriptions_of(&self, topic_arn: &str) -> Vec<SubscriptionSummary> {
        self.state
            .lock()
            .subscriptions
            .iter()
            .filter(|(_, s)| s.topic_arn == topic_arn)
            .map(|(arn, s)| summary(arn, s))
            .collect()
    }

    /// A subscription attribute, without counting as a broker call.
    pub fn subscription_attribute(&self, subscription_arn: &str, name: &str) -> Option<String> {
        self.state
            .lock()
            .subscriptions
            .get(subscription_arn)
            .and_then(|s| s.attributes.get(name).cloned())
    }

    /// Messages waiting (visible or in flight) on a queue.
    pub fn queue_depth(&self, queue_url: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue_url)
            .map(|q| q.ready.len() + q.in_flight.len())
            .unwrap_or(0)
    }

    fn record(&self, operation: BrokerOperation) -> Result<(), BrokerError> {
        *self.calls.lock().entry(operation).or_insert(0) += 1;
        match self.failures.lock().get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn arn(&self, service: &str, name: &str) -> String {
        format!(
            "arn:aws:{}:{}:{}:{}",
            service, self.settings.region, self.settings.account_id, name
        )
    }

    fn queue_url(&self, name: &str) -> String {
        format!(
            "https://sqs.{}.amazonaws.com/{}/{}",
            self.settings.region, self.settings.account_id, name
        )
    }

    fn paginate<T: Clone>(&self, items: &[T], token: Option<String>) -> Result<(Vec<T>, Option<String>), BrokerError> {
        let start = match token {
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| BrokerError::InvalidParameter(format!("bad next token: {t}")))?,
            None => 0,
        };
        let page_size = self.settings.list_page_size.max(1);
        let end = (start + page_size).min(items.len());
        let page = items.get(start..end).unwrap_or_default().to_vec();
        let next = (end < items.len()).then(|| end.to_string());
        Ok((page, next))
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

fn summary(arn: &str, s: &SubscriptionRecord) -> SubscriptionSummary {
    SubscriptionSummary {
        subscription_arn: arn.to_string(),
        topic_arn: s.topic_arn.clone(),
        protocol: s.protocol.clone(),
        endpoint: s.endpoint.clone(),
    }
}

fn validate_name(kind: &str, name: &str, max: usize) -> Result<(), BrokerError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if name.is_empty() || name.len() > max || !valid_chars {
        return Err(BrokerError::InvalidParameter(format!(
            "invalid {kind} name: {name:?}"
        )));
    }
    Ok(())
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn create_topic(&self, name: &str) -> Result<String, BrokerError> {
        self.record(BrokerOperation::CreateTopic)?;
        validate_name("topic", name, MAX_TOPIC_NAME_LEN)?;
        let arn = self.arn("sns", name);
        let mut state = self.state.lock();
        if state.topics.insert(arn.clone(), name.to_string()).is_none() {
            debug!(topic = name, "Topic created");
        }
        Ok(arn)
    }

    async fn delete_topic(&self, topic_arn: &str) -> Result<(), BrokerError> {
        self.record(BrokerOperation::DeleteTopic)?;
        let mut state = self.state.lock();
        if state.topics.remove(topic_arn).is_none() {
            return Err(BrokerError::TopicNotFound(topic_arn.to_string()));
        }
        state.subscriptions.retain(|_, s| s.topic_arn != topic_arn);
        Ok(())
    }

    async fn list_topics(&self, next_token: Option<String>) -> Result<TopicPage, BrokerError> {
        self.record(BrokerOperation::ListTopics)?;
        let arns: Vec<String> = self.state.lock().topics.keys().cloned().collect();
        let (topic_arns, next_token) = self.paginate(&arns, next_token)?;
        Ok(TopicPage {
            topic_arns,
            next_token,
        })
    }

    async fn publish(
        &self,
        topic_arn: &str,
        body: String,
        attributes: MessageAttributes,
    ) -> Result<String, BrokerError> {
        self.record(BrokerOperation::Publish)?;
        let message_id = Uuid::new_v4().to_string();
        let mut state = self.state.lock();
        if !state.topics.contains_key(topic_arn) {
            return Err(BrokerError::TopicNotFound(topic_arn.to_string()));
        }

        let targets: Vec<String> = state
            .subscriptions
            .values()
            .filter(|s| s.topic_arn == topic_arn)
            .filter(|s| match s.attributes.get(sub_attr::FILTER_POLICY) {
                Some(raw) => FilterPolicy::from_json(raw)
                    .map(|p| p.matches(&attributes))
                    .unwrap_or(false),
                None => true,
            })
            .map(|s| s.endpoint.clone())
            .collect();

        let envelope = Notification::new(&message_id, topic_arn, body, attributes.clone())
            .to_json()
            .map_err(|e| BrokerError::Transport(e.to_string()))?;

        for endpoint in targets {
            let Some(url) = state.queue_url_by_arn(&endpoint) else {
                warn!(topic = topic_arn, endpoint = %endpoint, "Subscription endpoint missing");
                continue;
            };
            if let Some(queue) = state.queues.get_mut(&url) {
                queue.push(StoredMessage {
                    message_id: Uuid::new_v4().to_string(),
                    body: envelope.clone(),
                    attributes: attributes.clone(),
                    receive_count: 0,
                });
            }
        }
        Ok(message_id)
    }

    async fn create_queue(
        &self,
        name: &str,
        attributes: HashMap<String, String>,
    ) -> Result<String, BrokerError> {
        self.record(BrokerOperation::CreateQueue)?;
        validate_name("queue", name, MAX_QUEUE_NAME_LEN)?;
        let mut state = self.state.lock();
        if let Some(url) = state.queue_urls.get(name) {
            return Ok(url.clone());
        }

        let url = self.queue_url(name);
        let arn = self.arn("sqs", name);
        let mut attrs = attributes;
        attrs.insert(queue_attr::QUEUE_ARN.to_string(), arn.clone());
        state.queues.insert(
            url.clone(),
            QueueRecord {
                arn,
                attributes: attrs,
                ready: VecDeque::new(),
                in_flight: HashMap::new(),
                notify: Arc::new(Notify::new()),
            },
        );
        state.queue_urls.insert(name.to_string(), url.clone());
        debug!(queue = name, "Queue created");
        Ok(url)
    }

    async fn delete_queue(&self, queue_url: &str) -> Result<(), BrokerError> {
        self.record(BrokerOperation::DeleteQueue)?;
        let mut state = self.state.lock();
        if state.queues.remove(queue_url).is_none() {
            return Err(BrokerError::QueueNotFound(queue_url.to_string()));
        }
        state.queue_urls.retain(|_, url| url != queue_url);
        Ok(())
    }

    async fn get_queue_url(&self, name: &str) -> Result<Option<String>, BrokerError> {
        self.record(BrokerOperation::GetQueueUrl)?;
        Ok(self.state.lock().queue_urls.get(name).cloned())
    }

    async fn get_queue_attributes(
        &self,
        queue_url: &str,
    ) -> Result<HashMap<String, String>, BrokerError> {
        self.record(BrokerOperation::GetQueueAttributes)?;
        let mut state = self.state.lock();
        let queue = state.queue_mut(queue_url)?;
        let mut attributes = queue.attributes.clone();
        attributes.insert(
            queue_attr::APPROXIMATE_NUMBER_OF_MESSAGES.to_string(),
            queue.ready.len().to_string(),
        );
        Ok(attributes)
    }

    async fn set_queue_attributes(
        &self,
        queue_url: &str,
        attributes: HashMap<String, String>,
    ) -> Result<(), BrokerError> {
        self.record(BrokerOperation::SetQueueAttributes)?;
        if let Some(raw) = attributes.get(queue_attr::REDRIVE_POLICY) {
            serde_json::from_str::<RedrivePolicy>(raw)
                .map_err(|e| BrokerError::InvalidParameter(format!("redrive policy: {e}")))?;
        }
        let mut state = self.state.lock();
        let queue = state.queue_mut(queue_url)?;
        queue.attributes.extend(attributes);
        Ok(())
    }

    async fn send_message(
        &self,
        queue_url: &str,
        body: String,
        attributes: MessageAttributes,
    ) -> Result<String, BrokerError> {
        self.record(BrokerOperation::SendMessage)?;
        let message_id = Uuid::new_v4().to_string();
        let mut state = self.state.lock();
        state.queue_mut(queue_url)?.push(StoredMessage {
            message_id: message_id.clone(),
            body,
            attributes,
            receive_count: 0,
        });
        Ok(message_id)
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        max_messages: u32,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, BrokerError> {
        self.record(BrokerOperation::ReceiveMessage)?;
        let max = usize::try_from(max_messages.max(1)).unwrap_or(1);
        let deadline = Instant::now() + wait;
        loop {
            let notify = {
                let mut state = self.state.lock();
                let batch = state.take_visible(queue_url, max)?;
                if !batch.is_empty() {
                    return Ok(batch);
                }
                state.queue_mut(queue_url)?.notify.clone()
            };
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let slice = (deadline - now).min(POLL_SLICE);
            let _ = tokio::time::timeout(slice, notify.notified()).await;
        }
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), BrokerError> {
        self.record(BrokerOperation::DeleteMessage)?;
        let mut state = self.state.lock();
        let queue = state.queue_mut(queue_url)?;
        queue.in_flight.remove(receipt_handle).map(|_| ()).ok_or_else(|| {
            BrokerError::InvalidParameter(format!("receipt handle is invalid: {receipt_handle}"))
        })
    }

    async fn change_message_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), BrokerError> {
        self.record(BrokerOperation::ChangeMessageVisibility)?;
        let mut state = self.state.lock();
        let queue = state.queue_mut(queue_url)?;
        let flight = queue.in_flight.get_mut(receipt_handle).ok_or_else(|| {
            BrokerError::InvalidParameter(format!("receipt handle is invalid: {receipt_handle}"))
        })?;
        flight.visible_at = Instant::now() + timeout;
        if timeout.is_zero() {
            queue.notify.notify_one();
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<String, BrokerError> {
        self.record(BrokerOperation::Subscribe)?;
        let mut state = self.state.lock();
        if !state.topics.contains_key(topic_arn) {
            return Err(BrokerError::TopicNotFound(topic_arn.to_string()));
        }
        let arn = format!("{}:{}", topic_arn, Uuid::new_v4());
        state.subscriptions.insert(
            arn.clone(),
            SubscriptionRecord {
                topic_arn: topic_arn.to_string(),
                protocol: protocol.to_string(),
                endpoint: endpoint.to_string(),
                attributes: HashMap::new(),
            },
        );
        Ok(arn)
    }

    async fn list_subscriptions_by_topic(
        &self,
        topic_arn: &str,
        next_token: Option<String>,
    ) -> Result<SubscriptionPage, BrokerError> {
        self.record(BrokerOperation::ListSubscriptionsByTopic)?;
        let all: Vec<SubscriptionSummary> = {
            let state = self.state.lock();
            if !state.topics.contains_key(topic_arn) {
                return Err(BrokerError::TopicNotFound(topic_arn.to_string()));
            }
            state
                .subscriptions
                .iter()
                .filter(|(_, s)| s.topic_arn == topic_arn)
                .map(|(arn, s)| summary(arn, s))
                .collect()
        };
        let (subscriptions, next_token) = self.paginate(&all, next_token)?;
        Ok(SubscriptionPage {
            subscriptions,
            next_token,
        })
    }

    async fn set_subscription_attributes(
        &self,
        subscription_arn: &str,
        name: &str,
        value: &str,
    ) -> Result<(), BrokerError> {
        self.record(BrokerOperation::SetSubscriptionAttributes)?;
        if name == sub_attr::FILTER_POLICY {
            FilterPolicy::from_json(value)?;
        }
        let mut state = self.state.lock();
        let subscription = state
            .subscriptions
            .get_mut(subscription_arn)
            .ok_or_else(|| BrokerError::SubscriptionNotFound(subscription_arn.to_string()))?;
        subscription
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}
