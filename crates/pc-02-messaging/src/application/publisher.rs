//! Event Publisher
//!
//! Publishes an event to its topic and then appends it to the account's
//! event log. The topic is created on first publish.

use std::sync::Arc;

use pc_01_topology::TopologyApi;
use platform_telemetry::{log_event, metric_inc, EVENTS_PUBLISHED, PUBLISH_FAILURES};
use serde_json::Value;
use shared_bus::Broker;
use shared_store::{Document, DocumentStore};
use shared_types::{Event, EventError, Namespace};
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument, Span};

use crate::config::MessagingConfig;
use crate::domain::attributes::event_attributes;
use crate::domain::errors::MessagingError;

const COMPONENT: &str = "publisher";

/// Event Publisher
///
/// `publish` never fails the caller: errors are logged and counted.
/// `try_publish` returns them for callers that need to know.
pub struct EventPublisher {
    topology: Arc<dyn TopologyApi>,
    broker: Arc<dyn Broker>,
    store: Arc<dyn DocumentStore>,
    config: MessagingConfig,
    span: Span,
}

impl EventPublisher {
    pub fn new(
        topology: Arc<dyn TopologyApi>,
        broker: Arc<dyn Broker>,
        store: Arc<dyn DocumentStore>,
        config: MessagingConfig,
    ) -> Self {
        Self {
            topology,
            broker,
            store,
            config,
            span: info_span!("publisher"),
        }
    }

    /// Replace the span every publish is recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Publish and persist, returning the broker's message id.
    ///
    /// A failure to persist is reported even though the message was sent.
    pub async fn try_publish(&self, topic_name: &str, event: &Event) -> Result<String, MessagingError> {
        async {
            let document = event_document(event)?;
            let topic_arn = self.topology.ensure_topic(topic_name).await?;
            let message_id = self.send(&topic_arn, event).await?;
            self.store
                .insert_one(&event.namespace(), &self.config.events_collection, document)
                .await?;
            log_event!(
                debug,
                COMPONENT,
                "Event published",
                topic = %topic_name,
                event = %event.event,
                event_type = %event.event_type,
                message_id = %message_id
            );
            Ok::<_, MessagingError>(message_id)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Fire-and-forget publish.
    pub async fn publish(&self, topic_name: &str, event: &Event) {
        if let Err(e) = self.try_publish(topic_name, event).await {
            metric_inc!(PUBLISH_FAILURES);
            log_event!(
                error,
                COMPONENT,
                "Failed to publish event",
                topic = %topic_name,
                event = %event.event,
                error = %e
            );
        }
    }

    /// Publish on a background task.
    pub fn spawn_publish(self: &Arc<Self>, topic_name: impl Into<String>, event: Event) -> JoinHandle<()> {
        let publisher = Arc::clone(self);
        let topic_name = topic_name.into();
        tokio::spawn(async move { publisher.publish(&topic_name, &event).await })
    }

    /// Publish events in order, then persist them with one insert per
    /// namespace. Returns how many were published.
    ///
    /// Stops at the first publish failure; events already sent are still
    /// persisted.
    pub async fn publish_batch(&self, topic_name: &str, events: &[Event]) -> Result<usize, MessagingError> {
        async {
            if events.is_empty() {
                return Ok::<usize, MessagingError>(0);
            }
            let topic_arn = self.topology.ensure_topic(topic_name).await?;

            let mut batches: Vec<(Namespace, Vec<Document>)> = Vec::new();
            let mut failure = None;
            for event in events {
                let sent = match event_document(event) {
                    Ok(document) => self.send(&topic_arn, event).await.map(|_| document),
                    Err(e) => Err(e),
                };
                let document = match sent {
                    Ok(document) => document,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                };
                let namespace = event.namespace();
                match batches.iter_mut().find(|(ns, _)| *ns == namespace) {
                    Some((_, documents)) => documents.push(document),
                    None => batches.push((namespace, vec![document])),
                }
            }

            let published: usize = batches.iter().map(|(_, documents)| documents.len()).sum();
            for (namespace, documents) in batches {
                self.store
                    .insert_many(&namespace, &self.config.events_collection, documents)
                    .await?;
            }
            log_event!(
                debug,
                COMPONENT,
                "Event batch published",
                topic = %topic_name,
                published = published,
                requested = events.len()
            );
            match failure {
                Some(e) => Err(e),
                None => Ok::<_, MessagingError>(published),
            }
        }
        .instrument(self.span.clone())
        .await
    }

    async fn send(&self, topic_arn: &str, event: &Event) -> Result<String, MessagingError> {
        let body = event.to_json()?;
        let attributes = event_attributes(event)?;
        let message_id = self.broker.publish(topic_arn, body, attributes).await?;
        metric_inc!(EVENTS_PUBLISHED);
        Ok(message_id)
    }
}

/// The event as stored in the event log.
fn event_document(event: &Event) -> Result<Document, MessagingError> {
    event.check_extra_fields()?;
    match serde_json::to_value(event).map_err(|e| EventError::Malformed(e.to_string()))? {
        Value::Object(document) => Ok(document),
        _ => Err(EventError::Malformed("event is not an object".to_string()).into()),
    }
}
