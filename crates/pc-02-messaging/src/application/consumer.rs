//! Queue Consumer
//!
//! One background task per consumed queue. Each cycle long-polls for a
//! single message, deletes it, decodes the notification envelope and the
//! event inside, and hands the event to the handler.
//!
//! Delivery is at most once: the message is deleted before the handler
//! runs, so a handler failure loses the message. Nothing stops the loop
//! short of aborting its task.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use pc_01_topology::TopologyApi;
use platform_telemetry::{log_event, metric_inc, CONSUMER_FAILURES, MESSAGES_RECEIVED};
use shared_bus::{Broker, Notification, ReceivedMessage};
use shared_types::Event;
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument, Span};

use crate::config::MessagingConfig;
use crate::domain::errors::MessagingError;
use crate::ports::outbound::EventHandler;

const COMPONENT: &str = "consumer";

/// Starts consumer loops for queues resolved through the topology.
pub struct QueueConsumer {
    topology: Arc<dyn TopologyApi>,
    broker: Arc<dyn Broker>,
    config: MessagingConfig,
}

impl QueueConsumer {
    pub fn new(
        topology: Arc<dyn TopologyApi>,
        broker: Arc<dyn Broker>,
        config: MessagingConfig,
    ) -> Self {
        Self {
            topology,
            broker,
            config,
        }
    }

    /// Resolve the queue once and start polling it.
    ///
    /// For a queue fed by several topics pass the multi-topic sentinel as
    /// `topic_name`.
    pub async fn start(
        &self,
        topic_name: &str,
        queue_name: &str,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> Result<ConsumerHandle, MessagingError> {
        let handler = handler.ok_or(MessagingError::MissingHandler)?;
        let queue_url = self.topology.get_queue_url(topic_name, queue_name).await?;

        let cycles = Arc::new(AtomicU64::new(0));
        let poller = Poller {
            broker: Arc::clone(&self.broker),
            queue_url: queue_url.clone(),
            handler,
            wait: self.config.consumer_wait(),
            error_backoff: self.config.error_backoff(),
            cycles: Arc::clone(&cycles),
        };
        let span = info_span!("consumer", topic = %topic_name, queue = %queue_name);
        let task = tokio::spawn(poller.run().instrument(span));

        log_event!(info, COMPONENT, "Consumer started", queue_url = %queue_url);
        Ok(ConsumerHandle {
            queue_url,
            cycles,
            task,
        })
    }
}

/// Handle to a running consumer loop.
///
/// Dropping the handle leaves the loop running.
#[derive(Debug)]
pub struct ConsumerHandle {
    queue_url: String,
    cycles: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Receive calls issued so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop. A message being handled at that moment is lost.
    pub fn abort(&self) {
        self.task.abort();
    }
}

struct Poller {
    broker: Arc<dyn Broker>,
    queue_url: String,
    handler: Arc<dyn EventHandler>,
    wait: Duration,
    error_backoff: Duration,
    cycles: Arc<AtomicU64>,
}

impl Poller {
    async fn run(self) {
        loop {
            self.cycles.fetch_add(1, Ordering::Relaxed);
            match self.broker.receive_messages(&self.queue_url, 1, self.wait).await {
                Ok(messages) => {
                    for message in messages {
                        self.process(message).await;
                    }
                }
                Err(e) => {
                    metric_inc!(CONSUMER_FAILURES, &["receive"]);
                    log_event!(warn, COMPONENT, "Receive failed", error = %e);
                    tokio::time::sleep(self.error_backoff).await;
                }
            }
            // An empty zero-wait poll completes without suspending.
            tokio::task::yield_now().await;
        }
    }

    async fn process(&self, message: ReceivedMessage) {
        metric_inc!(MESSAGES_RECEIVED);

        if let Err(e) = self
            .broker
            .delete_message(&self.queue_url, &message.receipt_handle)
            .await
        {
            metric_inc!(CONSUMER_FAILURES, &["delete"]);
            log_event!(
                warn,
                COMPONENT,
                "Failed to delete message",
                message_id = %message.message_id,
                error = %e
            );
        }

        let event = match decode_event(&message.body) {
            Ok(event) => event,
            Err(e) => {
                metric_inc!(CONSUMER_FAILURES, &["decode"]);
                log_event!(
                    warn,
                    COMPONENT,
                    "Dropping undecodable message",
                    message_id = %message.message_id,
                    error = %e
                );
                return;
            }
        };

        let outcome = AssertUnwindSafe(self.handler.handle(event)).catch_unwind().await;
        match outcome {
            Ok(Ok(())) => {
                log_event!(debug, COMPONENT, "Message handled", message_id = %message.message_id);
            }
            Ok(Err(e)) => {
                metric_inc!(CONSUMER_FAILURES, &["handler"]);
                log_event!(
                    error,
                    COMPONENT,
                    "Handler failed",
                    message_id = %message.message_id,
                    error = %e
                );
            }
            Err(_) => {
                metric_inc!(CONSUMER_FAILURES, &["panic"]);
                log_event!(error, COMPONENT, "Handler panicked", message_id = %message.message_id);
            }
        }
    }
}

/// Unwrap a topic notification and decode the event it carries.
///
/// A body sent straight to the queue, without an envelope, is decoded as
/// the event itself.
pub fn decode_event(body: &str) -> Result<Event, MessagingError> {
    let inner = match Notification::from_json(body) {
        Ok(notification) => notification.message,
        Err(_) => body.to_string(),
    };
    Event::from_json(&inner).map_err(|e| MessagingError::Decode(e.to_string()))
}
