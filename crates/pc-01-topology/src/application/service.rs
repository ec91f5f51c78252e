//! Broker Provisioner
//!
//! Main service implementing [`TopologyApi`] on top of a [`Broker`].
//!
//! The provisioner owns its name qualifier, its topic id cache and the
//! service's dead-letter queue handle, so independent provisioners never
//! share state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use platform_telemetry::{
    log_event, metric_inc, QUEUES_CREATED, SUBSCRIPTIONS, TOPICS_CREATED, TOPIC_LOOKUPS,
};
use shared_bus::attributes::{queue as queue_attr, subscription as sub_attr};
use shared_bus::{Broker, FilterPolicy, QUEUE_PROTOCOL};
use tokio::sync::OnceCell;
use tracing::{debug, info_span, Instrument, Span};

use crate::config::TopologyConfig;
use crate::domain::cache::TopologyCache;
use crate::domain::entities::{
    DeadLetterQueue, ProvisionedQueue, ResourceKind, Subscription, SubscriptionGroup,
    SubscriptionGroupSpec,
};
use crate::domain::errors::TopologyError;
use crate::domain::naming::{NameQualifier, MULTI_TOPIC_SENTINEL};
use crate::domain::policy::{topic_arn_pattern, AccessPolicy, RedrivePolicy};
use crate::ports::inbound::TopologyApi;

const COMPONENT: &str = "topology";

/// Broker Provisioner
///
/// Creates and resolves topics, queues, the dead-letter queue and
/// subscriptions. Names are validated before any broker call.
pub struct BrokerProvisioner {
    broker: Arc<dyn Broker>,
    config: TopologyConfig,
    names: NameQualifier,
    cache: TopologyCache,
    dead_letter: OnceCell<DeadLetterQueue>,
    span: Span,
}

impl BrokerProvisioner {
    pub fn new(broker: Arc<dyn Broker>, config: TopologyConfig) -> Self {
        let names = NameQualifier::from_config(&config);
        let span = info_span!(
            "topology",
            environment = %names.environment_id(),
            service = %names.service_id()
        );
        Self {
            broker,
            config,
            names,
            cache: TopologyCache::new(),
            dead_letter: OnceCell::new(),
            span,
        }
    }

    /// Replace the span every operation is recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn names(&self) -> &NameQualifier {
        &self.names
    }

    pub fn cache(&self) -> &TopologyCache {
        &self.cache
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    fn queue_attributes(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                queue_attr::MESSAGE_RETENTION_PERIOD.to_string(),
                self.config.queue_retention_secs.to_string(),
            ),
            (
                queue_attr::VISIBILITY_TIMEOUT.to_string(),
                self.config.queue_visibility_timeout_secs.to_string(),
            ),
            (
                queue_attr::RECEIVE_MESSAGE_WAIT_TIME_SECONDS.to_string(),
                self.config.queue_poll_wait_secs.to_string(),
            ),
        ])
    }

    async fn queue_arn(&self, queue_url: &str) -> Result<String, TopologyError> {
        let mut attributes = self.broker.get_queue_attributes(queue_url).await?;
        attributes
            .remove(queue_attr::QUEUE_ARN)
            .ok_or_else(|| TopologyError::not_found(ResourceKind::QueueArn, queue_url))
    }

    /// The service-wide DLQ, created on first use.
    async fn dead_letter_queue(&self) -> Result<DeadLetterQueue, TopologyError> {
        let dlq = self
            .dead_letter
            .get_or_try_init(|| async {
                let name = self.names.dead_letter_queue_name();
                let attributes = HashMap::from([(
                    queue_attr::MESSAGE_RETENTION_PERIOD.to_string(),
                    self.config.queue_retention_secs.to_string(),
                )]);
                let url = self.broker.create_queue(&name, attributes).await?;
                let arn = self.queue_arn(&url).await?;
                log_event!(info, COMPONENT, "Dead-letter queue ready", queue = %name);
                Ok::<_, TopologyError>(DeadLetterQueue { url, arn })
            })
            .await?;
        Ok(dlq.clone())
    }

    /// Existing subscription of `queue_arn` to `topic_arn`, across all pages.
    async fn find_subscription(
        &self,
        topic_arn: &str,
        queue_arn: &str,
    ) -> Result<Option<String>, TopologyError> {
        let mut token = None;
        loop {
            let page = self
                .broker
                .list_subscriptions_by_topic(topic_arn, token)
                .await?;
            if let Some(found) = page
                .subscriptions
                .into_iter()
                .find(|s| s.endpoint == queue_arn)
            {
                return Ok(Some(found.subscription_arn));
            }
            match page.next_token {
                Some(next) => token = Some(next),
                None => return Ok(None),
            }
        }
    }

    /// Validate, then resolve topic and queue identifiers concurrently.
    async fn resolve_subscription_ends(
        &self,
        topic_name: &str,
        queue_name: &str,
        multi_topic: bool,
    ) -> Result<(String, String), TopologyError> {
        let queue_topic = if multi_topic {
            MULTI_TOPIC_SENTINEL
        } else {
            topic_name
        };
        self.names.qualify_topic(topic_name)?;
        self.names.qualify_queue(queue_topic, queue_name)?;
        tokio::try_join!(
            self.get_topic_id(topic_name),
            self.get_queue_id(queue_topic, queue_name)
        )
    }
}

#[async_trait]
impl TopologyApi for BrokerProvisioner {
    async fn create_topic(&self, topic_name: &str) -> Result<String, TopologyError> {
        async {
            let qualified = self.names.qualify_topic(topic_name)?;
            let topic_arn = self.broker.create_topic(&qualified).await?;
            self.cache.put_topic_id(topic_name, topic_arn.clone());
            metric_inc!(TOPICS_CREATED);
            log_event!(info, COMPONENT, "Topic created", topic = %qualified);
            Ok::<_, TopologyError>(topic_arn)
        }
        .instrument(self.span.clone())
        .await
    }

    async fn ensure_topic(&self, topic_name: &str) -> Result<String, TopologyError> {
        match self.cache.get_topic_id(topic_name) {
            Some(topic_arn) => Ok(topic_arn),
            None => self.create_topic(topic_name).await,
        }
    }

    async fn delete_topic(&self, topic_name: &str) -> Result<(), TopologyError> {
        async {
            let topic_arn = self.get_topic_id(topic_name).await?;
            self.broker.delete_topic(&topic_arn).await?;
            log_event!(info, COMPONENT, "Topic deleted", topic = %topic_arn);
            Ok::<_, TopologyError>(())
        }
        .instrument(self.span.clone())
        .await
    }

    async fn get_topic_id(&self, topic_name: &str) -> Result<String, TopologyError> {
        async {
            let qualified = self.names.qualify_topic(topic_name)?;
            if let Some(topic_arn) = self.cache.get_topic_id(topic_name) {
                metric_inc!(TOPIC_LOOKUPS, &["cache"]);
                return Ok(topic_arn);
            }

            let mut token = None;
            loop {
                let page = self.broker.list_topics(token).await?;
                let hit = page
                    .topic_arns
                    .into_iter()
                    .find(|arn| arn.rsplit(':').next() == Some(qualified.as_str()));
                if let Some(topic_arn) = hit {
                    self.cache.put_topic_id(topic_name, topic_arn.clone());
                    metric_inc!(TOPIC_LOOKUPS, &["listing"]);
                    debug!(topic = %qualified, "Topic id resolved from listing");
                    return Ok(topic_arn);
                }
                match page.next_token {
                    Some(next) => token = Some(next),
                    None => break,
                }
            }
            Err::<String, _>(TopologyError::not_found(ResourceKind::Topic, qualified))
        }
        .instrument(self.span.clone())
        .await
    }

    async fn create_queue(
        &self,
        topic_name: &str,
        queue_name: &str,
    ) -> Result<ProvisionedQueue, TopologyError> {
        async {
            let qualified = self.names.qualify_queue(topic_name, queue_name)?;
            let topic_pattern = if topic_name == MULTI_TOPIC_SENTINEL {
                self.names.environment_topic_pattern()
            } else {
                self.names.qualify_topic(topic_name)?
            };

            let url = self
                .broker
                .create_queue(&qualified, self.queue_attributes())
                .await?;
            let arn = self.queue_arn(&url).await?;
            let dlq = self.dead_letter_queue().await?;

            let access = AccessPolicy::allow_topics(&arn, topic_arn_pattern(&arn, &topic_pattern));
            let redrive = RedrivePolicy::new(dlq.arn.as_str(), self.config.dlq_max_receive_count);
            let policies = HashMap::from([
                (queue_attr::POLICY.to_string(), access.to_json()?),
                (queue_attr::REDRIVE_POLICY.to_string(), redrive.to_json()?),
            ]);
            self.broker.set_queue_attributes(&url, policies).await?;

            metric_inc!(QUEUES_CREATED);
            log_event!(
                info,
                COMPONENT,
                "Queue provisioned",
                queue = %qualified,
                dead_letter = %dlq.url
            );
            Ok::<_, TopologyError>(ProvisionedQueue {
                qualified_name: qualified,
                url,
                arn,
            })
        }
        .instrument(self.span.clone())
        .await
    }

    async fn delete_queue(&self, topic_name: &str, queue_name: &str) -> Result<(), TopologyError> {
        async {
            let url = self.get_queue_url(topic_name, queue_name).await?;
            self.broker.delete_queue(&url).await?;
            log_event!(info, COMPONENT, "Queue deleted", queue = %url);
            Ok::<_, TopologyError>(())
        }
        .instrument(self.span.clone())
        .await
    }

    async fn get_queue_url(
        &self,
        topic_name: &str,
        queue_name: &str,
    ) -> Result<String, TopologyError> {
        let qualified = self.names.qualify_queue(topic_name, queue_name)?;
        self.broker
            .get_queue_url(&qualified)
            .instrument(self.span.clone())
            .await?
            .ok_or_else(|| TopologyError::not_found(ResourceKind::Queue, qualified))
    }

    async fn get_queue_id(
        &self,
        topic_name: &str,
        queue_name: &str,
    ) -> Result<String, TopologyError> {
        let url = self.get_queue_url(topic_name, queue_name).await?;
        self.queue_arn(&url).instrument(self.span.clone()).await
    }

    async fn subscribe(
        &self,
        topic_name: &str,
        queue_name: &str,
        multi_topic: bool,
    ) -> Result<Subscription, TopologyError> {
        async {
            let (topic_arn, queue_arn) = self
                .resolve_subscription_ends(topic_name, queue_name, multi_topic)
                .await?;

            // The broker does not deduplicate subscriptions.
            if let Some(arn) = self.find_subscription(&topic_arn, &queue_arn).await? {
                metric_inc!(SUBSCRIPTIONS, &["existing"]);
                debug!(topic = %topic_arn, queue = %queue_arn, "Subscription already exists");
                return Ok(Subscription {
                    arn,
                    created: false,
                });
            }

            let arn = self
                .broker
                .subscribe(&topic_arn, QUEUE_PROTOCOL, &queue_arn)
                .await?;
            metric_inc!(SUBSCRIPTIONS, &["created"]);
            log_event!(
                info,
                COMPONENT,
                "Subscription created",
                topic = %topic_arn,
                queue = %queue_arn
            );
            Ok::<_, TopologyError>(Subscription { arn, created: true })
        }
        .instrument(self.span.clone())
        .await
    }

    async fn set_subscription_filter(
        &self,
        topic_name: &str,
        queue_name: &str,
        multi_topic: bool,
        filter: &FilterPolicy,
    ) -> Result<bool, TopologyError> {
        async {
            let (topic_arn, queue_arn) = self
                .resolve_subscription_ends(topic_name, queue_name, multi_topic)
                .await?;
            let Some(subscription_arn) = self.find_subscription(&topic_arn, &queue_arn).await?
            else {
                debug!(topic = %topic_arn, queue = %queue_arn, "No subscription to filter");
                return Ok(false);
            };
            self.broker
                .set_subscription_attributes(
                    &subscription_arn,
                    sub_attr::FILTER_POLICY,
                    &filter.to_json(),
                )
                .await?;
            debug!(subscription = %subscription_arn, "Filter policy attached");
            Ok::<_, TopologyError>(true)
        }
        .instrument(self.span.clone())
        .await
    }

    async fn create_subscription_group(
        &self,
        spec: &SubscriptionGroupSpec,
    ) -> Result<SubscriptionGroup, TopologyError> {
        let topic_names = spec.distinct_topic_names();
        if topic_names.is_empty() {
            return Err(TopologyError::EmptySubscriptionGroup);
        }
        for topic_name in &topic_names {
            self.names.qualify_topic(topic_name)?;
        }
        let queue_topic = spec.queue_topic_name();
        self.names.qualify_queue(queue_topic, &spec.queue_name)?;
        let multi_topic = spec.is_multi_topic();

        async {
            // 1. Topics
            let topic_arns = try_join_all(topic_names.iter().map(|t| self.create_topic(t))).await?;

            // 2. Queue
            let queue = self.create_queue(queue_topic, &spec.queue_name).await?;

            // 3. Subscriptions, one per distinct topic
            let subscriptions = try_join_all(
                topic_names
                    .iter()
                    .map(|t| self.subscribe(t, &spec.queue_name, multi_topic)),
            )
            .await?;

            // 4. Filters
            if let Some(filter) = &spec.filter {
                try_join_all(topic_names.iter().map(|t| {
                    self.set_subscription_filter(t, &spec.queue_name, multi_topic, filter)
                }))
                .await?;
            }

            log_event!(
                info,
                COMPONENT,
                "Subscription group provisioned",
                queue = %queue.qualified_name,
                topics = topic_names.len()
            );
            Ok::<_, TopologyError>(SubscriptionGroup {
                topic_arns,
                queue,
                subscriptions,
            })
        }
        .instrument(self.span.clone())
        .await
    }
}
