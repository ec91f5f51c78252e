//! Domain entities for topology provisioning

use std::fmt;

use shared_bus::FilterPolicy;

use crate::domain::naming::MULTI_TOPIC_SENTINEL;

/// Which kind of logical name is being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Topic,
    Queue,
}

impl NameKind {
    /// Longest permitted logical name.
    pub fn max_len(self) -> usize {
        match self {
            Self::Topic => 24,
            Self::Queue => 16,
        }
    }
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic => write!(f, "topic"),
            Self::Queue => write!(f, "queue"),
        }
    }
}

/// Broker resources a lookup can miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Topic,
    Queue,
    QueueArn,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic => write!(f, "Topic"),
            Self::Queue => write!(f, "Queue"),
            Self::QueueArn => write!(f, "Queue ARN"),
        }
    }
}

/// A queue after provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedQueue {
    pub qualified_name: String,
    pub url: String,
    pub arn: String,
}

/// The service-wide dead-letter queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterQueue {
    pub url: String,
    pub arn: String,
}

/// Result of a subscribe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub arn: String,
    /// False when an existing subscription was reused.
    pub created: bool,
}

/// One queue fed by one or more topics, optionally filtered.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionGroupSpec {
    pub topic_names: Vec<String>,
    pub queue_name: String,
    pub filter: Option<FilterPolicy>,
}

impl SubscriptionGroupSpec {
    pub fn new<I, S>(topic_names: I, queue_name: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topic_names: topic_names.into_iter().map(Into::into).collect(),
            queue_name: queue_name.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: FilterPolicy) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Topic names with repeats dropped, first occurrence order kept.
    pub fn distinct_topic_names(&self) -> Vec<&str> {
        let mut distinct: Vec<&str> = Vec::with_capacity(self.topic_names.len());
        for name in &self.topic_names {
            if !distinct.contains(&name.as_str()) {
                distinct.push(name);
            }
        }
        distinct
    }

    pub fn is_multi_topic(&self) -> bool {
        self.distinct_topic_names().len() > 1
    }

    /// Topic name embedded in the queue's qualified name.
    pub fn queue_topic_name(&self) -> &str {
        match self.distinct_topic_names().as_slice() {
            [single] => single,
            _ => MULTI_TOPIC_SENTINEL,
        }
    }
}

/// Everything a subscription group provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionGroup {
    pub topic_arns: Vec<String>,
    pub queue: ProvisionedQueue,
    pub subscriptions: Vec<Subscription>,
}
