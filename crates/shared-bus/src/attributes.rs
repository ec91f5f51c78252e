//! # Message and Resource Attributes
//!
//! Typed message attributes (the filterable metadata carried next to a
//! message body) and the well-known attribute names for queues and
//! subscriptions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A typed message attribute.
///
/// Numbers travel as their decimal string representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type", content = "Value")]
pub enum MessageAttribute {
    String(String),
    Number(String),
}

impl MessageAttribute {
    /// The attribute's value as transmitted.
    pub fn value(&self) -> &str {
        match self {
            Self::String(v) | Self::Number(v) => v,
        }
    }

    /// The numeric value, if this is a `Number` attribute that parses.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => v.parse().ok(),
            Self::String(_) => None,
        }
    }

    /// The broker's data type label.
    pub fn data_type(&self) -> &'static str {
        match self {
            Self::String(_) => "String",
            Self::Number(_) => "Number",
        }
    }
}

/// Attribute name to attribute, ordered for stable serialization.
pub type MessageAttributes = BTreeMap<String, MessageAttribute>;

/// Well-known queue attribute names.
pub mod queue {
    pub const QUEUE_ARN: &str = "QueueArn";
    pub const POLICY: &str = "Policy";
    pub const REDRIVE_POLICY: &str = "RedrivePolicy";
    pub const MESSAGE_RETENTION_PERIOD: &str = "MessageRetentionPeriod";
    pub const VISIBILITY_TIMEOUT: &str = "VisibilityTimeout";
    pub const RECEIVE_MESSAGE_WAIT_TIME_SECONDS: &str = "ReceiveMessageWaitTimeSeconds";
    pub const APPROXIMATE_NUMBER_OF_MESSAGES: &str = "ApproximateNumberOfMessages";
}

/// Well-known subscription attribute names.
pub mod subscription {
    pub const FILTER_POLICY: &str = "FilterPolicy";
}
