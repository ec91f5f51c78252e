//! # Notification Envelope
//!
//! Topic fan-out wraps the published body in this envelope before placing
//! it on a subscribed queue. The application payload is the `Message` field,
//! still serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::MessageAttributes;

/// Envelope type marker for topic deliveries.
pub const NOTIFICATION_TYPE: &str = "Notification";

/// Outer envelope of a message delivered from a topic to a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Notification {
    #[serde(rename = "Type")]
    pub kind: String,
    pub message_id: String,
    pub topic_arn: String,
    /// The published body, verbatim.
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message_attributes: MessageAttributes,
}

impl Notification {
    pub fn new(
        message_id: impl Into<String>,
        topic_arn: impl Into<String>,
        message: impl Into<String>,
        message_attributes: MessageAttributes,
    ) -> Self {
        Self {
            kind: NOTIFICATION_TYPE.to_string(),
            message_id: message_id.into(),
            topic_arn: topic_arn.into(),
            message: message.into(),
            timestamp: Utc::now(),
            message_attributes,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}
