//! # Message Attributes
//!
//! Every top-level scalar field of an event is mirrored as a message
//! attribute so subscriptions can filter on it. Nested objects and arrays
//! stay in the body only.

use serde_json::{Map, Value};
use shared_bus::{MessageAttribute, MessageAttributes};
use shared_types::{Event, EventError};

/// Stand-in for empty or missing values, which the broker rejects.
pub const UNDEFINED_ATTRIBUTE_VALUE: &str = "[value is undefined]";

/// Attributes for the top-level fields of an event document.
pub fn to_message_attributes(fields: &Map<String, Value>) -> MessageAttributes {
    fields
        .iter()
        .filter_map(|(name, value)| attribute_for(value).map(|attr| (name.clone(), attr)))
        .collect()
}

/// Attributes for an event, extra fields included.
pub fn event_attributes(event: &Event) -> Result<MessageAttributes, EventError> {
    match serde_json::to_value(event).map_err(|e| EventError::Malformed(e.to_string()))? {
        Value::Object(fields) => Ok(to_message_attributes(&fields)),
        _ => Err(EventError::Malformed("event is not an object".to_string())),
    }
}

fn attribute_for(value: &Value) -> Option<MessageAttribute> {
    match value {
        Value::String(s) if s.is_empty() => Some(undefined()),
        Value::String(s) => Some(MessageAttribute::String(s.clone())),
        Value::Number(n) => Some(MessageAttribute::Number(n.to_string())),
        Value::Bool(b) => Some(MessageAttribute::String(b.to_string())),
        Value::Null => Some(undefined()),
        Value::Object(_) | Value::Array(_) => None,
    }
}

fn undefined() -> MessageAttribute {
    MessageAttribute::String(UNDEFINED_ATTRIBUTE_VALUE.to_string())
}
