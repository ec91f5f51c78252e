//! # Subscription Filter Policies
//!
//! A policy is a JSON object mapping attribute names to a condition or an
//! array of conditions. Every key must match (AND); within an array any
//! condition may match (OR).
//!
//! Conditions:
//! - a string, number or boolean: exact match on the attribute value;
//! - `null`: the attribute is absent;
//! - `{"prefix": "abc"}` / `{"suffix": "xyz"}`;
//! - `{"anything-but": value | [values]}`: present and none of the values;
//! - `{"exists": bool}`;
//! - `{"numeric": [">", 0, "<=", 5]}`: every comparison holds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attributes::{MessageAttribute, MessageAttributes};
use crate::errors::BrokerError;

/// A parsed filter policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterPolicy(Map<String, Value>);

impl FilterPolicy {
    pub fn new(conditions: Map<String, Value>) -> Self {
        Self(conditions)
    }

    /// Parse a policy from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, BrokerError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(BrokerError::InvalidParameter(format!(
                "filter policy must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn from_json(policy: &str) -> Result<Self, BrokerError> {
        let value: Value = serde_json::from_str(policy)
            .map_err(|e| BrokerError::InvalidParameter(format!("filter policy: {e}")))?;
        Self::from_value(value)
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a message with these attributes passes the policy.
    pub fn matches(&self, attributes: &MessageAttributes) -> bool {
        self.0.iter().all(|(key, condition)| {
            let attribute = attributes.get(key);
            match condition {
                Value::Array(options) => options.iter().any(|c| condition_matches(c, attribute)),
                single => condition_matches(single, attribute),
            }
        })
    }
}

fn condition_matches(condition: &Value, attribute: Option<&MessageAttribute>) -> bool {
    match condition {
        Value::Null => attribute.is_none(),
        Value::Object(operator) => operator_matches(operator, attribute),
        Value::Array(_) => false,
        exact => attribute.is_some_and(|a| value_equals(exact, a)),
    }
}

fn value_equals(expected: &Value, attribute: &MessageAttribute) -> bool {
    match expected {
        Value::String(s) => attribute.value() == s,
        Value::Bool(b) => attribute.value() == b.to_string(),
        Value::Number(n) => match (n.as_f64(), attribute.as_number()) {
            (Some(want), Some(got)) => (want - got).abs() < f64::EPSILON,
            _ => false,
        },
        _ => false,
    }
}

fn operator_matches(operator: &Map<String, Value>, attribute: Option<&MessageAttribute>) -> bool {
    operator.iter().all(|(name, arg)| match (name.as_str(), arg) {
        ("exists", Value::Bool(should_exist)) => attribute.is_some() == *should_exist,
        ("prefix", Value::String(p)) => attribute.is_some_and(|a| a.value().starts_with(p.as_str())),
        ("suffix", Value::String(s)) => attribute.is_some_and(|a| a.value().ends_with(s.as_str())),
        ("anything-but", Value::Array(excluded)) => {
            attribute.is_some_and(|a| !excluded.iter().any(|e| value_equals(e, a)))
        }
        ("anything-but", excluded) => attribute.is_some_and(|a| !value_equals(excluded, a)),
        ("numeric", Value::Array(ops)) => attribute
            .and_then(MessageAttribute::as_number)
            .is_some_and(|n| numeric_matches(ops, n)),
        _ => false,
    })
}

fn numeric_matches(ops: &[Value], n: f64) -> bool {
    if ops.is_empty() || ops.len() % 2 != 0 {
        return false;
    }
    ops.chunks(2).all(|pair| {
        let (Some(op), Some(bound)) = (pair[0].as_str(), pair[1].as_f64()) else {
            return false;
        };
        match op {
            "=" => (n - bound).abs() < f64::EPSILON,
            ">" => n > bound,
            ">=" => n >= bound,
            "<" => n < bound,
            "<=" => n <= bound,
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, MessageAttribute)]) -> MessageAttributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn s(v: &str) -> MessageAttribute {
        MessageAttribute::String(v.into())
    }

    fn n(v: &str) -> MessageAttribute {
        MessageAttribute::Number(v.into())
    }

    fn policy(value: Value) -> FilterPolicy {
        FilterPolicy::from_value(value).unwrap()
    }

    #[test]
    fn test_scalar_condition() {
        let p = policy(json!({ "type": "created" }));
        assert!(p.matches(&attrs(&[("type", s("created"))])));
        assert!(!p.matches(&attrs(&[("type", s("updated"))])));
        assert!(!p.matches(&attrs(&[])));
    }

    #[test]
    fn test_array_is_or_keys_are_and() {
        let p = policy(json!({ "type": ["created", "deleted"], "realm": ["eu"] }));
        assert!(p.matches(&attrs(&[("type", s("deleted")), ("realm", s("eu"))])));
        assert!(!p.matches(&attrs(&[("type", s("deleted")), ("realm", s("us"))])));
    }

    #[test]
    fn test_numeric_conditions() {
        let p = policy(json!({ "retries": [{ "numeric": [">", 1, "<=", 3] }] }));
        assert!(p.matches(&attrs(&[("retries", n("3"))])));
        assert!(!p.matches(&attrs(&[("retries", n("4"))])));
        assert!(!p.matches(&attrs(&[("retries", s("3"))])));

        let exact = policy(json!({ "retries": [3] }));
        assert!(exact.matches(&attrs(&[("retries", n("3"))])));
    }

    #[test]
    fn test_prefix_anything_but_exists() {
        let p = policy(json!({
            "event": [{ "prefix": "order" }],
            "type": [{ "anything-but": ["deleted"] }],
            "tx": [{ "exists": false }]
        }));
        assert!(p.matches(&attrs(&[("event", s("orderPlaced")), ("type", s("created"))])));
        assert!(!p.matches(&attrs(&[("event", s("orderPlaced")), ("type", s("deleted"))])));
        assert!(!p.matches(&attrs(&[
            ("event", s("orderPlaced")),
            ("type", s("created")),
            ("tx", s("t1"))
        ])));
    }

    #[test]
    fn test_empty_policy_matches_everything() {
        assert!(FilterPolicy::default().matches(&attrs(&[])));
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(FilterPolicy::from_json("[1,2]").is_err());
        assert!(FilterPolicy::from_json("not json").is_err());
    }
}
