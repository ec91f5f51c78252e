//! # Core Domain Entities
//!
//! - **Namespace**: account + realm, the unit of data isolation.
//! - **Event**: the platform's domain event, published once and persisted as
//!   an immutable document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::RequestContext;
use crate::errors::EventError;

/// Account and realm pair.
///
/// The account selects the database, the realm prefixes every collection:
/// `{realm}.{logicalName}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub account: String,
    pub realm: String,
}

impl Namespace {
    pub fn new(account: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            realm: realm.into(),
        }
    }

    /// Fully qualified collection name for a logical collection.
    pub fn collection(&self, logical_name: &str) -> String {
        format!("{}.{}", self.realm, logical_name)
    }
}

/// A structured domain event.
///
/// Wire shape:
/// `{time, account, realm, service, event, type, username, data, tx?, processId?}`.
/// Any additional top-level fields are preserved in `extra` so they survive a
/// round trip through the broker and can be used for filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
    pub account: String,
    pub realm: String,
    pub service: String,
    pub event: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub username: String,
    #[serde(default = "empty_data")]
    pub data: Value,
    /// Serialized as `null` when absent so the attribute is still visible.
    #[serde(default)]
    pub tx: Option<String>,
    #[serde(default, rename = "processId")]
    pub process_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Top-level names owned by [`Event`]'s named fields.
pub const RESERVED_EVENT_FIELDS: &[&str] = &[
    "time", "account", "realm", "service", "event", "type", "username", "data", "tx", "processId",
];

fn empty_data() -> Value {
    Value::Object(Map::new())
}

impl Event {
    /// Start building an event with the given name and type.
    pub fn builder(event: impl Into<String>, event_type: impl Into<String>) -> EventBuilder {
        EventBuilder::new(event, event_type)
    }

    /// Start building an event whose identity fields come from a request.
    ///
    /// Account, realm and username are taken from the context, as are the
    /// transaction and process identifiers when present.
    pub fn from_context(
        ctx: &RequestContext,
        service: impl Into<String>,
        event: impl Into<String>,
        event_type: impl Into<String>,
    ) -> EventBuilder {
        let mut builder = EventBuilder::new(event, event_type)
            .account(ctx.account.clone())
            .realm(ctx.realm.clone())
            .username(ctx.username.clone())
            .service(service);
        if let Some(tx) = ctx.transaction_id() {
            builder = builder.tx(tx);
        }
        if let Some(pid) = ctx.process_id() {
            builder = builder.process_id(pid);
        }
        builder
    }

    /// Reject extra fields that would shadow a named field on the wire.
    pub fn check_extra_fields(&self) -> Result<(), EventError> {
        match self
            .extra
            .keys()
            .find(|k| RESERVED_EVENT_FIELDS.contains(&k.as_str()))
        {
            Some(name) => Err(EventError::ReservedField(name.clone())),
            None => Ok(()),
        }
    }

    /// Namespace the event belongs to.
    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.account.clone(), self.realm.clone())
    }

    /// Decode an event from its JSON body.
    pub fn from_json(body: &str) -> Result<Self, EventError> {
        serde_json::from_str(body).map_err(|e| EventError::Malformed(e.to_string()))
    }

    /// Serialize the event to its JSON body.
    pub fn to_json(&self) -> Result<String, EventError> {
        serde_json::to_string(self).map_err(|e| EventError::Malformed(e.to_string()))
    }
}

/// Builder enforcing the required event fields.
#[derive(Debug, Clone, Default)]
pub struct EventBuilder {
    time: Option<DateTime<Utc>>,
    account: String,
    realm: String,
    service: String,
    event: String,
    event_type: String,
    username: String,
    data: Option<Value>,
    tx: Option<String>,
    process_id: Option<String>,
    extra: Map<String, Value>,
}

impl EventBuilder {
    pub fn new(event: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    #[must_use]
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    #[must_use]
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn tx(mut self, tx: impl Into<String>) -> Self {
        self.tx = Some(tx.into());
        self
    }

    #[must_use]
    pub fn process_id(mut self, process_id: impl Into<String>) -> Self {
        self.process_id = Some(process_id.into());
        self
    }

    /// Attach an additional top-level field. Names in
    /// [`RESERVED_EVENT_FIELDS`] are rejected by [`build`](Self::build).
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Validate required fields and produce the event.
    ///
    /// `time` defaults to now and `data` to an empty object.
    pub fn build(self) -> Result<Event, EventError> {
        let required = [
            ("account", &self.account),
            ("realm", &self.realm),
            ("service", &self.service),
            ("event", &self.event),
            ("type", &self.event_type),
            ("username", &self.username),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.is_empty()) {
            return Err(EventError::MissingField(*name));
        }

        let event = Event {
            time: self.time.unwrap_or_else(Utc::now),
            account: self.account,
            realm: self.realm,
            service: self.service,
            event: self.event,
            event_type: self.event_type,
            username: self.username,
            data: self.data.unwrap_or_else(empty_data),
            tx: self.tx,
            process_id: self.process_id,
            extra: self.extra,
        };
        event.check_extra_fields()?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> EventBuilder {
        Event::builder("order", "created")
            .account("acme")
            .realm("eu")
            .service("orders")
            .username("alice")
    }

    #[test]
    fn test_build_defaults() {
        let before = Utc::now();
        let event = sample().build().unwrap();
        assert!(event.time >= before);
        assert_eq!(event.data, json!({}));
        assert!(event.tx.is_none());
    }

    #[test]
    fn test_missing_required_field() {
        let result = Event::builder("order", "created").account("acme").build();
        assert_eq!(result.unwrap_err(), EventError::MissingField("realm"));

        let result = sample().username("").build();
        assert_eq!(result.unwrap_err(), EventError::MissingField("username"));
    }

    #[test]
    fn test_extra_field_cannot_shadow_named_field() {
        for name in ["type", "processId", "data"] {
            let result = sample().field(name, json!("spoofed")).build();
            assert_eq!(result.unwrap_err(), EventError::ReservedField(name.to_string()));
        }

        let event = sample().field("priority", json!("high")).build().unwrap();
        let decoded = Event::from_json(&event.to_json().unwrap()).unwrap();
        assert_eq!(decoded.event_type, "created");
        assert_eq!(decoded.extra.get("priority"), Some(&json!("high")));
    }

    #[test]
    fn test_wire_shape() {
        let event = sample().tx("t-1").field("retries", json!(3)).build().unwrap();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "created");
        assert_eq!(value["tx"], "t-1");
        assert_eq!(value["processId"], Value::Null);
        assert_eq!(value["retries"], 3);
        assert!(value["time"].is_string());
    }

    #[test]
    fn test_decode_fills_defaults() {
        let body = r#"{"account":"acme","realm":"eu","service":"orders","event":"order",
                       "type":"created","username":"alice"}"#;
        let event = Event::from_json(body).unwrap();
        assert_eq!(event.data, json!({}));
        assert!(event.extra.is_empty());
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(matches!(
            Event::from_json(r#"{"account":"acme"}"#),
            Err(EventError::Malformed(_))
        ));
    }

    #[test]
    fn test_from_context() {
        let ctx = RequestContext::new("acme", "eu", "bob")
            .with_header(crate::TRANSACTION_HEADER, "tx-9")
            .with_header(crate::PROCESS_HEADER, "proc-1");
        let event = Event::from_context(&ctx, "billing", "invoice", "issued")
            .build()
            .unwrap();
        assert_eq!(event.username, "bob");
        assert_eq!(event.tx.as_deref(), Some("tx-9"));
        assert_eq!(event.process_id.as_deref(), Some("proc-1"));
        assert_eq!(event.namespace(), Namespace::new("acme", "eu"));
    }
}
