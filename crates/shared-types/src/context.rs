//! # Request Context
//!
//! A typed view of the inbound request that platform components read
//! identifiers from. It is assembled once by the HTTP layer and passed by
//! reference; stages that need to add information return an updated copy
//! through the `with_*` builders instead of attaching ad hoc fields.

use std::collections::HashMap;

use serde_json::Value;

use crate::entities::Namespace;

/// Header carrying the transaction identifier.
pub const TRANSACTION_HEADER: &str = "x-transaction-id";

/// Header carrying the long-running process identifier.
pub const PROCESS_HEADER: &str = "x-process-id";

/// Body field a process identifier may be derived from.
pub const PROCESS_BODY_FIELD: &str = "processId";

/// Inbound request information relevant to events and scopes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Account the caller is acting in.
    pub account: String,
    /// Realm inside the account.
    pub realm: String,
    /// Authenticated user name.
    pub username: String,
    /// Request headers, keys normalised to lowercase.
    headers: HashMap<String, String>,
    /// Parsed JSON body, if the request carried one.
    pub body: Option<Value>,
}

impl RequestContext {
    /// Create a context for the given account, realm and user.
    pub fn new(
        account: impl Into<String>,
        realm: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            realm: realm.into(),
            username: username.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Return a copy with an additional header (name is case-insensitive).
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Return a copy carrying a parsed request body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a header by name (case-insensitive). Empty values count as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The transaction identifier from the inbound headers.
    pub fn transaction_id(&self) -> Option<&str> {
        self.header(TRANSACTION_HEADER)
    }

    /// The process identifier, from the header or else the body's `processId`.
    pub fn process_id(&self) -> Option<String> {
        if let Some(id) = self.header(PROCESS_HEADER) {
            return Some(id.to_string());
        }
        match self.body.as_ref()?.get(PROCESS_BODY_FIELD)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The namespace selected by this request.
    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.account.clone(), self.realm.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headers_are_case_insensitive() {
        let ctx = RequestContext::new("acme", "eu", "alice").with_header("X-Transaction-Id", "tx1");
        assert_eq!(ctx.transaction_id(), Some("tx1"));
        assert_eq!(ctx.header("x-TRANSACTION-id"), Some("tx1"));
    }

    #[test]
    fn test_empty_header_is_absent() {
        let ctx = RequestContext::new("acme", "eu", "alice").with_header(TRANSACTION_HEADER, "");
        assert_eq!(ctx.transaction_id(), None);
    }

    #[test]
    fn test_process_id_prefers_header() {
        let ctx = RequestContext::new("acme", "eu", "alice")
            .with_header(PROCESS_HEADER, "p-header")
            .with_body(json!({ "processId": "p-body" }));
        assert_eq!(ctx.process_id().as_deref(), Some("p-header"));
    }

    #[test]
    fn test_process_id_from_body() {
        let ctx = RequestContext::new("acme", "eu", "alice").with_body(json!({ "processId": 42 }));
        assert_eq!(ctx.process_id().as_deref(), Some("42"));

        let ctx = RequestContext::new("acme", "eu", "alice").with_body(json!({ "other": 1 }));
        assert_eq!(ctx.process_id(), None);
    }

    #[test]
    fn test_namespace() {
        let ns = RequestContext::new("acme", "eu", "alice").namespace();
        assert_eq!(ns.account, "acme");
        assert_eq!(ns.collection("scopes"), "eu.scopes");
    }
}
