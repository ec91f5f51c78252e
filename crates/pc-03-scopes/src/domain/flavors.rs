//! # Scope Flavors
//!
//! Each flavor is the generic scope with a fixed way of deriving its
//! identifier and a fixed access-tracking choice.
//!
//! | Flavor | Identifier | Tracked |
//! |--------|------------|---------|
//! | Transaction | override, else `x-transaction-id` header | `_transactionLastModified` |
//! | Session | supplied by the caller | `_sessionLastModified` |
//! | Realm | `realm_{realm}` | no |
//! | User | username | no |
//! | Process | override, else `x-process-id` header, else body `processId` | no |
//! | Environment | fixed sentinel | no, and never invalidated |

use std::fmt;

use shared_types::RequestContext;

use crate::domain::errors::ScopeError;
use crate::domain::fields::AccessedField;

pub const REALM_SCOPE_PREFIX: &str = "realm_";

/// Scope id of the platform-wide environment scope.
pub const ENVIRONMENT_SCOPE_ID: &str = "__environment__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Transaction,
    Session,
    Realm,
    User,
    Process,
    Environment,
    /// Built directly through the generic API.
    Custom,
}

impl ScopeKind {
    pub fn accessed_field(self) -> Option<AccessedField> {
        match self {
            Self::Transaction => Some(AccessedField::Transaction),
            Self::Session => Some(AccessedField::Session),
            _ => None,
        }
    }

    /// Whether invalidation is disabled.
    pub fn is_permanent(self) -> bool {
        self == Self::Environment
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
            Self::Session => "session",
            Self::Realm => "realm",
            Self::User => "user",
            Self::Process => "process",
            Self::Environment => "environment",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn non_empty(kind: ScopeKind, id: Option<String>) -> Result<String, ScopeError> {
    id.filter(|id| !id.is_empty())
        .ok_or(ScopeError::MissingScopeId(kind))
}

pub fn transaction_scope_id(
    ctx: &RequestContext,
    id_override: Option<&str>,
) -> Result<String, ScopeError> {
    let id = id_override
        .filter(|id| !id.is_empty())
        .or_else(|| ctx.transaction_id())
        .map(str::to_string);
    non_empty(ScopeKind::Transaction, id)
}

pub fn process_scope_id(
    ctx: &RequestContext,
    id_override: Option<&str>,
) -> Result<String, ScopeError> {
    let id = match id_override.filter(|id| !id.is_empty()) {
        Some(id) => Some(id.to_string()),
        None => ctx.process_id(),
    };
    non_empty(ScopeKind::Process, id)
}

pub fn realm_scope_id(realm: &str) -> Result<String, ScopeError> {
    if realm.is_empty() {
        return Err(ScopeError::MissingScopeId(ScopeKind::Realm));
    }
    Ok(format!("{REALM_SCOPE_PREFIX}{realm}"))
}

pub fn user_scope_id(ctx: &RequestContext) -> Result<String, ScopeError> {
    non_empty(ScopeKind::User, Some(ctx.username.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{PROCESS_HEADER, TRANSACTION_HEADER};

    fn ctx() -> RequestContext {
        RequestContext::new("acme", "eu", "alice")
    }

    #[test]
    fn test_transaction_id_precedence() {
        let with_header = ctx().with_header(TRANSACTION_HEADER, "tx-header");
        assert_eq!(transaction_scope_id(&with_header, None).unwrap(), "tx-header");
        assert_eq!(
            transaction_scope_id(&with_header, Some("tx-explicit")).unwrap(),
            "tx-explicit"
        );
        assert!(matches!(
            transaction_scope_id(&ctx(), None),
            Err(ScopeError::MissingScopeId(ScopeKind::Transaction))
        ));
    }

    #[test]
    fn test_process_id_sources() {
        let from_body = ctx().with_body(json!({ "processId": "p-body" }));
        assert_eq!(process_scope_id(&from_body, None).unwrap(), "p-body");

        let from_header = from_body.clone().with_header(PROCESS_HEADER, "p-header");
        assert_eq!(process_scope_id(&from_header, None).unwrap(), "p-header");
        assert_eq!(process_scope_id(&from_header, Some("p-explicit")).unwrap(), "p-explicit");

        assert!(process_scope_id(&ctx(), Some("")).is_err());
    }

    #[test]
    fn test_realm_and_user_ids() {
        assert_eq!(realm_scope_id("eu").unwrap(), "realm_eu");
        assert!(realm_scope_id("").is_err());
        assert_eq!(user_scope_id(&ctx()).unwrap(), "alice");
        assert!(user_scope_id(&RequestContext::new("acme", "eu", "")).is_err());
    }

    #[test]
    fn test_kind_tracking() {
        assert_eq!(
            ScopeKind::Transaction.accessed_field(),
            Some(AccessedField::Transaction)
        );
        assert_eq!(ScopeKind::Session.accessed_field(), Some(AccessedField::Session));
        assert_eq!(ScopeKind::User.accessed_field(), None);
        assert!(ScopeKind::Environment.is_permanent());
        assert!(!ScopeKind::Realm.is_permanent());
    }
}
