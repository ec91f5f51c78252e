//! # Scope Document Fields
//!
//! A scope document is `{_id, _scopeId, <attributes>, _transactionLastModified?,
//! _sessionLastModified?}`. The underscore fields are bookkeeping and are
//! never exposed as attributes.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use shared_store::ID_FIELD;

use crate::config::ScopeConfig;
use crate::domain::errors::ScopeError;

/// Field holding the scope identifier.
pub const SCOPE_ID_FIELD: &str = "_scopeId";

pub const TRANSACTION_LAST_MODIFIED: &str = "_transactionLastModified";
pub const SESSION_LAST_MODIFIED: &str = "_sessionLastModified";

/// Fields managed by the store rather than the caller.
pub const RESERVED_FIELDS: [&str; 4] = [
    ID_FIELD,
    SCOPE_ID_FIELD,
    TRANSACTION_LAST_MODIFIED,
    SESSION_LAST_MODIFIED,
];

/// Timestamp field refreshed on every access to a tracked scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessedField {
    Transaction,
    Session,
}

impl AccessedField {
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Transaction => TRANSACTION_LAST_MODIFIED,
            Self::Session => SESSION_LAST_MODIFIED,
        }
    }

    /// Idle time after which the database expires the document.
    pub fn ttl(self, config: &ScopeConfig) -> Duration {
        match self {
            Self::Transaction => config.transaction_ttl(),
            Self::Session => config.session_ttl(),
        }
    }
}

impl fmt::Display for AccessedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for AccessedField {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            TRANSACTION_LAST_MODIFIED => Ok(Self::Transaction),
            SESSION_LAST_MODIFIED => Ok(Self::Session),
            other => Err(ScopeError::InvalidAccessedField(other.to_string())),
        }
    }
}

pub fn is_reserved(field: &str) -> bool {
    RESERVED_FIELDS.contains(&field)
}

/// Check an attribute key (a dot path) before it reaches the database.
pub fn validate_attribute_key(key: &str) -> Result<(), ScopeError> {
    let reason = if key.is_empty() {
        Some("empty key")
    } else if key.starts_with('$') {
        Some("operator prefix")
    } else if key.split('.').any(str::is_empty) {
        Some("empty path segment")
    } else if key.split('.').next().is_some_and(is_reserved) {
        Some("reserved field")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ScopeError::InvalidAttributeKey {
            key: key.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accessed_field_parse() {
        assert_eq!(
            "_transactionLastModified".parse::<AccessedField>().unwrap(),
            AccessedField::Transaction
        );
        assert_eq!(
            "_sessionLastModified".parse::<AccessedField>().unwrap(),
            AccessedField::Session
        );
        assert!(matches!(
            "_lastModified".parse::<AccessedField>(),
            Err(ScopeError::InvalidAccessedField(_))
        ));
    }

    #[test]
    fn test_ttls_follow_config() {
        let config = ScopeConfig::default();
        assert_eq!(AccessedField::Transaction.ttl(&config).as_secs(), 60);
        assert_eq!(AccessedField::Session.ttl(&config).as_secs(), 3600);
    }

    #[test]
    fn test_attribute_keys() {
        assert!(validate_attribute_key("cart").is_ok());
        assert!(validate_attribute_key("cart.items.0").is_ok());
        assert!(validate_attribute_key("_private").is_ok());
        for bad in ["", "$set", "a..b", "_id", "_scopeId", "_sessionLastModified.x"] {
            assert!(validate_attribute_key(bad).is_err(), "{bad:?} accepted");
        }
    }

    proptest! {
        #[test]
        fn prop_plain_keys_accepted(key in "[a-zA-Z][a-zA-Z0-9]{0,15}(\\.[a-zA-Z0-9]{1,8}){0,3}") {
            prop_assert!(validate_attribute_key(&key).is_ok());
        }
    }
}
