//! Error types for scopes and locks

use shared_store::DatabaseError;
use thiserror::Error;

use crate::domain::flavors::ScopeKind;

/// Errors from scope operations
#[derive(Debug, Error)]
pub enum ScopeError {
    /// Only the two last-modified fields may track access
    #[error("Invalid accessed field: {0}")]
    InvalidAccessedField(String),

    #[error("Invalid attribute key {key:?}: {reason}")]
    InvalidAttributeKey { key: String, reason: &'static str },

    /// No identifier could be derived for the scope
    #[error("No scope id available for {0} scope")]
    MissingScopeId(ScopeKind),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Errors from scoped locks
#[derive(Debug, Error)]
pub enum LockError {
    /// Another owner holds the lock
    #[error("Lock already held: {name}")]
    AlreadyHeld { name: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
