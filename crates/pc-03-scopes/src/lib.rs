//! # PC-03: Scopes
//!
//! Key/value attributes grouped into scopes, one document per scope in the
//! realm's `scopes` collection:
//!
//! ```text
//! { _id, _scopeId, <attributes...>, _transactionLastModified?, _sessionLastModified? }
//! ```
//!
//! Tracked scopes refresh their last-modified field on every access. The
//! database expires them through TTL indexes on those fields (see
//! [`ScopeStore::ensure_indexes`]); this crate never deletes expired scopes
//! itself.
//!
//! ## Flavors
//!
//! Transaction, session, realm, user, process and environment scopes differ
//! only in how the scope id is derived and whether access is tracked. See
//! [`domain::flavors`].
//!
//! ## Locks
//!
//! [`ScopeLock`] provides non-blocking named locks in the realm's `locks`
//! collection, released through a [`LockGuard`].

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod application;
pub mod config;
pub mod domain;

pub use application::handle::ScopeHandle;
pub use application::lock::{LockGuard, ScopeLock};
pub use application::store::ScopeStore;
pub use config::ScopeConfig;
pub use domain::errors::{LockError, ScopeError};
pub use domain::fields::{
    validate_attribute_key, AccessedField, SCOPE_ID_FIELD, SESSION_LAST_MODIFIED,
    TRANSACTION_LAST_MODIFIED,
};
pub use domain::flavors::{ScopeKind, ENVIRONMENT_SCOPE_ID, REALM_SCOPE_PREFIX};
