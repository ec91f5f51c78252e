//! # Shared Store - Document Database Port
//!
//! The driven port for the platform's document database plus the in-memory
//! adapter used in tests.
//!
//! Collections are scoped per account database and named
//! `{realm}.{logical}` (`eu.scopes`, `eu.events`, ...). The supported
//! operations are the ones the platform needs: inserts, `$set` / `$unset` /
//! `$currentDate` updates with upsert, find-and-modify, equality finds,
//! removal, and unique or expiring indexes.
//!
//! Errors carry the database's native code; see
//! [`DatabaseError::is_duplicate_key`].

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod document;
pub mod errors;
pub mod memory;
pub mod query;
pub mod store;

pub use document::{date_value, get_path, parse_date, Document, ID_FIELD};
pub use errors::{DatabaseError, DUPLICATE_KEY};
pub use memory::InMemoryDocumentStore;
pub use query::{Filter, IndexSpec, Update, UpdateResult};
pub use store::DocumentStore;
