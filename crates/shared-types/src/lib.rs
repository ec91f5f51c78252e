//! # Shared Types Crate
//!
//! Domain entities used by every subsystem of the platform library.
//!
//! ## Contents
//!
//! - **Event**: the structured domain event that is published to topics and
//!   persisted to the events collection.
//! - **Namespace**: the `(account, realm)` pair that selects a database and
//!   prefixes every collection name.
//! - **RequestContext**: the typed, explicitly-built view of an inbound
//!   request that events and scopes derive identifiers from.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod context;
pub mod entities;
pub mod errors;

pub use context::{RequestContext, PROCESS_HEADER, TRANSACTION_HEADER};
pub use entities::{Event, EventBuilder, Namespace, RESERVED_EVENT_FIELDS};
pub use errors::EventError;
