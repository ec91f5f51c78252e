//! # PC-02: Messaging
//!
//! Event publishing and queue consumption on top of the provisioned
//! topology.
//!
//! ## Publishing
//!
//! [`EventPublisher`] ensures the topic exists, publishes the event with
//! every top-level scalar field mirrored as a message attribute, and appends
//! the event to the `events` collection of its account and realm.
//!
//! ## Consuming
//!
//! [`QueueConsumer::start`] resolves the queue URL once and spawns a loop
//! that long-polls one message at a time:
//!
//! ```text
//! receive ──► delete ──► decode envelope ──► decode event ──► handler
//!    ▲                                                          │
//!    └────────────────────── always ◄───────────────────────────┘
//! ```
//!
//! Handler errors, panics and undecodable bodies are logged; the loop
//! carries on. Failed receives back off briefly before the next poll.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::consumer::{decode_event, ConsumerHandle, QueueConsumer};
pub use application::publisher::EventPublisher;
pub use config::MessagingConfig;
pub use domain::attributes::{event_attributes, to_message_attributes, UNDEFINED_ATTRIBUTE_VALUE};
pub use domain::errors::{HandlerError, MessagingError};
pub use ports::outbound::{handler_fn, EventHandler, FnHandler};
