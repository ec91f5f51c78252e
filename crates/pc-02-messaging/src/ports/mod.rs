//! Ports for messaging

pub mod outbound;
