//! Application layer for messaging

pub mod consumer;
pub mod publisher;
