//! Domain layer for messaging

pub mod attributes;
pub mod errors;
