//! Application layer for scopes

pub mod handle;
pub mod lock;
pub mod store;
