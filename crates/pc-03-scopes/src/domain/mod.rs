//! Domain layer for scopes

pub mod errors;
pub mod fields;
pub mod flavors;
