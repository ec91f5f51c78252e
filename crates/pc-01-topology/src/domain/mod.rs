//! Domain layer for topology provisioning

pub mod cache;
pub mod entities;
pub mod errors;
pub mod naming;
pub mod policy;
