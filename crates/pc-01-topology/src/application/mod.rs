//! Application layer for topology provisioning

pub mod service;
