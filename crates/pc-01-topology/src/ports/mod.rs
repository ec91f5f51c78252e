//! Ports for topology provisioning
//!
//! The outbound port is [`shared_bus::Broker`].

pub mod inbound;
