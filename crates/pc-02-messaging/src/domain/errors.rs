//! Error types for messaging

use pc_01_topology::TopologyError;
use shared_bus::BrokerError;
use shared_store::DatabaseError;
use shared_types::EventError;
use thiserror::Error;

/// All errors that can occur while publishing or starting a consumer
#[derive(Debug, Error)]
pub enum MessagingError {
    /// `start` was called without a handler
    #[error("Consumer handler is missing")]
    MissingHandler,

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Event(#[from] EventError),

    /// A received body is neither a notification nor an event
    #[error("Undecodable message body: {0}")]
    Decode(String),
}

/// Error returned by an event handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
