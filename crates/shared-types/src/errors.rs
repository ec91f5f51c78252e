//! # Error Types
//!
//! Errors raised while constructing shared entities.

use thiserror::Error;

/// Errors that can occur when building an [`Event`](crate::Event).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// A required field was not supplied or was empty.
    #[error("Missing required event field: {0}")]
    MissingField(&'static str),

    /// An extra field reuses the name of a named event field.
    #[error("Event field {0:?} is reserved")]
    ReservedField(String),

    /// The event body could not be decoded.
    #[error("Malformed event: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            EventError::MissingField("realm").to_string(),
            "Missing required event field: realm"
        );
    }
}
