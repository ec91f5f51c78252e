//! Errors surfaced by document store adapters.

use thiserror::Error;

/// Native code the database reports for a unique-index violation.
pub const DUPLICATE_KEY: i32 = 11000;

/// Native code for a malformed value.
pub const BAD_VALUE: i32 = 2;

/// Native code for an update document that cannot be applied.
pub const FAILED_TO_PARSE: i32 = 9;

/// Failure reported by the document database.
///
/// Propagated verbatim by every component. Callers that give a duplicate key
/// a contextual meaning (a lock that is already held, say) inspect
/// [`DatabaseError::code`] rather than matching on the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    #[error("E11000 duplicate key error collection: {collection} index: {index} dup key: {key}")]
    DuplicateKey {
        collection: String,
        index: String,
        key: String,
    },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error {code}: {message}")]
    Server { code: i32, message: String },
}

impl DatabaseError {
    /// The database's native error code, when it reported one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::DuplicateKey { .. } => Some(DUPLICATE_KEY),
            Self::InvalidDocument(_) => Some(BAD_VALUE),
            Self::InvalidUpdate(_) => Some(FAILED_TO_PARSE),
            Self::Server { code, .. } => Some(*code),
            Self::Connection(_) => None,
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        self.code() == Some(DUPLICATE_KEY)
    }
}
