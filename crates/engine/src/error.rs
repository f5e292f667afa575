//! Engine error type

use musearch_core::Error as CoreError;
use std::io;
use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors raised by the index engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Document or query referenced an undeclared field
    #[error("Unknown field '{field}' for index {index}")]
    UnknownField {
        /// Index name
        index: String,
        /// Field name
        field: String,
    },

    /// A value of the wrong type was added to a field
    #[error("Field '{field}' expects {expected} values")]
    FieldType {
        /// Field name
        field: String,
        /// Expected value kind
        expected: &'static str,
    },

    /// A second writer was requested while one is open
    #[error("Index {0} already has an open writer")]
    WriterLocked(String),

    /// Index does not exist
    #[error("Index {0} not found")]
    NotFound(String),

    /// On-disk state failed validation
    #[error("Corrupt index data: {0}")]
    Corrupt(String),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Encoding failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<CoreError> for EngineError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownField { index, field } => EngineError::UnknownField { index, field },
            CoreError::Io(e) => EngineError::Io(e),
            other => EngineError::Corrupt(other.to_string()),
        }
    }
}

impl From<EngineError> for CoreError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::UnknownField { index, field } => CoreError::UnknownField { index, field },
            EngineError::Io(e) => CoreError::Io(e),
            other => CoreError::Engine(other.to_string()),
        }
    }
}
