//! Error types for the musearch system
//!
//! This module defines the error hierarchy shared by every crate in the
//! workspace. We use `thiserror` for automatic `Display` and `Error` trait
//! implementations; crate-local errors convert into this type with `From`.

use std::io;
use thiserror::Error;

/// Result type alias for musearch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for musearch
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The relational source failed while reading a chunk
    #[error("Source error for {entity} ids {min}..={max}: {message}")]
    Source {
        /// Index being built
        entity: String,
        /// First id of the failing chunk
        min: u32,
        /// Last id of the failing chunk
        max: u32,
        /// Underlying failure
        message: String,
    },

    /// A primary row could not be turned into a document
    #[error("Malformed {entity} row {id}: {message}")]
    MalformedRow {
        /// Index being built
        entity: String,
        /// Row id
        id: u32,
        /// What was wrong
        message: String,
    },

    /// A change-data-capture packet could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The index engine rejected an operation
    #[error("Engine error: {0}")]
    Engine(String),

    /// A query could not be compiled or executed
    #[error("Query error: {0}")]
    Query(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Replication metadata is missing, duplicated or inconsistent
    #[error("Replication state error: {0}")]
    ReplicationState(String),

    /// A document or query referenced a field the index does not declare
    #[error("Unknown field '{field}' for index {index}")]
    UnknownField {
        /// Index name
        index: String,
        /// Field name
        field: String,
    },
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_source() {
        let err = Error::Source {
            entity: "recording".to_string(),
            min: 1,
            max: 50000,
            message: "connection reset".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Source error for recording ids 1..=50000: connection reset"
        );
    }

    #[test]
    fn test_error_display_unknown_field() {
        let err = Error::UnknownField {
            index: "label".to_string(),
            field: "bogus".to_string(),
        };
        assert!(err.to_string().contains("'bogus'"));
        assert!(err.to_string().contains("label"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json");
        let err: Error = bad.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_error() -> Result<i32> {
            Err(Error::Query("unbalanced quote".to_string()))
        }
        assert!(returns_error().is_err());
    }
}
