//! Replication error type

use musearch_core::Error as CoreError;
use std::io;
use thiserror::Error;

/// Result type alias for replication operations
pub type ReplicationResult<T> = std::result::Result<T, ReplicationError>;

/// Errors raised while reading change data
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The packet archive is unreadable or incomplete
    #[error("Archive error: {0}")]
    Archive(String),

    /// A packed column string could not be parsed
    #[error("Malformed column data at byte {offset}: {message}")]
    Unpack {
        /// Byte offset in the packed string
        offset: usize,
        /// What was expected
        message: String,
    },

    /// The live change log could not be queried
    #[error("Change log error: {0}")]
    ChangeLog(#[from] rusqlite::Error),

    /// The packet repository could not be reached
    #[error("Repository error: {0}")]
    Repository(String),
}

impl ReplicationError {
    pub(crate) fn archive(msg: impl Into<String>) -> Self {
        ReplicationError::Archive(msg.into())
    }
}

impl From<ReplicationError> for CoreError {
    fn from(e: ReplicationError) -> Self {
        match e {
            ReplicationError::Io(e) => CoreError::Io(e),
            other => CoreError::Decode(other.to_string()),
        }
    }
}
