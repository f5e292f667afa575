//! Query error type
//!
//! None of these reach a search caller: the service logs them and answers
//! with an empty (or partial) result instead.

use musearch_core::Error as CoreError;
use musearch_engine::EngineError;
use thiserror::Error;

/// Result type alias for query compilation and search
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Errors raised while parsing, compiling or executing a query
#[derive(Debug, Error)]
pub enum QueryError {
    /// The raw query is not valid query syntax
    #[error("Syntax error at {position}: {message}")]
    Syntax {
        /// Character offset of the offending token
        position: usize,
        /// What was expected
        message: String,
    },

    /// A clause named a field the index does not have
    #[error("Unknown field '{field}' for index {index}")]
    UnknownField {
        /// Index name
        index: String,
        /// Field name
        field: String,
    },

    /// A numeric field was given something that is not a number
    #[error("Field '{field}' expects a number, got '{value}'")]
    InvalidNumber {
        /// Field name
        field: String,
        /// Offending value
        value: String,
    },

    /// The index could not be opened or searched
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Query configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueryError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        QueryError::Syntax {
            position,
            message: message.into(),
        }
    }
}

impl From<QueryError> for CoreError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::UnknownField { index, field } => CoreError::UnknownField { index, field },
            QueryError::Engine(e) => e.into(),
            QueryError::Config(msg) => CoreError::Config(msg),
            other => CoreError::Query(other.to_string()),
        }
    }
}
