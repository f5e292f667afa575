//! Core types for musearch
//!
//! This crate defines the foundational types used throughout the system:
//! - Document: ordered multi-valued field model with "unknown"/"no value" sentinels
//! - FieldSpec / FieldRegistry: per-index field configuration tables
//! - Analyzer: per-field text analysis pipelines
//! - numeric: order-preserving term encoding for range queries
//! - IndexKind / IdRange: the indexes and the chunk ranges they are built in
//! - Change / ReplicationInfo: replication stream and position types
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod document;
pub mod entity;
pub mod error;
pub mod field;
pub mod numeric;
pub mod replication;
pub mod schema;

pub use analysis::{Analyzer, AnalyzerKind, Token};
pub use document::{DocField, Document, FieldValue, NO_VALUE, UNKNOWN};
pub use entity::{IdRange, IndexKind};
pub use error::{Error, Result};
pub use field::{FieldRegistry, FieldSpec, NumericKind, ID_FIELD, STORE_FIELD};
pub use replication::{Change, ColumnValues, Operation, ReplicationInfo};
