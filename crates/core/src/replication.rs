//! Replication types shared by the decoder, the updater and the meta document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column name → value (`None` is SQL NULL).
pub type ColumnValues = BTreeMap<String, Option<String>>;

/// Replication position an index reflects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationInfo {
    /// Database schema version
    pub schema_sequence: i32,
    /// Last replication packet applied
    pub replication_sequence: i32,
    /// Last change id applied, if any change was ever applied
    pub last_change_id: Option<i64>,
    /// When the index was built or last updated
    pub last_updated: DateTime<Utc>,
}

impl ReplicationInfo {
    /// State stamped by a full build.
    pub fn new(schema_sequence: i32, replication_sequence: i32) -> Self {
        ReplicationInfo {
            schema_sequence,
            replication_sequence,
            last_change_id: None,
            last_updated: Utc::now(),
        }
    }
}

/// Row-level operation of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Row inserted
    Insert,
    /// Row updated
    Update,
    /// Row deleted
    Delete,
}

impl Operation {
    /// Parse a single-letter change-log operation code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "i" | "I" => Some(Operation::Insert),
            "u" | "U" => Some(Operation::Update),
            "d" | "D" => Some(Operation::Delete),
            _ => None,
        }
    }

    /// Single-letter change-log operation code.
    pub fn code(self) -> &'static str {
        match self {
            Operation::Insert => "i",
            Operation::Update => "u",
            Operation::Delete => "d",
        }
    }

    /// Whether a complete change of this kind carries old values.
    pub fn has_old_values(self) -> bool {
        matches!(self, Operation::Update | Operation::Delete)
    }

    /// Whether a complete change of this kind carries new values.
    pub fn has_new_values(self) -> bool {
        matches!(self, Operation::Insert | Operation::Update)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A complete row-level change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Sequence id, strictly increasing across a stream
    pub id: i64,
    /// Sanitized table name
    pub table: String,
    /// Operation
    pub operation: Operation,
    /// Values before the change (update/delete)
    pub old_values: Option<ColumnValues>,
    /// Values after the change (insert/update)
    pub new_values: Option<ColumnValues>,
}

impl Change {
    /// Value of `column`, preferring the new row over the old one.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.new_values
            .as_ref()
            .and_then(|v| v.get(column))
            .or_else(|| self.old_values.as_ref().and_then(|v| v.get(column)))
            .and_then(|v| v.as_deref())
    }

    /// Every distinct non-null value of `column` across old and new rows.
    pub fn values_of(&self, column: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::with_capacity(2);
        for row in [&self.old_values, &self.new_values].into_iter().flatten() {
            if let Some(Some(v)) = row.get(column) {
                if !out.contains(&v.as_str()) {
                    out.push(v);
                }
            }
        }
        out
    }
}
