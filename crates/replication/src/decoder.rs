//! Fragment decoder
//!
//! Change-log sources deliver a change as several raw fragments sharing one
//! sequence id: a header (table + operation code) and one or two payloads
//! flagged before/after. `ChangeDecoder` accumulates fragments keyed by
//! sequence id, in any order, and emits whole [`Change`]s sorted by id.
//!
//! Rules:
//! - re-delivering an identical fragment is a no-op
//! - a fragment that contradicts one already seen marks the change malformed
//! - inserts take their payload as new values, deletes as old values
//! - updates need both the before and the after payload
//! - malformed or incomplete changes are dropped, not fatal; the lowest
//!   dropped id is reported so consumers stop advancing there

use musearch_core::{Change, ColumnValues, Operation};
use std::collections::BTreeMap;
use tracing::warn;

/// Which row image a payload fragment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Row before the change (`iskey = f`)
    Before,
    /// Row after the change (`iskey = t`)
    After,
}

impl Side {
    /// Parse the change-log flag.
    pub fn from_flag(flag: &str) -> Option<Side> {
        match flag {
            "f" => Some(Side::Before),
            "t" => Some(Side::After),
            _ => None,
        }
    }

    /// The change-log flag.
    pub fn flag(self) -> &'static str {
        match self {
            Side::Before => "f",
            Side::After => "t",
        }
    }
}

/// One raw piece of a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Change metadata
    Header {
        /// Sequence id
        seq_id: i64,
        /// Sanitized table name
        table: String,
        /// Raw operation code (`i`, `u`, `d`)
        operation_code: String,
    },
    /// Column payload
    Data {
        /// Sequence id
        seq_id: i64,
        /// Row image
        side: Side,
        /// Unpacked column values
        values: ColumnValues,
    },
}

impl Fragment {
    /// Sequence id of the fragment.
    pub fn seq_id(&self) -> i64 {
        match self {
            Fragment::Header { seq_id, .. } | Fragment::Data { seq_id, .. } => *seq_id,
        }
    }
}

/// A change that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedChange {
    /// Sequence id of the dropped change
    pub seq_id: i64,
    /// Why it was dropped
    pub reason: String,
}

/// Output of one decode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    /// Complete changes, strictly increasing by id
    pub changes: Vec<Change>,
    /// Changes that were malformed or incomplete, by id
    pub dropped: Vec<DroppedChange>,
    /// Lowest dropped sequence id
    pub first_bad: Option<i64>,
}

impl DecodedBatch {
    /// Changes strictly before the first bad id; the prefix that is safe to
    /// apply.
    pub fn applicable(&self) -> &[Change] {
        match self.first_bad {
            None => &self.changes,
            Some(bad) => {
                let end = self.changes.partition_point(|c| c.id < bad);
                &self.changes[..end]
            }
        }
    }

    /// Highest id that may be recorded as applied.
    pub fn last_applicable_id(&self) -> Option<i64> {
        self.applicable().last().map(|c| c.id)
    }
}

#[derive(Debug, Default)]
struct Partial {
    header: Option<(String, String)>,
    before: Option<ColumnValues>,
    after: Option<ColumnValues>,
    malformed: Option<String>,
}

impl Partial {
    fn mark(&mut self, reason: String) {
        if self.malformed.is_none() {
            self.malformed = Some(reason);
        }
    }

    fn finish(self, seq_id: i64) -> Result<Change, String> {
        if let Some(reason) = self.malformed {
            return Err(reason);
        }
        let (table, code) = self
            .header
            .ok_or_else(|| "payload without change header".to_string())?;
        let operation = Operation::from_code(&code)
            .ok_or_else(|| format!("unknown operation code '{code}'"))?;

        let (old_values, new_values) = match operation {
            Operation::Insert => (None, Some(single_payload(self.before, self.after)?)),
            Operation::Delete => (Some(single_payload(self.before, self.after)?), None),
            Operation::Update => match (self.before, self.after) {
                (Some(old), Some(new)) => (Some(old), Some(new)),
                (None, _) => return Err("update missing its before payload".to_string()),
                (_, None) => return Err("update missing its after payload".to_string()),
            },
        };

        Ok(Change {
            id: seq_id,
            table,
            operation,
            old_values,
            new_values,
        })
    }
}

fn single_payload(
    before: Option<ColumnValues>,
    after: Option<ColumnValues>,
) -> Result<ColumnValues, String> {
    match (before, after) {
        (Some(a), Some(b)) if a != b => Err("conflicting payloads for a single-row change".into()),
        (Some(v), _) | (None, Some(v)) => Ok(v),
        (None, None) => Err("change header without payload".to_string()),
    }
}

/// Accumulates fragments and emits ordered changes.
#[derive(Debug, Default)]
pub struct ChangeDecoder {
    partial: BTreeMap<i64, Partial>,
}

impl ChangeDecoder {
    /// Empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct sequence ids seen so far.
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    /// Record that a raw fragment for `seq_id` could not be parsed at all.
    pub fn reject(&mut self, seq_id: i64, reason: impl Into<String>) {
        self.partial.entry(seq_id).or_default().mark(reason.into());
    }

    /// Accept one fragment.
    pub fn push(&mut self, fragment: Fragment) {
        let seq_id = fragment.seq_id();
        let partial = self.partial.entry(seq_id).or_default();
        match fragment {
            Fragment::Header {
                table,
                operation_code,
                ..
            } => match &partial.header {
                None => partial.header = Some((table, operation_code)),
                Some((t, c)) if *t == table && *c == operation_code => {}
                Some((t, c)) => partial.mark(format!(
                    "conflicting headers: {t}/{c} and {table}/{operation_code}"
                )),
            },
            Fragment::Data { side, values, .. } => {
                let slot = match side {
                    Side::Before => &mut partial.before,
                    Side::After => &mut partial.after,
                };
                match slot {
                    None => *slot = Some(values),
                    Some(existing) if *existing == values => {}
                    Some(_) => partial.mark(format!("conflicting {side:?} payloads")),
                }
            }
        }
    }

    /// Accept many fragments.
    pub fn extend(&mut self, fragments: impl IntoIterator<Item = Fragment>) {
        for fragment in fragments {
            self.push(fragment);
        }
    }

    /// Merge everything received into complete changes.
    pub fn finish(self) -> DecodedBatch {
        let mut batch = DecodedBatch::default();
        for (seq_id, partial) in self.partial {
            match partial.finish(seq_id) {
                Ok(change) => batch.changes.push(change),
                Err(reason) => {
                    warn!(
                        target: "musearch::replication",
                        seq_id,
                        reason = %reason,
                        "Dropping undecodable change"
                    );
                    batch.dropped.push(DroppedChange { seq_id, reason });
                }
            }
        }
        batch.first_bad = batch.dropped.first().map(|d| d.seq_id);
        batch
    }
}

/// Decode a fragment stream in one call.
pub fn decode(fragments: impl IntoIterator<Item = Fragment>) -> DecodedBatch {
    let mut decoder = ChangeDecoder::new();
    decoder.extend(fragments);
    decoder.finish()
}
