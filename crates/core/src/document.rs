//! Document model
//!
//! A [`Document`] is an ordered list of (field name, value) pairs. A field
//! may repeat; the order in which values are appended is preserved, which is
//! what keeps parallel multi-valued groups aligned (value *i* of `catno`
//! belongs to value *i* of `label`).
//!
//! Whether a value is searchable, retrievable or both is decided by the
//! index's [`FieldRegistry`](crate::field::FieldRegistry), not by the
//! document itself.

use serde::{Deserialize, Serialize};

/// Sentinel for a single-valued descriptive field with no source value.
pub const UNKNOWN: &str = "unknown";

/// Sentinel for a missing slot in an ordered parallel group.
pub const NO_VALUE: &str = "-";

/// A field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text, analyzed according to the field
    Text(String),
    /// 32-bit number
    Int(i32),
    /// 64-bit number
    Long(i64),
}

impl FieldValue {
    /// The value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a 64-bit number, if it is numeric.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v as i64),
            FieldValue::Long(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }
}

/// One (name, value) pair of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocField {
    /// Field name
    pub name: String,
    /// Value
    pub value: FieldValue,
}

/// An ordered multi-map of field values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<DocField>,
}

impl Document {
    /// Empty document.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, value: FieldValue) -> &mut Self {
        self.fields.push(DocField {
            name: name.to_string(),
            value,
        });
        self
    }

    /// Append a text value.
    pub fn add_text(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.push(name, FieldValue::Text(value.into()))
    }

    /// Append a 32-bit numeric value.
    pub fn add_int(&mut self, name: &str, value: i32) -> &mut Self {
        self.push(name, FieldValue::Int(value))
    }

    /// Append a 64-bit numeric value.
    pub fn add_long(&mut self, name: &str, value: i64) -> &mut Self {
        self.push(name, FieldValue::Long(value))
    }

    /// Append the value if present and non-empty, else nothing.
    pub fn add_non_empty(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) if !v.is_empty() => self.add_text(name, v),
            _ => self,
        }
    }

    /// Append the value, or [`UNKNOWN`] when absent or empty.
    pub fn add_or_unknown(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) if !v.is_empty() => self.add_text(name, v),
            _ => self.add_text(name, UNKNOWN),
        }
    }

    /// Append the value, or [`NO_VALUE`] when absent or empty.
    pub fn add_or_no_value(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) if !v.is_empty() => self.add_text(name, v),
            _ => self.add_text(name, NO_VALUE),
        }
    }

    /// All pairs in insertion order.
    pub fn fields(&self) -> &[DocField] {
        &self.fields
    }

    /// Every value of `name`, in insertion order.
    pub fn values<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a FieldValue> + 'n
    where
        'a: 'n,
    {
        self.fields
            .iter()
            .filter(move |f| f.name == name)
            .map(|f| &f.value)
    }

    /// Every text value of `name`, in insertion order.
    pub fn texts(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.name == name)
            .filter_map(|f| f.value.as_text())
            .collect()
    }

    /// Every numeric value of `name`, in insertion order.
    pub fn numbers(&self, name: &str) -> Vec<i64> {
        self.fields
            .iter()
            .filter(|f| f.name == name)
            .filter_map(|f| f.value.as_long())
            .collect()
    }

    /// First text value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .filter(|f| f.name == name)
            .find_map(|f| f.value.as_text())
    }

    /// Whether the document has any value for `name`.
    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Number of (name, value) pairs.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
