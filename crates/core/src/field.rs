//! Field configuration registry
//!
//! Each index declares its fields as a static table of [`FieldSpec`]s. The
//! engine consults the registry when a document is added (to decide what is
//! indexed, what is stored and how it is analyzed) and the query compiler
//! consults it to analyze query terms the same way.

use crate::analysis::AnalyzerKind;
use crate::error::{Error, Result};

/// Internal key field carrying the entity's integer id.
pub const ID_FIELD: &str = "_id";
/// Stored-only field carrying the serialized store blob.
pub const STORE_FIELD: &str = "_store";

/// Marker field of the replication meta document.
pub const META_FIELD: &str = "_meta";
/// Value of [`META_FIELD`] on the meta document.
pub const META_VALUE: &str = "1";
/// Schema sequence of the meta document.
pub const SCHEMA_SEQUENCE_FIELD: &str = "_schema_sequence";
/// Replication sequence of the meta document.
pub const REPLICATION_SEQUENCE_FIELD: &str = "_replication_sequence";
/// Last applied change id of the meta document (absent when none applied).
pub const LAST_CHANGE_SEQUENCE_FIELD: &str = "_last_change_sequence";
/// Build/update timestamp of the meta document (epoch milliseconds).
pub const LAST_UPDATED_FIELD: &str = "_last_updated";

/// Numeric field width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    /// 32-bit signed
    Int,
    /// 64-bit signed
    Long,
}

/// Configuration of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name
    pub name: &'static str,
    /// Searchable
    pub indexed: bool,
    /// Retrievable from search results
    pub stored: bool,
    /// Analyzer applied at index and query time
    pub analyzer: AnalyzerKind,
    /// Numeric encoding, if the field holds numbers
    pub numeric: Option<NumericKind>,
}

impl FieldSpec {
    /// Analyzed full-text field, not stored.
    pub const fn text(name: &'static str) -> Self {
        FieldSpec {
            name,
            indexed: true,
            stored: false,
            analyzer: AnalyzerKind::Standard,
            numeric: None,
        }
    }

    /// Exact-match field, not stored.
    pub const fn keyword(name: &'static str) -> Self {
        FieldSpec {
            name,
            indexed: true,
            stored: false,
            analyzer: AnalyzerKind::Keyword,
            numeric: None,
        }
    }

    /// Lowercased exact-match field, not stored.
    pub const fn ci_keyword(name: &'static str) -> Self {
        FieldSpec {
            name,
            indexed: true,
            stored: false,
            analyzer: AnalyzerKind::CaseInsensitiveKeyword,
            numeric: None,
        }
    }

    /// Retrievable but not searchable.
    pub const fn store_only(name: &'static str) -> Self {
        FieldSpec {
            name,
            indexed: false,
            stored: true,
            analyzer: AnalyzerKind::Keyword,
            numeric: None,
        }
    }

    /// 32-bit numeric field supporting range queries.
    pub const fn int(name: &'static str) -> Self {
        FieldSpec {
            name,
            indexed: true,
            stored: false,
            analyzer: AnalyzerKind::Keyword,
            numeric: Some(NumericKind::Int),
        }
    }

    /// 64-bit numeric field supporting range queries.
    pub const fn long(name: &'static str) -> Self {
        FieldSpec {
            name,
            indexed: true,
            stored: false,
            analyzer: AnalyzerKind::Keyword,
            numeric: Some(NumericKind::Long),
        }
    }

    /// Same field, also stored.
    pub const fn stored(mut self) -> Self {
        self.stored = true;
        self
    }

    /// Same field with a different analyzer.
    pub const fn analyzed_with(mut self, analyzer: AnalyzerKind) -> Self {
        self.analyzer = analyzer;
        self
    }
}

/// Fields every index carries for its replication meta document.
pub static META_FIELDS: &[FieldSpec] = &[
    FieldSpec::keyword(META_FIELD).stored(),
    FieldSpec::int(SCHEMA_SEQUENCE_FIELD).stored(),
    FieldSpec::int(REPLICATION_SEQUENCE_FIELD).stored(),
    FieldSpec::long(LAST_CHANGE_SEQUENCE_FIELD).stored(),
    FieldSpec::long(LAST_UPDATED_FIELD).stored(),
];

/// The field table of one index.
#[derive(Debug)]
pub struct FieldRegistry {
    index: &'static str,
    fields: &'static [FieldSpec],
}

impl FieldRegistry {
    /// Declare a registry.
    pub const fn new(index: &'static str, fields: &'static [FieldSpec]) -> Self {
        FieldRegistry { index, fields }
    }

    /// Name of the index the registry belongs to.
    pub fn index_name(&self) -> &'static str {
        self.index
    }

    /// Look up a field, falling back to the meta fields.
    pub fn get(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields
            .iter()
            .chain(META_FIELDS.iter())
            .find(|f| f.name == name)
    }

    /// Look up a field or fail with [`Error::UnknownField`].
    pub fn require(&self, name: &str) -> Result<&'static FieldSpec> {
        self.get(name).ok_or_else(|| Error::UnknownField {
            index: self.index.to_string(),
            field: name.to_string(),
        })
    }

    /// Entity fields (meta fields excluded).
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }
}
