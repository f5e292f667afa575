//! Immutable segments
//!
//! A segment is built once from a batch of documents and never changes
//! afterwards; deletions are tracked as tombstones by the owning index.
//!
//! Per field the segment keeps:
//! - a sorted term dictionary (`BTreeMap`) so prefix and range scans are
//!   ordered walks
//! - postings with token positions for phrase matching
//! - the token count of the field per document for length normalization

use crate::error::{EngineError, EngineResult};
use musearch_core::numeric::{encode_int, encode_long};
use musearch_core::{Document, FieldRegistry, FieldSpec, FieldValue, NumericKind, NO_VALUE};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Posting
// ============================================================================

/// Occurrences of one term in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Posting {
    /// Segment-local document number
    pub doc: u32,
    /// Token positions within the field, ascending
    pub positions: Vec<u32>,
}

impl Posting {
    pub(crate) fn freq(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Term dictionary and field lengths of one field.
#[derive(Debug, Default)]
pub(crate) struct FieldIndex {
    pub terms: BTreeMap<String, Vec<Posting>>,
    pub lengths: HashMap<u32, u32>,
}

impl FieldIndex {
    pub(crate) fn field_len(&self, doc: u32) -> u32 {
        self.lengths.get(&doc).copied().unwrap_or(0)
    }
}

// ============================================================================
// Segment
// ============================================================================

/// An immutable batch of indexed documents.
#[derive(Debug)]
pub(crate) struct Segment {
    pub id: u64,
    pub docs: Vec<Document>,
    pub fields: HashMap<String, FieldIndex>,
}

/// Terms (with value-relative positions) a field value is indexed under.
pub(crate) fn field_tokens(spec: &FieldSpec, value: &FieldValue) -> EngineResult<Vec<(String, u32)>> {
    match (spec.numeric, value) {
        (Some(NumericKind::Int), FieldValue::Int(v)) => Ok(vec![(encode_int(*v), 0)]),
        (Some(NumericKind::Long), FieldValue::Long(v)) => Ok(vec![(encode_long(*v), 0)]),
        (Some(NumericKind::Long), FieldValue::Int(v)) => Ok(vec![(encode_long(*v as i64), 0)]),
        // Sorts below every encoded number, so ranges never match it.
        (Some(_), FieldValue::Text(t)) if t == NO_VALUE => Ok(vec![(NO_VALUE.to_string(), 0)]),
        (Some(_), _) => Err(EngineError::FieldType {
            field: spec.name.to_string(),
            expected: "numeric",
        }),
        (None, FieldValue::Text(text)) => Ok(spec
            .analyzer
            .analyze(text)
            .into_iter()
            .map(|t| (t.text, t.position))
            .collect()),
        (None, _) => Err(EngineError::FieldType {
            field: spec.name.to_string(),
            expected: "text",
        }),
    }
}

/// Check every field of `doc` is declared and holds the right value type.
pub(crate) fn validate(registry: &'static FieldRegistry, doc: &Document) -> EngineResult<()> {
    for field in doc.fields() {
        let spec = registry.require(&field.name)?;
        if spec.indexed {
            field_tokens(spec, &field.value)?;
        }
    }
    Ok(())
}

/// Whether `doc` would be indexed under `term` in `field`.
pub(crate) fn doc_has_term(registry: &'static FieldRegistry, doc: &Document, field: &str, term: &str) -> bool {
    let Some(spec) = registry.get(field) else {
        return false;
    };
    doc.values(field).any(|v| {
        field_tokens(spec, v)
            .map(|tokens| tokens.iter().any(|(t, _)| t == term))
            .unwrap_or(false)
    })
}

impl Segment {
    /// Analyze `docs` against the registry and build postings.
    pub(crate) fn build(
        id: u64,
        registry: &'static FieldRegistry,
        docs: Vec<Document>,
    ) -> EngineResult<Self> {
        let mut fields: HashMap<String, FieldIndex> = HashMap::new();

        for (doc_no, doc) in docs.iter().enumerate() {
            let doc_no = doc_no as u32;
            // Next free position per field, so multi-valued fields keep
            // increasing positions across values.
            let mut next_position: HashMap<&str, u32> = HashMap::new();

            for field in doc.fields() {
                let spec = registry.require(&field.name)?;
                if !spec.indexed {
                    continue;
                }

                let tokens = field_tokens(spec, &field.value)?;
                if tokens.is_empty() {
                    continue;
                }

                let base = next_position.get(spec.name).copied().unwrap_or(0);
                let index = fields.entry(spec.name.to_string()).or_default();
                let mut last = base;
                for (term, position) in tokens {
                    let position = base + position;
                    last = last.max(position);
                    let postings = index.terms.entry(term).or_default();
                    match postings.last_mut() {
                        Some(p) if p.doc == doc_no => p.positions.push(position),
                        _ => postings.push(Posting {
                            doc: doc_no,
                            positions: vec![position],
                        }),
                    }
                    *index.lengths.entry(doc_no).or_insert(0) += 1;
                }
                let gap = spec.analyzer.analyzer().position_gap();
                next_position.insert(spec.name, last + 1 + gap);
            }
        }

        Ok(Segment { id, docs, fields })
    }

    /// Number of documents, deleted ones included.
    pub(crate) fn max_doc(&self) -> u32 {
        self.docs.len() as u32
    }

    pub(crate) fn field(&self, name: &str) -> Option<&FieldIndex> {
        self.fields.get(name)
    }

    pub(crate) fn postings(&self, field: &str, term: &str) -> Option<&[Posting]> {
        self.field(field)
            .and_then(|f| f.terms.get(term))
            .map(Vec::as_slice)
    }
}
