//! Replication state singleton
//!
//! Every index carries exactly one meta document (`_meta:1`) recording the
//! replication position the index reflects. The engine can't patch a stored
//! field in place, so writing the state is always delete-then-add within a
//! single commit.

use chrono::{DateTime, Utc};
use musearch_core::field::{
    LAST_CHANGE_SEQUENCE_FIELD, LAST_UPDATED_FIELD, META_FIELD, META_VALUE,
    REPLICATION_SEQUENCE_FIELD, SCHEMA_SEQUENCE_FIELD,
};
use musearch_core::{Document, Error, FieldValue, ReplicationInfo, Result};
use musearch_engine::{IndexReader, IndexWriter, Query, SearchOptions};
use tracing::debug;

/// The meta document for `info`.
pub fn meta_document(info: &ReplicationInfo) -> Document {
    let mut doc = Document::new();
    doc.add_text(META_FIELD, META_VALUE)
        .add_int(SCHEMA_SEQUENCE_FIELD, info.schema_sequence)
        .add_int(REPLICATION_SEQUENCE_FIELD, info.replication_sequence)
        .add_long(LAST_UPDATED_FIELD, info.last_updated.timestamp_millis());
    if let Some(id) = info.last_change_id {
        doc.add_long(LAST_CHANGE_SEQUENCE_FIELD, id);
    }
    doc
}

fn number(doc: &Document, field: &str) -> Option<i64> {
    doc.values(field).find_map(FieldValue::as_long)
}

fn required(doc: &Document, field: &str) -> Result<i64> {
    number(doc, field)
        .ok_or_else(|| Error::ReplicationState(format!("meta document lacks {}", field)))
}

/// Parse a stored meta document.
pub fn parse_meta_document(doc: &Document) -> Result<ReplicationInfo> {
    let schema_sequence = i32::try_from(required(doc, SCHEMA_SEQUENCE_FIELD)?)
        .map_err(|e| Error::ReplicationState(e.to_string()))?;
    let replication_sequence = i32::try_from(required(doc, REPLICATION_SEQUENCE_FIELD)?)
        .map_err(|e| Error::ReplicationState(e.to_string()))?;
    let millis = required(doc, LAST_UPDATED_FIELD)?;
    let last_updated: DateTime<Utc> = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::ReplicationState(format!("bad timestamp {}", millis)))?;
    Ok(ReplicationInfo {
        schema_sequence,
        replication_sequence,
        last_change_id: number(doc, LAST_CHANGE_SEQUENCE_FIELD),
        last_updated,
    })
}

/// Replication state of an index, `None` if it has none.
pub fn read(reader: &dyn IndexReader) -> Result<Option<ReplicationInfo>> {
    let top = reader.search(
        &Query::term(META_FIELD, META_VALUE),
        &SearchOptions::new(0, 2),
    )?;
    match top.hits.as_slice() {
        [] => Ok(None),
        [hit] => parse_meta_document(&hit.doc).map(Some),
        _ => Err(Error::ReplicationState(format!(
            "{} meta documents in index {}",
            top.total_hits,
            reader.registry().index_name()
        ))),
    }
}

/// Replace the replication state of the writer's index and commit.
pub fn write(writer: &mut dyn IndexWriter, info: &ReplicationInfo) -> Result<()> {
    writer.delete_documents(META_FIELD, META_VALUE)?;
    writer.add_document(meta_document(info))?;
    writer.commit()?;
    debug!(
        target: "musearch::replication",
        index = writer.index_name(),
        replication_sequence = info.replication_sequence,
        last_change_id = ?info.last_change_id,
        "Wrote replication state"
    );
    Ok(())
}
