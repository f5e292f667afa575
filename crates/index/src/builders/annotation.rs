//! Annotation documents
//!
//! One document per annotation rather than per entity: picking the most
//! recent annotation of an entity is left to the reader, which sorts on the
//! `created` timestamp. Annotations with empty text are not indexed.

use super::EntityBuilder;
use crate::source::{AnnotationRow, CatalogSource};
use crate::timing::PhaseTimings;
use musearch_core::{Document, IdRange, IndexKind, Result, ID_FIELD};

/// Builds the `annotation` index.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationBuilder;

impl EntityBuilder for AnnotationBuilder {
    type Row = AnnotationRow;
    type SideMaps = ();

    fn kind(&self) -> IndexKind {
        IndexKind::Annotation
    }

    fn load_side_maps(&self, _source: &dyn CatalogSource, _range: IdRange) -> Result<()> {
        Ok(())
    }

    fn fetch_rows(&self, source: &dyn CatalogSource, range: IdRange) -> Result<Vec<AnnotationRow>> {
        source.annotations(range)
    }

    fn row_id(&self, row: &AnnotationRow) -> u32 {
        row.id
    }

    fn build(
        &self,
        row: &AnnotationRow,
        _side: &(),
        _timings: &PhaseTimings,
    ) -> Result<Option<Document>> {
        let Some(text) = row.text.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let mut doc = Document::new();
        doc.add_text(ID_FIELD, row.id.to_string())
            .add_text("entity", &row.entity_gid)
            .add_text("name", &row.entity_name)
            .add_text("type", &row.entity_type)
            .add_text("text", text)
            .add_long("created", row.created.timestamp_millis());
        Ok(Some(doc))
    }
}
