//! Label documents

use super::{finish_store, require_gid, EntityBuilder, DELETED_LABEL_GID};
use crate::side::{add_aliases, add_tags, ALIAS_FIELDS};
use crate::source::{group_by, AliasRow, CatalogSource, CodeKind, CodeRow, LabelRow, TagRow};
use crate::store::{LabelStore, LifeSpan, StoreBuilder};
use crate::timing::PhaseTimings;
use musearch_core::{Document, IdRange, IndexKind, Result, ID_FIELD, NO_VALUE, STORE_FIELD};
use std::collections::BTreeMap;

/// Side-maps of a label chunk.
#[derive(Debug, Default)]
pub struct LabelSideMaps {
    aliases: BTreeMap<u32, Vec<AliasRow>>,
    tags: BTreeMap<u32, Vec<TagRow>>,
    ipis: BTreeMap<u32, Vec<CodeRow>>,
}

/// Builds the `label` index.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelBuilder;

impl EntityBuilder for LabelBuilder {
    type Row = LabelRow;
    type SideMaps = LabelSideMaps;

    fn kind(&self) -> IndexKind {
        IndexKind::Label
    }

    fn load_side_maps(&self, source: &dyn CatalogSource, range: IdRange) -> Result<LabelSideMaps> {
        Ok(LabelSideMaps {
            aliases: group_by(source.aliases(IndexKind::Label, range)?, |a| a.entity),
            tags: group_by(source.tags(IndexKind::Label, range)?, |t| t.entity),
            ipis: group_by(source.codes(CodeKind::LabelIpi, range)?, |c| c.entity),
        })
    }

    fn fetch_rows(&self, source: &dyn CatalogSource, range: IdRange) -> Result<Vec<LabelRow>> {
        source.labels(range)
    }

    fn row_id(&self, row: &LabelRow) -> u32 {
        row.id
    }

    fn build(
        &self,
        row: &LabelRow,
        side: &LabelSideMaps,
        timings: &PhaseTimings,
    ) -> Result<Option<Document>> {
        if row.gid == DELETED_LABEL_GID {
            return Ok(None);
        }
        require_gid(IndexKind::Label, row.id, &row.gid)?;

        let mut doc = Document::new();
        doc.add_text(ID_FIELD, row.id.to_string())
            .add_text("laid", &row.gid)
            .add_text("label", &row.name)
            .add_text("sortname", &row.name)
            .add_text("labelaccent", &row.name)
            .add_or_unknown("type", row.label_type.as_deref())
            .add_or_no_value("comment", row.comment.as_deref())
            .add_or_unknown("country", row.country.as_deref())
            .add_or_no_value("area", row.area.as_deref())
            .add_or_unknown("ended", Some(if row.ended { "true" } else { "false" }))
            .add_non_empty("begin", row.begin.as_deref())
            .add_non_empty("end", row.end.as_deref());

        match row.code {
            Some(code) if code > 0 => doc.add_text("code", code.to_string()),
            _ => doc.add_text("code", NO_VALUE),
        };

        let ipis: Vec<String> = side
            .ipis
            .get(&row.id)
            .map(|codes| codes.iter().map(|c| c.code.clone()).collect())
            .unwrap_or_default();
        for ipi in &ipis {
            doc.add_text("ipi", ipi);
        }

        let store = StoreBuilder::new(LabelStore {
            id: row.gid.clone(),
            name: row.name.clone(),
            sort_name: row.name.clone(),
            disambiguation: row.comment.clone().filter(|c| !c.is_empty()),
            label_type: row.label_type.clone(),
            label_code: row.code.filter(|c| *c > 0),
            country: row.country.clone(),
            area: row.area.clone(),
            life_span: LifeSpan {
                begin: row.begin.clone(),
                end: row.end.clone(),
                ended: row.ended,
            },
            ipis,
        });
        let store = add_aliases(&mut doc, store, ALIAS_FIELDS, side.aliases.get(&row.id));
        let store = add_tags(&mut doc, store, "tag", side.tags.get(&row.id));

        doc.add_text(STORE_FIELD, finish_store(store, timings)?);
        Ok(Some(doc))
    }
}
