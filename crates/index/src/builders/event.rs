//! Event documents

use super::{finish_store, require_gid, EntityBuilder};
use crate::side::{add_aliases, add_relations, add_tags, RelationFields, ALIAS_FIELDS};
use crate::source::{group_by, AliasRow, CatalogSource, EventRow, RelationRow, RelationTarget, TagRow};
use crate::store::{EventStore, LifeSpan, StoreBuilder};
use crate::timing::PhaseTimings;
use musearch_core::{Document, IdRange, IndexKind, Result, ID_FIELD, STORE_FIELD};
use std::collections::BTreeMap;

const EVENT_RELATIONS: RelationFields = &[
    (RelationTarget::Artist, "arid", "artist"),
    (RelationTarget::Place, "pid", "place"),
    (RelationTarget::Area, "aid", "area"),
];

/// Side-maps of an event chunk.
#[derive(Debug, Default)]
pub struct EventSideMaps {
    aliases: BTreeMap<u32, Vec<AliasRow>>,
    tags: BTreeMap<u32, Vec<TagRow>>,
    relations: BTreeMap<u32, Vec<RelationRow>>,
}

/// Builds the `event` index.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventBuilder;

impl EntityBuilder for EventBuilder {
    type Row = EventRow;
    type SideMaps = EventSideMaps;

    fn kind(&self) -> IndexKind {
        IndexKind::Event
    }

    fn load_side_maps(&self, source: &dyn CatalogSource, range: IdRange) -> Result<EventSideMaps> {
        Ok(EventSideMaps {
            aliases: group_by(source.aliases(IndexKind::Event, range)?, |a| a.entity),
            tags: group_by(source.tags(IndexKind::Event, range)?, |t| t.entity),
            relations: group_by(source.relations(IndexKind::Event, range)?, |r| r.entity),
        })
    }

    fn fetch_rows(&self, source: &dyn CatalogSource, range: IdRange) -> Result<Vec<EventRow>> {
        source.events(range)
    }

    fn row_id(&self, row: &EventRow) -> u32 {
        row.id
    }

    fn build(
        &self,
        row: &EventRow,
        side: &EventSideMaps,
        timings: &PhaseTimings,
    ) -> Result<Option<Document>> {
        require_gid(IndexKind::Event, row.id, &row.gid)?;

        let mut doc = Document::new();
        doc.add_text(ID_FIELD, row.id.to_string())
            .add_text("eid", &row.gid)
            .add_text("event", &row.name)
            .add_text("eventaccent", &row.name)
            .add_non_empty("comment", row.comment.as_deref())
            .add_or_unknown("type", row.event_type.as_deref())
            .add_or_unknown("ended", Some(if row.ended { "true" } else { "false" }))
            .add_non_empty("begin", row.begin.as_deref())
            .add_non_empty("end", row.end.as_deref());

        let store = StoreBuilder::new(EventStore {
            id: row.gid.clone(),
            name: row.name.clone(),
            disambiguation: row.comment.clone().filter(|c| !c.is_empty()),
            event_type: row.event_type.clone(),
            life_span: LifeSpan {
                begin: row.begin.clone(),
                end: row.end.clone(),
                ended: row.ended,
            },
        });
        let store = add_aliases(&mut doc, store, ALIAS_FIELDS, side.aliases.get(&row.id));
        let store = add_relations(&mut doc, store, EVENT_RELATIONS, side.relations.get(&row.id));
        let store = add_tags(&mut doc, store, "tag", side.tags.get(&row.id));

        doc.add_text(STORE_FIELD, finish_store(store, timings)?);
        Ok(Some(doc))
    }
}
