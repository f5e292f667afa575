//! Work documents

use super::{finish_store, require_gid, EntityBuilder};
use crate::side::{add_aliases, add_relations, add_tags, RelationFields, ALIAS_FIELDS};
use crate::source::{
    group_by, AliasRow, CatalogSource, CodeKind, CodeRow, RelationRow, RelationTarget, TagRow,
    WorkRow,
};
use crate::store::{StoreBuilder, WorkStore};
use crate::timing::PhaseTimings;
use musearch_core::{Document, IdRange, IndexKind, Result, ID_FIELD, NO_VALUE, STORE_FIELD};
use std::collections::BTreeMap;

const WORK_RELATIONS: RelationFields = &[
    (RelationTarget::Artist, "arid", "artist"),
    (RelationTarget::Recording, "rid", "recording"),
];

/// Side-maps of a work chunk.
#[derive(Debug, Default)]
pub struct WorkSideMaps {
    aliases: BTreeMap<u32, Vec<AliasRow>>,
    tags: BTreeMap<u32, Vec<TagRow>>,
    relations: BTreeMap<u32, Vec<RelationRow>>,
    iswcs: BTreeMap<u32, Vec<CodeRow>>,
}

/// Builds the `work` index.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkBuilder;

impl EntityBuilder for WorkBuilder {
    type Row = WorkRow;
    type SideMaps = WorkSideMaps;

    fn kind(&self) -> IndexKind {
        IndexKind::Work
    }

    fn load_side_maps(&self, source: &dyn CatalogSource, range: IdRange) -> Result<WorkSideMaps> {
        Ok(WorkSideMaps {
            aliases: group_by(source.aliases(IndexKind::Work, range)?, |a| a.entity),
            tags: group_by(source.tags(IndexKind::Work, range)?, |t| t.entity),
            relations: group_by(source.relations(IndexKind::Work, range)?, |r| r.entity),
            iswcs: group_by(source.codes(CodeKind::Iswc, range)?, |c| c.entity),
        })
    }

    fn fetch_rows(&self, source: &dyn CatalogSource, range: IdRange) -> Result<Vec<WorkRow>> {
        source.works(range)
    }

    fn row_id(&self, row: &WorkRow) -> u32 {
        row.id
    }

    fn build(
        &self,
        row: &WorkRow,
        side: &WorkSideMaps,
        timings: &PhaseTimings,
    ) -> Result<Option<Document>> {
        require_gid(IndexKind::Work, row.id, &row.gid)?;

        let mut doc = Document::new();
        doc.add_text(ID_FIELD, row.id.to_string())
            .add_text("wid", &row.gid)
            .add_text("work", &row.name)
            .add_text("workaccent", &row.name)
            .add_or_no_value("type", row.work_type.as_deref())
            .add_or_no_value("comment", row.comment.as_deref());

        let iswcs: Vec<String> = side
            .iswcs
            .get(&row.id)
            .map(|codes| codes.iter().map(|c| c.code.clone()).collect())
            .unwrap_or_default();
        if iswcs.is_empty() {
            doc.add_text("iswc", NO_VALUE);
        }
        for iswc in &iswcs {
            doc.add_text("iswc", iswc);
        }

        if row.languages.is_empty() {
            doc.add_text("lang", NO_VALUE);
        }
        for lang in &row.languages {
            doc.add_text("lang", lang);
        }

        let store = StoreBuilder::new(WorkStore {
            id: row.gid.clone(),
            title: row.name.clone(),
            disambiguation: row.comment.clone().filter(|c| !c.is_empty()),
            work_type: row.work_type.clone(),
            languages: row.languages.clone(),
            iswcs,
        });
        let store = add_aliases(&mut doc, store, ALIAS_FIELDS, side.aliases.get(&row.id));
        let store = add_relations(&mut doc, store, WORK_RELATIONS, side.relations.get(&row.id));
        let store = add_tags(&mut doc, store, "tag", side.tags.get(&row.id));

        doc.add_text(STORE_FIELD, finish_store(store, timings)?);
        Ok(Some(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CatalogData, MemoryCatalog};
    use crate::store::StoreBlob;
    use musearch_core::Error;
    use std::collections::HashMap;

    fn relation(target: RelationTarget, gid: &str, name: &str) -> RelationRow {
        RelationRow {
            entity: 3,
            target,
            target_gid: gid.into(),
            target_name: name.into(),
            relation_type: Some("composer".into()),
        }
    }

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(CatalogData {
            works: vec![
                WorkRow {
                    id: 3,
                    gid: "w3".into(),
                    name: "Atmosphere".into(),
                    work_type: Some("Song".into()),
                    languages: vec!["eng".into()],
                    ..Default::default()
                },
                WorkRow {
                    id: 4,
                    gid: "w4".into(),
                    name: "Untitled".into(),
                    ..Default::default()
                },
            ],
            relations: HashMap::from([(
                IndexKind::Work,
                vec![
                    relation(RelationTarget::Artist, "a1", "Ian Curtis"),
                    relation(RelationTarget::Recording, "r1", "Atmosphere"),
                    relation(RelationTarget::Area, "ar1", "Macclesfield"),
                ],
            )]),
            codes: HashMap::from([(
                CodeKind::Iswc,
                vec![CodeRow { entity: 3, code: "T-010.523.987-2".into() }],
            )]),
            ..Default::default()
        })
    }

    #[test]
    fn test_work_relations_and_codes() {
        let docs = WorkBuilder
            .build_range(&catalog(), IdRange::new(0, 9), &PhaseTimings::new())
            .unwrap();
        let work = &docs[0];
        assert_eq!(work.texts("arid"), vec!["a1"]);
        assert_eq!(work.texts("artist"), vec!["Ian Curtis"]);
        assert_eq!(work.texts("rid"), vec!["r1"]);
        assert_eq!(work.texts("iswc"), vec!["T-010.523.987-2"]);
        assert_eq!(work.texts("lang"), vec!["eng"]);

        let blob = StoreBlob::<WorkStore>::parse(work.get(STORE_FIELD).unwrap()).unwrap();
        assert_eq!(blob.relations.len(), 2);
        assert_eq!(blob.entity.iswcs, vec!["T-010.523.987-2"]);
    }

    #[test]
    fn test_no_value_for_missing_lists() {
        let docs = WorkBuilder
            .build_range(&catalog(), IdRange::new(4, 4), &PhaseTimings::new())
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].texts("iswc"), vec![NO_VALUE]);
        assert_eq!(docs[0].texts("lang"), vec![NO_VALUE]);
        assert_eq!(docs[0].get("type"), Some(NO_VALUE));
        assert!(!docs[0].has("arid"));
    }

    #[test]
    fn test_missing_gid_fails() {
        let catalog = catalog();
        catalog.update(|d| d.works[1].gid.clear());
        let err = WorkBuilder
            .build_range(&catalog, IdRange::new(0, 9), &PhaseTimings::new())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedRow { id: 4, .. }));
    }
}
