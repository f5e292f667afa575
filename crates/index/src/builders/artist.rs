//! Artist documents

use super::{finish_store, require_gid, EntityBuilder, DELETED_ARTIST_GID};
use crate::side::{add_aliases, add_tags, ALIAS_FIELDS};
use crate::source::{group_by, AliasRow, ArtistRow, CatalogSource, CodeKind, CodeRow, TagRow};
use crate::store::{ArtistStore, LifeSpan, StoreBuilder};
use crate::timing::PhaseTimings;
use musearch_core::{Document, IdRange, IndexKind, Result, ID_FIELD, STORE_FIELD};
use std::collections::BTreeMap;

/// Side-maps of an artist chunk.
#[derive(Debug, Default)]
pub struct ArtistSideMaps {
    aliases: BTreeMap<u32, Vec<AliasRow>>,
    tags: BTreeMap<u32, Vec<TagRow>>,
    ipis: BTreeMap<u32, Vec<CodeRow>>,
}

/// Builds the `artist` index.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtistBuilder;

impl EntityBuilder for ArtistBuilder {
    type Row = ArtistRow;
    type SideMaps = ArtistSideMaps;

    fn kind(&self) -> IndexKind {
        IndexKind::Artist
    }

    fn load_side_maps(&self, source: &dyn CatalogSource, range: IdRange) -> Result<ArtistSideMaps> {
        Ok(ArtistSideMaps {
            aliases: group_by(source.aliases(IndexKind::Artist, range)?, |a| a.entity),
            tags: group_by(source.tags(IndexKind::Artist, range)?, |t| t.entity),
            ipis: group_by(source.codes(CodeKind::ArtistIpi, range)?, |c| c.entity),
        })
    }

    fn fetch_rows(&self, source: &dyn CatalogSource, range: IdRange) -> Result<Vec<ArtistRow>> {
        source.artists(range)
    }

    fn row_id(&self, row: &ArtistRow) -> u32 {
        row.id
    }

    fn build(
        &self,
        row: &ArtistRow,
        side: &ArtistSideMaps,
        timings: &PhaseTimings,
    ) -> Result<Option<Document>> {
        if row.gid == DELETED_ARTIST_GID {
            return Ok(None);
        }
        require_gid(IndexKind::Artist, row.id, &row.gid)?;

        let sort_name = if row.sort_name.is_empty() {
            &row.name
        } else {
            &row.sort_name
        };

        let mut doc = Document::new();
        doc.add_text(ID_FIELD, row.id.to_string())
            .add_text("arid", &row.gid)
            .add_text("artist", &row.name)
            .add_text("artistaccent", &row.name)
            .add_text("sortname", sort_name)
            .add_or_unknown("type", row.artist_type.as_deref())
            .add_or_unknown("gender", row.gender.as_deref())
            .add_or_unknown("country", row.country.as_deref())
            .add_or_no_value("area", row.area.as_deref())
            .add_non_empty("begin", row.begin.as_deref())
            .add_non_empty("end", row.end.as_deref())
            .add_or_unknown("ended", Some(if row.ended { "true" } else { "false" }))
            .add_or_no_value("comment", row.comment.as_deref());

        let ipis: Vec<String> = side
            .ipis
            .get(&row.id)
            .map(|codes| codes.iter().map(|c| c.code.clone()).collect())
            .unwrap_or_default();
        for ipi in &ipis {
            doc.add_text("ipi", ipi);
        }

        let store = StoreBuilder::new(ArtistStore {
            id: row.gid.clone(),
            name: row.name.clone(),
            sort_name: sort_name.clone(),
            disambiguation: row.comment.clone().filter(|c| !c.is_empty()),
            artist_type: row.artist_type.clone(),
            gender: row.gender.clone(),
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
