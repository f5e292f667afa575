//! Release documents

use super::{finish_store, legacy_release_type, require_gid, EntityBuilder};
use crate::side::{add_credit, add_tags, CREDIT_FIELDS};
use crate::source::{
    group_by, ArtistCreditRow, CatalogSource, MediumRow, ReleaseEventRow, ReleaseLabelRow,
    ReleaseRow, TagRow,
};
use crate::store::{
    LabelInfoEntry, MediumEntry, ReleaseEventEntry, ReleaseGroupEntry, ReleaseStore,
    StoreBuilder,
};
use crate::timing::PhaseTimings;
use musearch_core::{Document, IdRange, IndexKind, Result, ID_FIELD, NO_VALUE, STORE_FIELD};
use std::collections::BTreeMap;

/// Side-maps of a release chunk.
#[derive(Debug, Default)]
pub struct ReleaseSideMaps {
    credits: BTreeMap<u32, ArtistCreditRow>,
    events: BTreeMap<u32, Vec<ReleaseEventRow>>,
    labels: BTreeMap<u32, Vec<ReleaseLabelRow>>,
    mediums: BTreeMap<u32, Vec<MediumRow>>,
    tags: BTreeMap<u32, Vec<TagRow>>,
}

/// Builds the `release` index.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseBuilder;

impl EntityBuilder for ReleaseBuilder {
    type Row = ReleaseRow;
    type SideMaps = ReleaseSideMaps;

    fn kind(&self) -> IndexKind {
        IndexKind::Release
    }

    fn load_side_maps(&self, source: &dyn CatalogSource, range: IdRange) -> Result<ReleaseSideMaps> {
        let mut mediums = group_by(source.mediums_in(range)?, |m| m.release);
        for media in mediums.values_mut() {
            media.sort_by_key(|m| m.position);
        }
        Ok(ReleaseSideMaps {
            credits: source.entity_artist_credits(IndexKind::Release, range)?,
            events: group_by(source.release_events_in(range)?, |e| e.release),
            labels: group_by(source.release_labels(range)?, |l| l.release),
            mediums,
            tags: group_by(source.tags(IndexKind::Release, range)?, |t| t.entity),
        })
    }

    fn fetch_rows(&self, source: &dyn CatalogSource, range: IdRange) -> Result<Vec<ReleaseRow>> {
        source.releases(range)
    }

    fn row_id(&self, row: &ReleaseRow) -> u32 {
        row.id
    }

    fn build(
        &self,
        row: &ReleaseRow,
        side: &ReleaseSideMaps,
        timings: &PhaseTimings,
    ) -> Result<Option<Document>> {
        require_gid(IndexKind::Release, row.id, &row.gid)?;

        let legacy_type = legacy_release_type(row.primary_type.as_deref(), &row.secondary_types);

        let mut doc = Document::new();
        doc.add_text(ID_FIELD, row.id.to_string())
            .add_text("reid", &row.gid)
            .add_text("release", &row.name)
            .add_text("releaseaccent", &row.name)
            .add_or_no_value("comment", row.comment.as_deref())
            .add_or_unknown("status", row.status.as_deref())
            .add_or_unknown("primarytype", row.primary_type.as_deref());
        for secondary in &row.secondary_types {
            doc.add_text("secondarytype", secondary);
        }
        doc.add_or_unknown("type", legacy_type.as_deref())
            .add_or_unknown("packaging", row.packaging.as_deref())
            .add_or_no_value("barcode", row.barcode.as_deref())
            .add_or_unknown("lang", row.language.as_deref())
            .add_or_unknown("script", row.script.as_deref())
            .add_or_unknown("rgid", Some(row.release_group.as_str()));

        let artist_credit = side
            .credits
            .get(&row.id)
            .map(|credit| add_credit(&mut doc, CREDIT_FIELDS, credit));

        let events: Vec<ReleaseEventEntry> = side
            .events
            .get(&row.id)
            .map(|events| {
                events
                    .iter()
                    .map(|e| ReleaseEventEntry {
                        date: e.date.clone(),
                        country: e.country.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        if events.is_empty() {
            doc.add_text("date", NO_VALUE).add_text("country", NO_VALUE);
        }
        for event in &events {
            doc.add_or_no_value("date", event.date.as_deref())
                .add_or_no_value("country", event.country.as_deref());
        }

        // laid, label and catno form one parallel group.
        let labels: Vec<LabelInfoEntry> = side
            .labels
            .get(&row.id)
            .map(|labels| {
                labels
                    .iter()
                    .map(|l| LabelInfoEntry {
                        label_id: l.label_gid.clone(),
                        name: l.label_name.clone(),
                        catalog_number: l.catalog_number.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        if labels.is_empty() {
            doc.add_text("laid", NO_VALUE)
                .add_text("label", NO_VALUE)
                .add_text("catno", NO_VALUE);
        }
        for label in &labels {
            doc.add_or_no_value("laid", label.label_id.as_deref())
                .add_or_no_value("label", label.name.as_deref())
                .add_or_no_value("catno", label.catalog_number.as_deref());
        }

        let media: Vec<MediumEntry> = side
            .mediums
            .get(&row.id)
            .map(|media| {
                media
                    .iter()
                    .map(|m| MediumEntry {
                        position: m.position,
                        format: m.format.clone(),
                        track_count: m.track_count,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let track_count: u32 = media.iter().map(|m| m.track_count).sum();
        for medium in &media {
            doc.add_or_no_value("format", medium.format.as_deref())
                .add_int("tracksmedium", medium.track_count as i32);
        }
        doc.add_int("mediums", media.len() as i32)
            .add_int("tracks", track_count as i32);

        let store = StoreBuilder::new(ReleaseStore {
            id: row.gid.clone(),
            title: row.name.clone(),
            disambiguation: row.comment.clone().filter(|c| !c.is_empty()),
            status: row.status.clone(),
            packaging: row.packaging.clone(),
            barcode: row.barcode.clone(),
            language: row.language.clone(),
            script: row.script.clone(),
            release_group: ReleaseGroupEntry {
                id: row.release_group.clone(),
                primary_type: row.primary_type.clone(),
                secondary_types: row.secondary_types.clone(),
                legacy_type,
            },
            artist_credit,
            release_events: events,
            labels,
            media,
            track_count,
        });
        let store = add_tags(&mut doc, store, "tag", side.tags.get(&row.id));

        doc.add_text(STORE_FIELD, finish_store(store, timings)?);
        Ok(Some(doc))
    }
}
