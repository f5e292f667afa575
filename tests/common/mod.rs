//! Shared fixtures for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use musearch::core::{Change, ColumnValues, Document, IndexKind, Operation, ID_FIELD};
use musearch::engine::{IndexStore, MemoryStore, Query, SearchOptions};
use musearch::index::source::{
    ArtistCreditRow, ArtistRow, LabelRow, MediumRow, NameCreditRow, RecordingRow,
    ReleaseEventRow, ReleaseRow, TrackRow,
};
use musearch::index::{BuildConfig, CatalogData, CatalogSource, MemoryCatalog, Orchestrator, RunSummary};
use std::sync::Arc;

pub const SCHEMA_SEQUENCE: i32 = 27;
pub const REPLICATION_SEQUENCE: i32 = 100;

// ============================================================================
// Catalog rows
// ============================================================================

pub fn label(id: u32, name: &str) -> LabelRow {
    LabelRow {
        id,
        gid: format!("label-{}", id),
        name: name.to_string(),
        ..Default::default()
    }
}

pub fn artist(id: u32, name: &str) -> ArtistRow {
    ArtistRow {
        id,
        gid: format!("artist-{}", id),
        name: name.to_string(),
        sort_name: name.to_string(),
        ..Default::default()
    }
}

pub fn recording(id: u32, name: &str) -> RecordingRow {
    RecordingRow {
        id,
        gid: format!("rec-{}", id),
        name: name.to_string(),
        ..Default::default()
    }
}

pub fn credit(id: u32, name: &str) -> ArtistCreditRow {
    ArtistCreditRow {
        id,
        names: vec![NameCreditRow {
            artist_gid: format!("artist-{}", id),
            artist_name: name.to_string(),
            artist_sort_name: name.to_string(),
            ..Default::default()
        }],
    }
}

/// Empty catalog at the shared schema and replication sequence.
pub fn empty_catalog() -> CatalogData {
    CatalogData {
        schema_sequence: SCHEMA_SEQUENCE,
        replication_sequence: REPLICATION_SEQUENCE,
        ..Default::default()
    }
}

/// One recording released once, on the second disc of a two-disc album,
/// under a slightly different title and length.
pub fn crocodiles() -> CatalogData {
    CatalogData {
        recordings: vec![RecordingRow {
            length: Some(33000),
            artist_credit: Some(10),
            ..recording(2, "Crocodiles")
        }],
        releases: vec![ReleaseRow {
            id: 1,
            gid: "rel-1".into(),
            name: "Crocodiles".into(),
            status: Some("Official".into()),
            release_group: "rg-1".into(),
            primary_type: Some("Album".into()),
            artist_credit: Some(10),
            ..Default::default()
        }],
        tracks: vec![TrackRow {
            id: 7,
            gid: "trk-7".into(),
            recording: 2,
            release: 1,
            name: "Crocodiles (bonus disc)".into(),
            length: Some(33100),
            number: Some("1".into()),
            position: 1,
            medium_position: 2,
            medium_format: Some("CD".into()),
            medium_track_count: 10,
            artist_credit: Some(10),
        }],
        mediums: vec![
            MediumRow { release: 1, position: 1, format: Some("CD".into()), track_count: 10 },
            MediumRow { release: 1, position: 2, format: Some("CD".into()), track_count: 10 },
        ],
        release_events: vec![ReleaseEventRow {
            release: 1,
            date: Some("1980-07-18".into()),
            country: Some("GB".into()),
        }],
        artist_credits: vec![credit(10, "Echo & the Bunnymen")],
        ..empty_catalog()
    }
}

/// Artists whose names overlap in interesting ways for ranking.
pub fn bristol() -> CatalogData {
    CatalogData {
        artists: vec![
            artist(1, "Massive Attack"),
            artist(2, "Portishead"),
            artist(3, "Tricky"),
            artist(4, "Attack Attack!"),
            artist(5, "Massive"),
        ],
        ..empty_catalog()
    }
}

// ============================================================================
// Building
// ============================================================================

pub fn config(indexes: &[IndexKind], chunk_size: u32) -> BuildConfig {
    BuildConfig {
        chunk_size,
        workers: Some(2),
        queue_depth: 4,
        indexes: indexes.to_vec(),
        ..Default::default()
    }
}

pub fn orchestrator(
    catalog: &Arc<MemoryCatalog>,
    store: &Arc<MemoryStore>,
    config: BuildConfig,
) -> Orchestrator {
    let source: Arc<dyn CatalogSource> = catalog.clone();
    let store: Arc<dyn IndexStore> = store.clone();
    Orchestrator::new(config, source, store).unwrap()
}

/// Build `indexes` from `data` into a fresh in-memory store.
pub fn build(
    data: CatalogData,
    indexes: &[IndexKind],
    chunk_size: u32,
) -> (Arc<MemoryCatalog>, Arc<MemoryStore>, RunSummary) {
    let catalog = Arc::new(MemoryCatalog::new(data));
    let store = Arc::new(MemoryStore::in_memory());
    let summary = orchestrator(&catalog, &store, config(indexes, chunk_size))
        .run()
        .unwrap();
    (catalog, store, summary)
}

// ============================================================================
// Reading
// ============================================================================

/// Every entity document in `kind`, ordered by `_id`.
pub fn entity_docs(store: &MemoryStore, kind: IndexKind) -> Vec<Document> {
    let reader = store.open_reader(kind).unwrap();
    let mut docs: Vec<Document> = reader
        .search(&Query::MatchAll, &SearchOptions::new(0, 10_000))
        .unwrap()
        .hits
        .into_iter()
        .map(|h| h.doc)
        .filter(|d| d.has(ID_FIELD))
        .collect();
    docs.sort_by_key(|d| d.get(ID_FIELD).and_then(|id| id.parse::<u32>().ok()));
    docs
}

pub fn doc_by_id(store: &MemoryStore, kind: IndexKind, id: u32) -> Option<Document> {
    let reader = store.open_reader(kind).unwrap();
    let top = reader
        .search(&Query::term(ID_FIELD, &id.to_string()), &SearchOptions::new(0, 5))
        .unwrap();
    assert!(top.hits.len() <= 1, "duplicate documents for {}", id);
    top.hits.into_iter().next().map(|h| h.doc)
}

pub fn doc_freq(store: &MemoryStore, kind: IndexKind, field: &str, term: &str) -> u64 {
    store.open_reader(kind).unwrap().doc_freq(field, term)
}

// ============================================================================
// Changes
// ============================================================================

pub fn cols(pairs: &[(&str, &str)]) -> ColumnValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect()
}

/// A change to `table` row `row_id`, carrying only the id column.
pub fn change(id: i64, table: &str, operation: Operation, row_id: u32) -> Change {
    let values = cols(&[("id", &row_id.to_string())]);
    Change {
        id,
        table: table.to_string(),
        operation,
        old_values: operation.has_old_values().then(|| values.clone()),
        new_values: operation.has_new_values().then_some(values),
    }
}
