//! Full builds through the orchestrator: chunking, persistence, state
//! stamping and per-index failure isolation.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use musearch::core::numeric::encode_int;
use musearch::core::{IndexKind, ID_FIELD, STORE_FIELD, UNKNOWN};
use musearch::engine::{IndexStore, MemoryStore};
use musearch::index::source::AnnotationRow;
use musearch::index::{CatalogData, MemoryCatalog, Updater};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;

fn labels_and_artists(n: u32) -> CatalogData {
    CatalogData {
        labels: (1..=n).map(|i| label(i, &format!("Label {}", i))).collect(),
        artists: (1..=n).map(|i| artist(i, &format!("Artist {}", i))).collect(),
        ..empty_catalog()
    }
}

// ============================================================================
// Document content
// ============================================================================

#[test]
fn test_crocodiles_indexed_from_recording_and_track() {
    let (_, store, summary) = build(crocodiles(), &[IndexKind::Recording], 2);
    assert!(summary.all_succeeded());

    let docs = entity_docs(&store, IndexKind::Recording);
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.get(ID_FIELD), Some("2"));
    assert_eq!(doc.get("rid"), Some("rec-2"));

    // Both lengths and both titles are searchable.
    let k = IndexKind::Recording;
    assert_eq!(doc_freq(&store, k, "duration", &encode_int(33000)), 1);
    assert_eq!(doc_freq(&store, k, "duration", &encode_int(33100)), 1);
    assert_eq!(doc_freq(&store, k, "qdur", &encode_int(16)), 1);
    assert_eq!(doc_freq(&store, k, "recording", "crocodiles"), 1);
    assert_eq!(doc_freq(&store, k, "recording", "bonus"), 1);
    assert_eq!(doc_freq(&store, k, "position", &encode_int(2)), 1);
    assert_eq!(doc_freq(&store, k, "artist", "bunnymen"), 1);
}

#[test]
fn test_only_stored_fields_come_back() {
    let (_, store, _) = build(crocodiles(), &[IndexKind::Recording], 10);
    let doc = doc_by_id(&store, IndexKind::Recording, 2).unwrap();
    for field in doc.fields() {
        assert!(
            [ID_FIELD, "rid", STORE_FIELD].contains(&field.name.as_str()),
            "unexpected stored field {}",
            field.name
        );
    }
    assert!(doc.has(STORE_FIELD));
}

#[test]
fn test_missing_attributes_searchable_as_unknown() {
    let (_, store, _) = build(labels_and_artists(3), &[IndexKind::Artist], 10);
    assert_eq!(doc_freq(&store, IndexKind::Artist, "gender", UNKNOWN), 3);
    assert_eq!(doc_freq(&store, IndexKind::Artist, "type", UNKNOWN), 3);
}

// ============================================================================
// Chunking and parallelism
// ============================================================================

#[test]
fn test_chunk_size_does_not_change_documents() {
    let kinds = [IndexKind::Label, IndexKind::Artist];
    let (_, one, _) = build(labels_and_artists(25), &kinds, 1);
    let (_, seven, _) = build(labels_and_artists(25), &kinds, 7);
    let (_, whole, _) = build(labels_and_artists(25), &kinds, 1_000);

    for kind in kinds {
        let reference = entity_docs(&whole, kind);
        assert_eq!(reference.len(), 25);
        assert_eq!(entity_docs(&one, kind), reference, "{}", kind);
        assert_eq!(entity_docs(&seven, kind), reference, "{}", kind);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn test_any_chunk_size_builds_same_index(chunk_size in 1u32..40) {
        let (_, reference, _) = build(labels_and_artists(30), &[IndexKind::Label], 1_000);
        let (_, chunked, summary) = build(labels_and_artists(30), &[IndexKind::Label], chunk_size);
        prop_assert!(summary.all_succeeded());
        prop_assert_eq!(
            entity_docs(&chunked, IndexKind::Label),
            entity_docs(&reference, IndexKind::Label)
        );
    }
}

#[test]
fn test_chunk_counts_in_report() {
    let (_, _, summary) = build(labels_and_artists(25), &[IndexKind::Label], 7);
    let build = summary.indexes[0].build.as_ref().unwrap();
    // [0,6] [7,13] [14,20] [21,25]
    assert_eq!(build.chunks, 4);
    assert_eq!(build.documents, 25);
    assert_eq!(build.max_id, 25);
}

#[test]
fn test_every_index_built_in_one_run() {
    let mut data = crocodiles();
    data.artists = bristol().artists;
    data.labels = vec![label(1, "Factory"), label(2, "Warp")];
    data.annotations = vec![
        AnnotationRow {
            id: 1,
            entity_type: "artist".into(),
            entity_gid: "artist-2".into(),
            entity_name: "Portishead".into(),
            text: Some("Formed in Bristol in 1991.".into()),
            created: Utc.with_ymd_and_hms(2012, 5, 1, 12, 0, 0).unwrap(),
        },
        AnnotationRow {
            id: 2,
            entity_type: "artist".into(),
            entity_gid: "artist-3".into(),
            entity_name: "Tricky".into(),
            text: None,
            created: Utc.with_ymd_and_hms(2013, 1, 9, 8, 30, 0).unwrap(),
        },
    ];
    let (_, store, summary) = build(data, &[], 3);

    assert_eq!(summary.indexes.len(), IndexKind::ALL.len());
    for outcome in &summary.indexes {
        assert!(outcome.is_success(), "{}", outcome);
        let finalize = outcome.finalize.as_ref().unwrap().as_ref().unwrap();
        assert!(finalize.ok, "{}", finalize);
    }
    assert_eq!(entity_docs(&store, IndexKind::Artist).len(), 5);
    assert_eq!(entity_docs(&store, IndexKind::Label).len(), 2);
    assert_eq!(entity_docs(&store, IndexKind::Release).len(), 1);
    // Annotations without text are left out.
    assert_eq!(entity_docs(&store, IndexKind::Annotation).len(), 1);
    assert_eq!(doc_freq(&store, IndexKind::Annotation, "text", "bristol"), 1);
    // Nothing to index, but the index exists with its state.
    assert_eq!(store.open_reader(IndexKind::Work).unwrap().num_docs(), 1);
}

// ============================================================================
// Replication state
// ============================================================================

#[test]
fn test_state_stamped_from_build_start() {
    let catalog = Arc::new(MemoryCatalog::new(labels_and_artists(9)));
    let store = Arc::new(MemoryStore::in_memory());
    let moving = Arc::clone(&catalog);
    let summary = orchestrator(&catalog, &store, config(&[IndexKind::Label], 2))
        .on_chunk_committed(move |_| moving.update(|d| d.replication_sequence += 1))
        .run()
        .unwrap();

    assert_eq!(summary.state.replication_sequence, REPLICATION_SEQUENCE);
    assert!(catalog.read(|d| d.replication_sequence) > REPLICATION_SEQUENCE);

    let updater = Updater::new(catalog, store);
    let state = updater.state(IndexKind::Label).unwrap();
    assert_eq!(state.replication_sequence, REPLICATION_SEQUENCE);
    assert_eq!(state.schema_sequence, SCHEMA_SEQUENCE);
    assert_eq!(state.last_change_id, None);
}

#[test]
fn test_failed_index_leaves_others_intact() {
    let catalog = Arc::new(MemoryCatalog::new(labels_and_artists(12)));
    catalog.fail_range_containing(IndexKind::Artist, 8);
    let store = Arc::new(MemoryStore::in_memory());
    let summary = orchestrator(&catalog, &store, config(&[IndexKind::Label, IndexKind::Artist], 4))
        .run()
        .unwrap();

    assert!(!summary.all_succeeded());
    for outcome in &summary.indexes {
        match outcome.kind {
            IndexKind::Label => assert!(outcome.is_success()),
            IndexKind::Artist => {
                assert!(outcome.build.is_err());
                assert!(outcome.to_string().contains("build failed"));
            }
            other => panic!("unexpected index {}", other),
        }
    }
    assert_eq!(entity_docs(&store, IndexKind::Label).len(), 12);

    // A failed build never claims to be current.
    let updater = Updater::new(catalog, store);
    assert!(updater.state(IndexKind::Artist).is_err());
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_built_indexes_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MemoryCatalog::new(labels_and_artists(6)));
    let built = {
        let store = Arc::new(MemoryStore::persistent(tmp.path()));
        let summary = orchestrator(&catalog, &store, config(&[IndexKind::Label], 4))
            .run()
            .unwrap();
        assert!(summary.all_succeeded());
        entity_docs(&store, IndexKind::Label)
    };
    assert!(tmp.path().join(IndexKind::Label.dir_name()).exists());

    let reopened = Arc::new(MemoryStore::persistent(tmp.path()));
    assert_eq!(entity_docs(&reopened, IndexKind::Label), built);
    let updater = Updater::new(catalog, reopened);
    assert_eq!(
        updater.state(IndexKind::Label).unwrap().replication_sequence,
        REPLICATION_SEQUENCE
    );
}

#[test]
fn test_rebuild_replaces_previous_index() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::persistent(tmp.path()));

    let first = Arc::new(MemoryCatalog::new(labels_and_artists(8)));
    orchestrator(&first, &store, config(&[IndexKind::Label], 3))
        .run()
        .unwrap();
    let second = Arc::new(MemoryCatalog::new(labels_and_artists(3)));
    orchestrator(&second, &store, config(&[IndexKind::Label], 3))
        .run()
        .unwrap();

    assert_eq!(entity_docs(&store, IndexKind::Label).len(), 3);
    let reopened = MemoryStore::persistent(tmp.path());
    assert_eq!(entity_docs(&reopened, IndexKind::Label).len(), 3);
}
