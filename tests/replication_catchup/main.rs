//! Keeping built indexes current: archived packets on disk and the live
//! change log in the source database.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use musearch::core::{Change, IndexKind, Operation};
use musearch::engine::MemoryStore;
use musearch::index::{MemoryCatalog, Updater};
use musearch::replication::{
    packet_file_name, ChangeLog, DirectoryRepository, PacketWriter, SqliteChangeLog,
};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

fn write_packet(dir: &Path, sequence: i32, changes: &[Change]) {
    PacketWriter::new(3)
        .write(sequence, SCHEMA_SEQUENCE, changes, &dir.join(packet_file_name(sequence)))
        .unwrap();
}

fn labels_built(store: &Arc<MemoryStore>) -> Arc<MemoryCatalog> {
    let catalog = Arc::new(MemoryCatalog::new(musearch::index::CatalogData {
        labels: vec![label(1, "Warp"), label(2, "Factory"), label(3, "Mute")],
        ..empty_catalog()
    }));
    let summary = orchestrator(&catalog, store, config(&[IndexKind::Label], 2))
        .run()
        .unwrap();
    assert!(summary.all_succeeded());
    catalog
}

// ============================================================================
// Archived packets
// ============================================================================

#[test]
fn test_offline_catch_up_applies_packets_in_order() {
    let indexes = tempfile::tempdir().unwrap();
    let packets = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::persistent(indexes.path()));
    let catalog = labels_built(&store);

    catalog.update(|d| {
        d.labels[0].name = "Warp Records".to_string();
        d.labels.retain(|l| l.id != 2);
        d.labels.push(label(4, "Creation"));
    });
    write_packet(packets.path(), 101, &[change(500, "label", Operation::Update, 1)]);
    write_packet(
        packets.path(),
        102,
        &[
            change(501, "label", Operation::Delete, 2),
            change(502, "label", Operation::Insert, 4),
        ],
    );

    let updater = Updater::new(catalog.clone(), store.clone());
    let repository = DirectoryRepository::new(packets.path());
    let reports = updater.catch_up_offline(IndexKind::Label, &repository).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].replication_sequence, 101);
    assert_eq!(reports[1].replication_sequence, 102);
    assert_eq!(reports[1].last_change_id, Some(502));
    assert!(reports.iter().all(|r| !r.stalled));

    assert_eq!(doc_freq(&store, IndexKind::Label, "label", "records"), 1);
    assert!(doc_by_id(&store, IndexKind::Label, 2).is_none());
    assert!(doc_by_id(&store, IndexKind::Label, 4).is_some());
    assert_eq!(entity_docs(&store, IndexKind::Label).len(), 3);

    // Nothing newer to apply.
    assert!(updater
        .catch_up_offline(IndexKind::Label, &repository)
        .unwrap()
        .is_empty());

    // The new state is on disk with the documents.
    let reopened = Arc::new(MemoryStore::persistent(indexes.path()));
    let state = Updater::new(catalog, reopened.clone())
        .state(IndexKind::Label)
        .unwrap();
    assert_eq!(state.replication_sequence, 102);
    assert_eq!(state.last_change_id, Some(502));
    assert!(doc_by_id(&reopened, IndexKind::Label, 4).is_some());
}

#[test]
fn test_gap_in_packets_stops_catch_up() {
    let packets = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::in_memory());
    let catalog = labels_built(&store);
    write_packet(packets.path(), 101, &[change(500, "label", Operation::Update, 1)]);
    write_packet(packets.path(), 103, &[change(510, "label", Operation::Update, 3)]);

    let updater = Updater::new(catalog, store);
    let reports = updater
        .catch_up_offline(IndexKind::Label, &DirectoryRepository::new(packets.path()))
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(updater.state(IndexKind::Label).unwrap().replication_sequence, 101);
}

#[test]
fn test_packet_from_other_schema_rejected() {
    let packets = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::in_memory());
    let catalog = labels_built(&store);
    PacketWriter::new(3)
        .write(
            101,
            SCHEMA_SEQUENCE + 1,
            &[change(500, "label", Operation::Update, 1)],
            &packets.path().join(packet_file_name(101)),
        )
        .unwrap();

    let updater = Updater::new(catalog, store);
    assert!(updater
        .catch_up_offline(IndexKind::Label, &DirectoryRepository::new(packets.path()))
        .is_err());
    assert_eq!(
        updater.state(IndexKind::Label).unwrap().replication_sequence,
        REPLICATION_SEQUENCE
    );
}

// ============================================================================
// Live change log
// ============================================================================

fn change_log(replication_sequence: i32) -> SqliteChangeLog {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE replication_control (
             current_schema_sequence INTEGER,
             current_replication_sequence INTEGER);
         INSERT INTO replication_control VALUES ({}, {});
         CREATE TABLE dbmirror_pending (seqid INTEGER, tablename TEXT, op TEXT);
         CREATE TABLE dbmirror_pendingdata (seqid INTEGER, iskey TEXT, data TEXT);
         INSERT INTO dbmirror_pending VALUES (5, '\"musicbrainz\".\"recording\"', 'u');
         INSERT INTO dbmirror_pendingdata VALUES (5, 'f', '\"id\"=''2'' \"name\"=''Crocodiles'' ');
         INSERT INTO dbmirror_pendingdata VALUES (5, 't', '\"id\"=''2'' \"name\"=''Villiers Terrace'' ');",
        SCHEMA_SEQUENCE, replication_sequence
    ))
    .unwrap();
    SqliteChangeLog::new(conn)
}

#[test]
fn test_update_fragments_merge_into_one_change() {
    let log = change_log(101);
    let packet = log.pending_since(None).unwrap().unwrap();
    assert_eq!(packet.batch.changes.len(), 1);
    let update = &packet.batch.changes[0];
    assert_eq!(update.id, 5);
    assert_eq!(update.operation, Operation::Update);
    assert_eq!(
        update.old_values.as_ref().unwrap()["name"].as_deref(),
        Some("Crocodiles")
    );
    assert_eq!(
        update.new_values.as_ref().unwrap()["name"].as_deref(),
        Some("Villiers Terrace")
    );
}

#[test]
fn test_online_catch_up_follows_change_log() {
    let (catalog, store, _) = build(crocodiles(), &[IndexKind::Recording], 10);
    catalog.update(|d| d.recordings[0].name = "Villiers Terrace".to_string());
    let log = change_log(101);
    let updater = Updater::new(catalog.clone(), store.clone());

    let report = updater
        .catch_up_online(IndexKind::Recording, &log)
        .unwrap()
        .unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.rebuilt, 1);
    assert_eq!(report.last_change_id, Some(5));
    assert_eq!(report.replication_sequence, 101);
    assert_eq!(doc_freq(&store, IndexKind::Recording, "recording", "villiers"), 1);
    // The track title still carries the old name.
    assert_eq!(doc_freq(&store, IndexKind::Recording, "recording", "bonus"), 1);

    // Seen changes are not applied again.
    let again = updater
        .catch_up_online(IndexKind::Recording, &log)
        .unwrap()
        .unwrap();
    assert_eq!(again.applied, 0);
    assert_eq!(again.last_change_id, Some(5));

    // A track change rebuilds the recording it belongs to.
    catalog.update(|d| d.tracks[0].name = "Crocodiles (live)".to_string());
    log.connection()
        .execute_batch(
            "INSERT INTO dbmirror_pending VALUES (6, '\"musicbrainz\".\"track\"', 'u');
             INSERT INTO dbmirror_pendingdata VALUES (6, 'f', '\"id\"=''7'' \"recording\"=''2'' ');
             INSERT INTO dbmirror_pendingdata VALUES (6, 't', '\"id\"=''7'' \"recording\"=''2'' ');",
        )
        .unwrap();
    let report = updater
        .catch_up_online(IndexKind::Recording, &log)
        .unwrap()
        .unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.last_change_id, Some(6));
    assert_eq!(doc_freq(&store, IndexKind::Recording, "recording", "live"), 1);
    assert_eq!(doc_freq(&store, IndexKind::Recording, "recording", "bonus"), 0);
    assert_eq!(entity_docs(&store, IndexKind::Recording).len(), 1);
}

#[test]
fn test_online_catch_up_stops_at_undecodable_change() {
    let (catalog, store, _) = build(crocodiles(), &[IndexKind::Recording], 10);
    let log = change_log(101);
    log.connection()
        .execute_batch(
            "INSERT INTO dbmirror_pending VALUES (6, 'recording', 'd');
             INSERT INTO dbmirror_pendingdata VALUES (6, '?', '\"id\"=''2'' ');
             INSERT INTO dbmirror_pending VALUES (7, 'recording', 'd');
             INSERT INTO dbmirror_pendingdata VALUES (7, 't', '\"id\"=''2'' ');",
        )
        .unwrap();

    let updater = Updater::new(catalog, store.clone());
    let report = updater
        .catch_up_online(IndexKind::Recording, &log)
        .unwrap()
        .unwrap();
    assert!(report.stalled);
    assert_eq!(report.applied, 1);
    assert_eq!(report.held_back, 1);
    assert_eq!(report.last_change_id, Some(5));
    // The sequence is only advanced once everything applied.
    assert_eq!(report.replication_sequence, REPLICATION_SEQUENCE);
    // The delete after the bad change was held back.
    assert!(doc_by_id(&store, IndexKind::Recording, 2).is_some());
}

#[test]
fn test_source_without_change_log() {
    let (catalog, store, _) = build(crocodiles(), &[IndexKind::Recording], 10);
    let log = SqliteChangeLog::new(Connection::open_in_memory().unwrap());
    let updater = Updater::new(catalog, store);
    assert!(updater
        .catch_up_online(IndexKind::Recording, &log)
        .unwrap()
        .is_none());
}
