//! Incremental index updates from replication packets.
//!
//! A packet is applied to one index in a single commit: every affected
//! entity document is deleted by `_id` and rebuilt from the source, and the
//! replication state is replaced with the advanced one. Changes at or below
//! the stored `last_change_id` are never applied again, and nothing at or
//! past the first undecodable change is applied at all.

use crate::builders::documents_for;
use crate::replication_state;
use crate::source::CatalogSource;
use crate::timing::PhaseTimings;
use chrono::Utc;
use musearch_core::{Change, Error, IdRange, IndexKind, ReplicationInfo, Result, ID_FIELD};
use musearch_engine::IndexStore;
use musearch_replication::{ChangeLog, PacketRepository, ReplicationPacket};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// Table dependencies
// ============================================================================

/// How a changed row leads to entity ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    /// The column holds the entity id.
    Column(&'static str),
    /// The column holds an artist credit id; every entity using it is
    /// affected.
    ArtistCredit(&'static str),
    /// The column holds a release id; every recording with a track on it is
    /// affected.
    ReleaseRecordings(&'static str),
}

/// One table an index depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    /// Sanitized table name
    pub table: &'static str,
    /// Dependent index
    pub kind: IndexKind,
    /// How to find the affected ids
    pub via: Via,
}

const fn dep(table: &'static str, kind: IndexKind, via: Via) -> Dependency {
    Dependency { table, kind, via }
}

/// Tables each index's documents are built from.
pub const DEPENDENCIES: &[Dependency] = &[
    dep("recording", IndexKind::Recording, Via::Column("id")),
    dep("track", IndexKind::Recording, Via::Column("recording")),
    dep("isrc", IndexKind::Recording, Via::Column("recording")),
    dep("recording_tag", IndexKind::Recording, Via::Column("recording")),
    dep("artist_credit", IndexKind::Recording, Via::ArtistCredit("id")),
    dep("artist_credit_name", IndexKind::Recording, Via::ArtistCredit("artist_credit")),
    dep("release", IndexKind::Recording, Via::ReleaseRecordings("id")),
    dep("medium", IndexKind::Recording, Via::ReleaseRecordings("release")),
    dep("release_country", IndexKind::Recording, Via::ReleaseRecordings("release")),
    dep("release_unknown_country", IndexKind::Recording, Via::ReleaseRecordings("release")),
    dep("release", IndexKind::Release, Via::Column("id")),
    dep("release_label", IndexKind::Release, Via::Column("release")),
    dep("medium", IndexKind::Release, Via::Column("release")),
    dep("release_country", IndexKind::Release, Via::Column("release")),
    dep("release_unknown_country", IndexKind::Release, Via::Column("release")),
    dep("release_tag", IndexKind::Release, Via::Column("release")),
    dep("artist_credit", IndexKind::Release, Via::ArtistCredit("id")),
    dep("artist_credit_name", IndexKind::Release, Via::ArtistCredit("artist_credit")),
    dep("work", IndexKind::Work, Via::Column("id")),
    dep("work_alias", IndexKind::Work, Via::Column("work")),
    dep("work_tag", IndexKind::Work, Via::Column("work")),
    dep("iswc", IndexKind::Work, Via::Column("work")),
    dep("l_artist_work", IndexKind::Work, Via::Column("entity1")),
    dep("l_recording_work", IndexKind::Work, Via::Column("entity1")),
    dep("artist", IndexKind::Artist, Via::Column("id")),
    dep("artist_alias", IndexKind::Artist, Via::Column("artist")),
    dep("artist_tag", IndexKind::Artist, Via::Column("artist")),
    dep("artist_ipi", IndexKind::Artist, Via::Column("artist")),
    dep("label", IndexKind::Label, Via::Column("id")),
    dep("label_alias", IndexKind::Label, Via::Column("label")),
    dep("label_tag", IndexKind::Label, Via::Column("label")),
    dep("label_ipi", IndexKind::Label, Via::Column("label")),
    dep("event", IndexKind::Event, Via::Column("id")),
    dep("event_tag", IndexKind::Event, Via::Column("event")),
    dep("l_artist_event", IndexKind::Event, Via::Column("entity1")),
    dep("l_event_place", IndexKind::Event, Via::Column("entity0")),
    dep("l_area_event", IndexKind::Event, Via::Column("entity1")),
    dep("annotation", IndexKind::Annotation, Via::Column("id")),
];

/// Dependencies of `kind` on `table`.
pub fn dependencies(kind: IndexKind, table: &str) -> impl Iterator<Item = &'static Dependency> + '_ {
    DEPENDENCIES
        .iter()
        .filter(move |d| d.kind == kind && d.table == table)
}

fn parse_ids(change: &Change, column: &str) -> Vec<u32> {
    change
        .values_of(column)
        .into_iter()
        .filter_map(|v| match v.parse::<u32>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(
                    target: "musearch::replication",
                    change = change.id,
                    table = %change.table,
                    column,
                    value = v,
                    "Ignoring non-numeric id"
                );
                None
            }
        })
        .collect()
}

/// Ids of `kind` documents a change invalidates.
pub fn affected_ids(
    kind: IndexKind,
    change: &Change,
    source: &dyn CatalogSource,
) -> Result<BTreeSet<u32>> {
    let mut ids = BTreeSet::new();
    for dependency in dependencies(kind, &change.table) {
        match dependency.via {
            Via::Column(column) => ids.extend(parse_ids(change, column)),
            Via::ArtistCredit(column) => {
                for credit in parse_ids(change, column) {
                    ids.extend(source.ids_with_artist_credit(kind, credit)?);
                }
            }
            Via::ReleaseRecordings(column) => {
                for release in parse_ids(change, column) {
                    ids.extend(source.recordings_on_release(release)?);
                }
            }
        }
    }
    Ok(ids)
}

// ============================================================================
// Updater
// ============================================================================

/// Where a packet came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOrigin {
    /// A numbered archive; skipped once its sequence has been applied.
    Archive,
    /// The live change log; its sequence is the database's current one.
    Live,
}

/// Result of applying one packet to one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Index name
    pub name: String,
    /// Replication sequence stored after the update
    pub replication_sequence: i32,
    /// Changes applied
    pub applied: usize,
    /// Changes not applied because they follow an undecodable one
    pub held_back: usize,
    /// Documents deleted by `_id`
    pub deleted: usize,
    /// Documents rebuilt
    pub rebuilt: usize,
    /// Last change id stored after the update
    pub last_change_id: Option<i64>,
    /// The packet contained undecodable changes
    pub stalled: bool,
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: sequence {} applied={} deleted={} rebuilt={} last_change_id={}",
            self.name,
            self.replication_sequence,
            self.applied,
            self.deleted,
            self.rebuilt,
            self.last_change_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string())
        )?;
        if self.stalled {
            write!(f, " (stalled, {} held back)", self.held_back)?;
        }
        Ok(())
    }
}

/// What applying a packet did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Changes were applied and the state advanced.
    Applied(UpdateReport),
    /// The index already reflects this archive.
    AlreadyApplied {
        /// Sequence of the packet
        packet: i32,
        /// Sequence stored in the index
        stored: i32,
    },
}

/// Applies replication packets to indexes.
pub struct Updater {
    source: Arc<dyn CatalogSource>,
    store: Arc<dyn IndexStore>,
}

impl Updater {
    /// Updater rebuilding documents from `source` into `store`.
    pub fn new(source: Arc<dyn CatalogSource>, store: Arc<dyn IndexStore>) -> Self {
        Updater { source, store }
    }

    /// Replication state stored in `kind`'s index.
    pub fn state(&self, kind: IndexKind) -> Result<ReplicationInfo> {
        let reader = self.store.open_reader(kind)?;
        replication_state::read(reader.as_ref())?.ok_or_else(|| {
            Error::ReplicationState(format!("index {} has no replication state", kind))
        })
    }

    /// Apply one packet to `kind`'s index.
    pub fn apply(
        &self,
        kind: IndexKind,
        packet: &ReplicationPacket,
        origin: PacketOrigin,
    ) -> Result<UpdateOutcome> {
        let state = self.state(kind)?;
        if packet.schema_sequence != state.schema_sequence {
            return Err(Error::ReplicationState(format!(
                "packet schema sequence {} does not match index {} schema sequence {}",
                packet.schema_sequence, kind, state.schema_sequence
            )));
        }
        if origin == PacketOrigin::Archive && packet.replication_sequence <= state.replication_sequence {
            debug!(
                target: "musearch::replication",
                index = kind.name(),
                packet = packet.replication_sequence,
                stored = state.replication_sequence,
                "Packet already applied"
            );
            return Ok(UpdateOutcome::AlreadyApplied {
                packet: packet.replication_sequence,
                stored: state.replication_sequence,
            });
        }

        let batch = &packet.batch;
        for dropped in &batch.dropped {
            warn!(
                target: "musearch::replication",
                index = kind.name(),
                change = dropped.seq_id,
                reason = %dropped.reason,
                "Dropped undecodable change"
            );
        }
        let applicable = batch.applicable();
        let held_back = batch.changes.len() - applicable.len();
        let fresh: Vec<&Change> = applicable
            .iter()
            .filter(|c| state.last_change_id.map_or(true, |last| c.id > last))
            .collect();

        let mut ids = BTreeSet::new();
        for change in &fresh {
            ids.extend(affected_ids(kind, change, self.source.as_ref())?);
        }

        let mut writer = self.store.open_writer(kind)?;
        let timings = PhaseTimings::new();
        let mut rebuilt = 0usize;
        for id in &ids {
            writer.delete_documents(ID_FIELD, &id.to_string())?;
            for doc in documents_for(kind, self.source.as_ref(), IdRange::single(*id), &timings)? {
                writer.add_document(doc)?;
                rebuilt += 1;
            }
        }

        let stalled = batch.first_bad.is_some();
        let last_change_id = match (fresh.last(), state.last_change_id) {
            (Some(change), _) => Some(change.id),
            (None, stored) => stored,
        };
        // A packet with an undecodable change must be fetched again.
        let replication_sequence = if stalled {
            state.replication_sequence
        } else {
            packet.replication_sequence.max(state.replication_sequence)
        };
        let next = ReplicationInfo {
            schema_sequence: state.schema_sequence,
            replication_sequence,
            last_change_id,
            last_updated: Utc::now(),
        };
        replication_state::write(writer.as_mut(), &next)?;

        let report = UpdateReport {
            name: kind.name().to_string(),
            replication_sequence,
            applied: fresh.len(),
            held_back,
            deleted: ids.len(),
            rebuilt,
            last_change_id,
            stalled,
        };
        info!(target: "musearch::replication", "{}", report);
        Ok(UpdateOutcome::Applied(report))
    }

    /// Apply the live change log past the index's last change id.
    ///
    /// `None` when the source has no change log.
    pub fn catch_up_online(&self, kind: IndexKind, log: &dyn ChangeLog) -> Result<Option<UpdateReport>> {
        let state = self.state(kind)?;
        let Some(packet) = log.pending_since(state.last_change_id)? else {
            return Ok(None);
        };
        match self.apply(kind, &packet, PacketOrigin::Live)? {
            UpdateOutcome::Applied(report) => Ok(Some(report)),
            UpdateOutcome::AlreadyApplied { .. } => Ok(None),
        }
    }

    /// Apply archived packets `N+1, N+2, ...` until the repository has no
    /// more or a packet stalls.
    pub fn catch_up_offline(
        &self,
        kind: IndexKind,
        repository: &dyn PacketRepository,
    ) -> Result<Vec<UpdateReport>> {
        let mut reports = Vec::new();
        loop {
            let next = self.state(kind)?.replication_sequence + 1;
            let Some(packet) = repository.packet(next)? else {
                debug!(
                    target: "musearch::replication",
                    index = kind.name(),
                    sequence = next,
                    "No further packet"
                );
                break;
            };
            match self.apply(kind, &packet, PacketOrigin::Archive)? {
                UpdateOutcome::Applied(report) => {
                    let stalled = report.stalled;
                    reports.push(report);
                    if stalled {
                        warn!(
                            target: "musearch::replication",
                            index = kind.name(),
                            sequence = next,
                            "Stopping at packet with undecodable changes"
                        );
                        break;
                    }
                }
                UpdateOutcome::AlreadyApplied { .. } => break,
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CatalogData, MemoryCatalog};
    use crate::source::LabelRow;
    use musearch_core::{ColumnValues, Document, Operation};
    use musearch_engine::{MemoryStore, Query, SearchOptions};
    use musearch_replication::{DecodedBatch, DroppedChange};

    fn label(id: u32, name: &str) -> LabelRow {
        LabelRow {
            id,
            gid: format!("label-{}", id),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn cols(pairs: &[(&str, &str)]) -> ColumnValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect()
    }

    fn change(id: i64, table: &str, operation: Operation, row_id: &str) -> Change {
        let values = cols(&[("id", row_id)]);
        Change {
            id,
            table: table.to_string(),
            operation,
            old_values: operation.has_old_values().then(|| values.clone()),
            new_values: operation.has_new_values().then_some(values),
        }
    }

    fn packet(sequence: i32, changes: Vec<Change>) -> ReplicationPacket {
        ReplicationPacket {
            replication_sequence: sequence,
            schema_sequence: 27,
            batch: DecodedBatch {
                changes,
                ..Default::default()
            },
        }
    }

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        store: Arc<MemoryStore>,
        updater: Updater,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(MemoryCatalog::new(CatalogData {
            schema_sequence: 27,
            replication_sequence: 100,
            labels: vec![label(1, "Warp"), label(2, "Factory")],
            ..Default::default()
        }));
        let store = Arc::new(MemoryStore::in_memory());
        let mut writer = store.create(IndexKind::Label).unwrap();
        for doc in documents_for(
            IndexKind::Label,
            catalog.as_ref(),
            IdRange::new(0, 2),
            &PhaseTimings::new(),
        )
        .unwrap()
        {
            writer.add_document(doc).unwrap();
        }
        replication_state::write(writer.as_mut(), &ReplicationInfo::new(27, 100)).unwrap();
        drop(writer);

        let source: Arc<dyn CatalogSource> = catalog.clone();
        let index_store: Arc<dyn IndexStore> = store.clone();
        Fixture {
            updater: Updater::new(source, index_store),
            catalog,
            store,
        }
    }

    fn label_doc(store: &MemoryStore, id: u32) -> Option<Document> {
        let reader = store.open_reader(IndexKind::Label).unwrap();
        let top = reader
            .search(&Query::term(ID_FIELD, &id.to_string()), &SearchOptions::new(0, 5))
            .unwrap();
        assert!(top.hits.len() <= 1, "duplicate documents for {}", id);
        top.hits.into_iter().next().map(|h| h.doc)
    }

    fn label_freq(store: &MemoryStore, term: &str) -> u64 {
        store
            .open_reader(IndexKind::Label)
            .unwrap()
            .doc_freq("label", term)
    }

    fn applied(outcome: UpdateOutcome) -> UpdateReport {
        match outcome {
            UpdateOutcome::Applied(report) => report,
            other => panic!("expected applied, got {:?}", other),
        }
    }

    #[test]
    fn test_update_rebuilds_document() {
        let f = fixture();
        f.catalog.update(|d| d.labels[0].name = "Warp Records".to_string());
        let report = applied(
            f.updater
                .apply(
                    IndexKind::Label,
                    &packet(101, vec![change(500, "label", Operation::Update, "1")]),
                    PacketOrigin::Archive,
                )
                .unwrap(),
        );
        assert_eq!((report.applied, report.deleted, report.rebuilt), (1, 1, 1));
        assert!(label_doc(&f.store, 1).is_some());
        assert_eq!(label_freq(&f.store, "records"), 1);

        let state = f.updater.state(IndexKind::Label).unwrap();
        assert_eq!(state.replication_sequence, 101);
        assert_eq!(state.last_change_id, Some(500));
    }

    #[test]
    fn test_delete_removes_document() {
        let f = fixture();
        f.catalog.update(|d| d.labels.retain(|l| l.id != 2));
        let report = applied(
            f.updater
                .apply(
                    IndexKind::Label,
                    &packet(101, vec![change(7, "label", Operation::Delete, "2")]),
                    PacketOrigin::Archive,
                )
                .unwrap(),
        );
        assert_eq!((report.deleted, report.rebuilt), (1, 0));
        assert!(label_doc(&f.store, 2).is_none());
        assert!(label_doc(&f.store, 1).is_some());
        let reader = f.store.open_reader(IndexKind::Label).unwrap();
        assert_eq!(reader.num_docs(), 2);
    }

    #[test]
    fn test_archive_already_applied() {
        let f = fixture();
        let outcome = f
            .updater
            .apply(
                IndexKind::Label,
                &packet(100, vec![change(1, "label", Operation::Update, "1")]),
                PacketOrigin::Archive,
            )
            .unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::AlreadyApplied {
                packet: 100,
                stored: 100
            }
        );
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let f = fixture();
        let mut p = packet(101, vec![]);
        p.schema_sequence = 28;
        assert!(matches!(
            f.updater.apply(IndexKind::Label, &p, PacketOrigin::Archive),
            Err(Error::ReplicationState(_))
        ));
    }

    #[test]
    fn test_changes_not_applied_twice() {
        let f = fixture();
        f.updater
            .apply(
                IndexKind::Label,
                &packet(5, vec![change(10, "label", Operation::Update, "1")]),
                PacketOrigin::Live,
            )
            .unwrap();
        let report = applied(
            f.updater
                .apply(
                    IndexKind::Label,
                    &packet(
                        5,
                        vec![
                            change(10, "label", Operation::Update, "1"),
                            change(11, "label", Operation::Update, "2"),
                        ],
                    ),
                    PacketOrigin::Live,
                )
                .unwrap(),
        );
        assert_eq!(report.applied, 1);
        assert_eq!(report.last_change_id, Some(11));
        // Live packets never move the sequence backwards.
        assert_eq!(report.replication_sequence, 100);
    }

    #[test]
    fn test_stops_before_first_bad_change() {
        let f = fixture();
        f.catalog.update(|d| {
            d.labels[0].name = "One".to_string();
            d.labels[1].name = "Two".to_string();
        });
        let mut p = packet(
            101,
            vec![
                change(20, "label", Operation::Update, "1"),
                change(22, "label", Operation::Update, "2"),
            ],
        );
        p.batch.dropped = vec![DroppedChange {
            seq_id: 21,
            reason: "missing after-row".to_string(),
        }];
        p.batch.first_bad = Some(21);

        let report = applied(
            f.updater
                .apply(IndexKind::Label, &p, PacketOrigin::Archive)
                .unwrap(),
        );
        assert!(report.stalled);
        assert_eq!((report.applied, report.held_back), (1, 1));
        assert_eq!(report.last_change_id, Some(20));
        assert_eq!(report.replication_sequence, 100);
        assert_eq!(label_freq(&f.store, "one"), 1);
        assert_eq!(label_freq(&f.store, "two"), 0);
        assert_eq!(label_freq(&f.store, "factory"), 1);
    }

    #[test]
    fn test_unrelated_tables_ignored() {
        let f = fixture();
        let report = applied(
            f.updater
                .apply(
                    IndexKind::Label,
                    &packet(101, vec![change(3, "recording", Operation::Update, "1")]),
                    PacketOrigin::Archive,
                )
                .unwrap(),
        );
        assert_eq!((report.applied, report.deleted), (1, 0));
        assert_eq!(report.last_change_id, Some(3));
    }

    #[test]
    fn test_missing_state_is_an_error() {
        let f = fixture();
        drop(f.store.create(IndexKind::Work).unwrap());
        assert!(matches!(
            f.updater.state(IndexKind::Work),
            Err(Error::ReplicationState(_))
        ));
    }

    #[test]
    fn test_dependency_lookup() {
        let c = Change {
            id: 1,
            table: "label_alias".to_string(),
            operation: Operation::Update,
            old_values: Some(cols(&[("label", "4")])),
            new_values: Some(cols(&[("label", "9")])),
        };
        let f = fixture();
        let ids = affected_ids(IndexKind::Label, &c, f.catalog.as_ref()).unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![4, 9]);
        assert!(affected_ids(IndexKind::Artist, &c, f.catalog.as_ref())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_every_index_has_a_primary_table() {
        for kind in IndexKind::ALL {
            assert!(
                DEPENDENCIES
                    .iter()
                    .any(|d| d.kind == kind && d.via == Via::Column("id")),
                "{}",
                kind
            );
        }
    }
}
