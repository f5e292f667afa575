//! Index build orchestration
//!
//! Drives each selected builder over the full id range of its entity:
//!
//! ```text
//!  chunk ──► load side-maps ──► fetch rows ──► rayon workers ──► sync_channel ──► writer thread
//!                                               (build docs)      (bounded)        (add, then commit)
//! ```
//!
//! Each chunk is committed as a whole once its workers are done. A failing
//! row or query fails the chunk; the writer is then dropped without a commit
//! so nothing of that chunk reaches the index, and the index's build is
//! reported as failed while the remaining indexes still build.
//!
//! Committed indexes are stamped with the replication state read from the
//! source *before* the first chunk and handed to the [`FinalizeScheduler`].

use crate::builders::{
    AnnotationBuilder, ArtistBuilder, EntityBuilder, EventBuilder, LabelBuilder,
    RecordingBuilder, ReleaseBuilder, WorkBuilder,
};
use crate::config::BuildConfig;
use crate::finalize::{finalize_index, FinalizeReport, FinalizeScheduler, TaskHandle};
use crate::replication_state;
use crate::source::CatalogSource;
use crate::timing::{Phase, PhaseTimings, TimingReport};
use musearch_core::{Document, Error, IdRange, IndexKind, ReplicationInfo, Result};
use musearch_engine::{IndexStore, IndexWriter};
use rayon::prelude::*;
use std::fmt;
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Outcome of building one index, before finalize.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Index name
    pub name: String,
    /// Highest id covered
    pub max_id: u32,
    /// Documents committed, the meta document excluded
    pub documents: u64,
    /// Chunks committed
    pub chunks: u64,
    /// Accumulated phase timings
    pub timings: TimingReport,
}

/// A committed chunk, as seen by progress observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Index being built
    pub kind: IndexKind,
    /// Range just committed
    pub range: IdRange,
    /// Highest id of the build
    pub max_id: u32,
    /// Documents committed so far
    pub documents: u64,
}

type ProgressObserver = Box<dyn Fn(&ChunkProgress) + Send + Sync>;

/// Build and finalize outcome of one index.
#[derive(Debug)]
pub struct IndexOutcome {
    /// Index
    pub kind: IndexKind,
    /// Build result
    pub build: Result<BuildReport>,
    /// Finalize result, absent when the build failed
    pub finalize: Option<Result<FinalizeReport>>,
}

impl IndexOutcome {
    /// Built, merged and verified.
    pub fn is_success(&self) -> bool {
        self.build.is_ok() && matches!(&self.finalize, Some(Ok(r)) if r.merged)
    }
}

impl fmt::Display for IndexOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.build, &self.finalize) {
            (Err(e), _) => write!(f, "{}: build failed: {}", self.kind, e),
            (Ok(_), Some(Err(e))) => write!(f, "{}: finalize failed: {}", self.kind, e),
            (Ok(build), Some(Ok(report))) => write!(
                f,
                "{} ({} chunks, max id {})",
                report, build.chunks, build.max_id
            ),
            (Ok(build), None) => write!(f, "{}: {} documents, not finalized", self.kind, build.documents),
        }
    }
}

/// Outcome of a whole run, one entry per selected index.
#[derive(Debug)]
pub struct RunSummary {
    /// Replication state stamped into every built index
    pub state: ReplicationInfo,
    /// Per-index outcomes in build order
    pub indexes: Vec<IndexOutcome>,
}

impl RunSummary {
    /// Whether every index built and finalized.
    pub fn all_succeeded(&self) -> bool {
        self.indexes.iter().all(IndexOutcome::is_success)
    }
}

/// Builds indexes from a catalog source into an index store.
pub struct Orchestrator {
    config: BuildConfig,
    source: Arc<dyn CatalogSource>,
    store: Arc<dyn IndexStore>,
    pool: rayon::ThreadPool,
    observer: Option<ProgressObserver>,
}

impl Orchestrator {
    /// Orchestrator with a worker pool sized by `config`.
    pub fn new(
        config: BuildConfig,
        source: Arc<dyn CatalogSource>,
        store: Arc<dyn IndexStore>,
    ) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count())
            .thread_name(|i| format!("musearch-build-{}", i))
            .build()
            .map_err(|e| Error::Config(format!("cannot start build workers: {}", e)))?;
        Ok(Orchestrator {
            config,
            source,
            store,
            pool,
            observer: None,
        })
    }

    /// Call `observer` after every committed chunk.
    pub fn on_chunk_committed(mut self, observer: impl Fn(&ChunkProgress) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Highest id to build for `kind`, capped in test mode.
    pub fn max_id(&self, kind: IndexKind) -> Result<u32> {
        let max_id = self.source.max_id(kind)?;
        Ok(if self.config.test_mode {
            max_id.min(self.config.test_index_size)
        } else {
            max_id
        })
    }

    /// Build every selected index, finalizing each in the background.
    ///
    /// Fails only when the replication state or the finalize pool can't be
    /// set up; per-index failures are reported in the summary.
    pub fn run(&self) -> Result<RunSummary> {
        let state = self.source.replication_info()?;
        info!(
            target: "musearch::build",
            schema_sequence = state.schema_sequence,
            replication_sequence = state.replication_sequence,
            "Starting build"
        );

        let scheduler = FinalizeScheduler::new(self.config.finalize_threads)?;
        let mut pending: Vec<(IndexKind, Result<BuildReport>, Option<TaskHandle<FinalizeReport>>)> =
            Vec::new();

        for kind in self.config.selected_indexes() {
            match self.build_index(kind, &state) {
                Ok((report, writer)) => {
                    let source = Arc::clone(&self.source);
                    let max_id = report.max_id;
                    let handle = scheduler.submit(kind.name(), move || {
                        finalize_index(writer, source.as_ref(), kind, max_id)
                    });
                    match handle {
                        Ok(handle) => pending.push((kind, Ok(report), Some(handle))),
                        Err(e) => pending.push((kind, Err(e), None)),
                    }
                }
                Err(e) => pending.push((kind, Err(e), None)),
            }
        }

        let indexes: Vec<IndexOutcome> = pending
            .into_iter()
            .map(|(kind, build, handle)| IndexOutcome {
                kind,
                build,
                finalize: handle.map(TaskHandle::wait),
            })
            .collect();
        scheduler.shutdown();

        for outcome in &indexes {
            if outcome.is_success() {
                info!(target: "musearch::build", "{}", outcome);
            } else {
                error!(target: "musearch::build", "{}", outcome);
            }
        }
        Ok(RunSummary { state, indexes })
    }

    /// Build one index and stamp `state` into it.
    ///
    /// Returns the writer, still open, for finalize.
    pub fn build_index(
        &self,
        kind: IndexKind,
        state: &ReplicationInfo,
    ) -> Result<(BuildReport, Box<dyn IndexWriter>)> {
        match kind {
            IndexKind::Recording => self.build_with(&RecordingBuilder, state),
            IndexKind::Release => self.build_with(&ReleaseBuilder, state),
            IndexKind::Work => self.build_with(&WorkBuilder, state),
            IndexKind::Artist => self.build_with(&ArtistBuilder, state),
            IndexKind::Label => self.build_with(&LabelBuilder, state),
            IndexKind::Event => self.build_with(&EventBuilder, state),
            IndexKind::Annotation => self.build_with(&AnnotationBuilder, state),
        }
    }

    fn build_with<B: EntityBuilder>(
        &self,
        builder: &B,
        state: &ReplicationInfo,
    ) -> Result<(BuildReport, Box<dyn IndexWriter>)> {
        let kind = builder.kind();
        let started = Instant::now();
        let max_id = self.max_id(kind)?;
        info!(target: "musearch::build", index = kind.name(), max_id, "Building index");

        let timings = PhaseTimings::new();
        let mut writer = self.store.create(kind)?;
        let mut documents = 0u64;
        let mut chunks = 0u64;

        for range in IdRange::chunks(max_id, self.config.chunk_size) {
            let added = self
                .build_chunk(builder, range, writer.as_mut(), &timings)
                .map_err(|e| {
                    error!(
                        target: "musearch::build",
                        index = kind.name(),
                        min = range.min,
                        max = range.max,
                        error = %e,
                        "Chunk failed, aborting index"
                    );
                    e
                })?;
            documents += added;
            chunks += 1;
            debug!(
                target: "musearch::build",
                index = kind.name(),
                range = %range,
                added,
                documents,
                "Committed chunk"
            );
            if let Some(observer) = &self.observer {
                observer(&ChunkProgress {
                    kind,
                    range,
                    max_id,
                    documents,
                });
            }
        }

        {
            let _t = timings.time(Phase::Commit);
            replication_state::write(writer.as_mut(), state)?;
        }

        let report = BuildReport {
            name: kind.name().to_string(),
            max_id,
            documents,
            chunks,
            timings: timings.snapshot(),
        };
        info!(
            target: "musearch::build",
            index = kind.name(),
            documents,
            chunks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            timings = %report.timings,
            "Built index"
        );
        Ok((report, writer))
    }

    /// Build and commit one chunk, returning its document count.
    fn build_chunk<B: EntityBuilder>(
        &self,
        builder: &B,
        range: IdRange,
        writer: &mut dyn IndexWriter,
        timings: &PhaseTimings,
    ) -> Result<u64> {
        let source = self.source.as_ref();
        let side = {
            let _t = timings.time(Phase::LoadSideMaps);
            builder.load_side_maps(source, range)?
        };
        let rows = {
            let _t = timings.time(Phase::FetchRows);
            builder.fetch_rows(source, range)?
        };
        if rows.is_empty() {
            return Ok(0);
        }

        let (tx, rx) = sync_channel::<Document>(self.config.queue_depth);
        let sink = &mut *writer;
        let (built, written) = std::thread::scope(|scope| {
            let writer_thread = scope.spawn(move || -> Result<u64> {
                let mut added = 0u64;
                for doc in rx {
                    sink.add_document(doc)?;
                    added += 1;
                }
                Ok(added)
            });

            let built = self.pool.install(|| {
                rows.par_iter().try_for_each_with(tx, |tx, row| {
                    match builder.document(row, &side, timings)? {
                        Some(doc) => tx.send(doc).map_err(|_| {
                            Error::Engine(format!("{} writer stopped", builder.kind()))
                        }),
                        None => Ok(()),
                    }
                })
            });
            let written = writer_thread
                .join()
                .unwrap_or_else(|_| Err(Error::Engine("writer thread panicked".to_string())));
            (built, written)
        });

        // A writer failure closes the channel, so it explains a send failure.
        let added = match (built, written) {
            (_, Err(e)) => return Err(e),
            (Err(e), _) => return Err(e),
            (Ok(()), Ok(added)) => added,
        };

        let _t = timings.time(Phase::Commit);
        writer.commit()?;
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CatalogData, MemoryCatalog};
    use crate::source::{ArtistRow, LabelRow};
    use crate::builders::DELETED_LABEL_GID;
    use musearch_engine::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn label(id: u32) -> LabelRow {
        LabelRow {
            id,
            gid: format!("label-{}", id),
            name: format!("Label {}", id),
            ..Default::default()
        }
    }

    fn artist(id: u32) -> ArtistRow {
        ArtistRow {
            id,
            gid: format!("artist-{}", id),
            name: format!("Artist {}", id),
            ..Default::default()
        }
    }

    fn catalog(labels: u32, artists: u32) -> Arc<MemoryCatalog> {
        Arc::new(MemoryCatalog::new(CatalogData {
            schema_sequence: 27,
            replication_sequence: 100,
            labels: (1..=labels).map(label).collect(),
            artists: (1..=artists).map(artist).collect(),
            ..Default::default()
        }))
    }

    fn config(indexes: Vec<IndexKind>) -> BuildConfig {
        BuildConfig {
            chunk_size: 3,
            workers: Some(3),
            queue_depth: 2,
            indexes,
            ..Default::default()
        }
    }

    fn orchestrator(
        catalog: &Arc<MemoryCatalog>,
        store: &Arc<MemoryStore>,
        config: BuildConfig,
    ) -> Orchestrator {
        let source: Arc<dyn CatalogSource> = catalog.clone();
        let store: Arc<dyn IndexStore> = store.clone();
        Orchestrator::new(config, source, store).unwrap()
    }

    #[test]
    fn test_build_chunks_and_stamps_state() {
        let catalog = catalog(10, 0);
        let store = Arc::new(MemoryStore::in_memory());
        let summary = orchestrator(&catalog, &store, config(vec![IndexKind::Label]))
            .run()
            .unwrap();

        assert!(summary.all_succeeded());
        let outcome = &summary.indexes[0];
        let build = outcome.build.as_ref().unwrap();
        assert_eq!(build.documents, 10);
        assert_eq!(build.chunks, 4);
        assert_eq!(build.max_id, 10);

        let reader = store.open_reader(IndexKind::Label).unwrap();
        assert_eq!(reader.num_docs(), 11);
        let state = replication_state::read(reader.as_ref()).unwrap().unwrap();
        assert_eq!(state.replication_sequence, 100);
        assert_eq!(state.schema_sequence, 27);
    }

    #[test]
    fn test_state_is_read_at_start() {
        let catalog = catalog(10, 0);
        let store = Arc::new(MemoryStore::in_memory());
        let mutated = Arc::clone(&catalog);
        let summary = orchestrator(&catalog, &store, config(vec![IndexKind::Label]))
            .on_chunk_committed(move |_| {
                mutated.update(|d| d.replication_sequence += 1);
            })
            .run()
            .unwrap();

        assert_eq!(summary.state.replication_sequence, 100);
        let reader = store.open_reader(IndexKind::Label).unwrap();
        let state = replication_state::read(reader.as_ref()).unwrap().unwrap();
        assert_eq!(state.replication_sequence, 100);
        assert_eq!(catalog.read(|d| d.replication_sequence), 104);
    }

    #[test]
    fn test_failed_chunk_aborts_only_that_index() {
        let catalog = catalog(10, 5);
        catalog.fail_range_containing(IndexKind::Label, 5);
        let store = Arc::new(MemoryStore::in_memory());
        let summary = orchestrator(
            &catalog,
            &store,
            config(vec![IndexKind::Label, IndexKind::Artist]),
        )
        .run()
        .unwrap();

        assert!(!summary.all_succeeded());
        let artist = summary
            .indexes
            .iter()
            .find(|o| o.kind == IndexKind::Artist)
            .unwrap();
        assert!(artist.is_success());

        let label = summary
            .indexes
            .iter()
            .find(|o| o.kind == IndexKind::Label)
            .unwrap();
        assert!(matches!(label.build, Err(Error::Source { min: 3, max: 5, .. })));
        assert!(label.finalize.is_none());

        // The first chunk was committed; the failing one left nothing behind.
        let reader = store.open_reader(IndexKind::Label).unwrap();
        assert_eq!(reader.num_docs(), 2);
        assert_eq!(replication_state::read(reader.as_ref()).unwrap(), None);
    }

    #[test]
    fn test_test_mode_caps_max_id() {
        let catalog = catalog(10, 0);
        let store = Arc::new(MemoryStore::in_memory());
        let summary = orchestrator(
            &catalog,
            &store,
            BuildConfig {
                test_mode: true,
                test_index_size: 4,
                ..config(vec![IndexKind::Label])
            },
        )
        .run()
        .unwrap();

        let outcome = &summary.indexes[0];
        assert_eq!(outcome.build.as_ref().unwrap().max_id, 4);
        let finalize = outcome.finalize.as_ref().unwrap().as_ref().unwrap();
        assert_eq!(finalize.index_docs, 4);
        assert_eq!(finalize.db_rows, 4);
        assert!(finalize.ok);
    }

    #[test]
    fn test_tombstone_not_counted_as_mismatch() {
        let catalog = catalog(4, 0);
        catalog.update(|d| d.labels[1].gid = DELETED_LABEL_GID.to_string());
        let store = Arc::new(MemoryStore::in_memory());
        let summary = orchestrator(&catalog, &store, config(vec![IndexKind::Label]))
            .run()
            .unwrap();
        let finalize = summary.indexes[0].finalize.as_ref().unwrap().as_ref().unwrap();
        assert_eq!(finalize.index_docs, 3);
        assert!(finalize.ok);
    }

    #[test]
    fn test_progress_observer_sees_every_chunk() {
        let catalog = catalog(7, 0);
        let store = Arc::new(MemoryStore::in_memory());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        orchestrator(&catalog, &store, config(vec![IndexKind::Label]))
            .on_chunk_committed(move |p| {
                assert_eq!(p.max_id, 7);
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .run()
            .unwrap();
        // [0,2] [3,5] [6,7]
        assert_eq!(seen.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_empty_source_builds_meta_only() {
        let catalog = catalog(0, 0);
        let store = Arc::new(MemoryStore::in_memory());
        let summary = orchestrator(&catalog, &store, config(vec![IndexKind::Label]))
            .run()
            .unwrap();
        assert!(summary.all_succeeded());
        let reader = store.open_reader(IndexKind::Label).unwrap();
        assert_eq!(reader.num_docs(), 1);
    }
}
