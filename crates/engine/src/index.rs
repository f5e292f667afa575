//! In-memory segmented index
//!
//! This module provides:
//! - MemoryIndex: segments + tombstones behind a single `RwLock`
//! - MemoryIndexWriter: the single writer of an index, buffering adds and
//!   deletes until `commit`
//! - Optional persistence to an index directory (see `manifest`)
//!
//! # Segmented Architecture
//!
//! Every commit turns the buffered documents into one new immutable
//! segment; deletes become tombstones on existing segments. `force_merge`
//! rewrites all live documents into a single segment and drops tombstones.
//!
//! # Single writer
//!
//! At most one writer may be open per index; a second `writer()` call fails
//! with `WriterLocked` until the first writer is dropped.

use crate::error::{EngineError, EngineResult};
use crate::manifest::{self, ManifestData, SegmentManifestEntry};
use crate::query::Query;
use crate::search::{Executor, SearchOptions, TopDocs};
use crate::segment::{self, Segment};
use crate::{IndexReader, IndexWriter};
use musearch_core::{Document, FieldRegistry};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

#[derive(Default)]
struct IndexState {
    segments: Vec<Arc<Segment>>,
    tombstones: Vec<HashSet<u32>>,
    checksums: Vec<u64>,
}

impl IndexState {
    fn live_docs(&self) -> u64 {
        self.segments
            .iter()
            .zip(&self.tombstones)
            .map(|(s, t)| (s.max_doc() as usize - t.len()) as u64)
            .sum()
    }
}

// ============================================================================
// MemoryIndex
// ============================================================================

/// An index held in memory, optionally mirrored to a directory.
pub struct MemoryIndex {
    registry: &'static FieldRegistry,
    dir: Option<PathBuf>,
    state: RwLock<IndexState>,
    next_segment_id: AtomicU64,
    writer_open: AtomicBool,
}

impl MemoryIndex {
    /// Empty, purely in-memory index.
    pub fn new(registry: &'static FieldRegistry) -> Self {
        MemoryIndex {
            registry,
            dir: None,
            state: RwLock::new(IndexState::default()),
            next_segment_id: AtomicU64::new(0),
            writer_open: AtomicBool::new(false),
        }
    }

    /// Empty index persisted under `dir`, discarding whatever `dir` held.
    pub fn create(registry: &'static FieldRegistry, dir: &Path) -> EngineResult<Self> {
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        std::fs::create_dir_all(dir)?;
        let index = MemoryIndex {
            dir: Some(dir.to_path_buf()),
            ..MemoryIndex::new(registry)
        };
        index.persist_manifest(&index.state.read())?;
        Ok(index)
    }

    /// Load the index persisted under `dir`.
    pub fn open(registry: &'static FieldRegistry, dir: &Path) -> EngineResult<Self> {
        let data = manifest::load_manifest(dir)?
            .ok_or_else(|| EngineError::NotFound(dir.display().to_string()))?;

        let mut state = IndexState::default();
        for entry in &data.segments {
            let docs = manifest::read_segment(dir, entry)?;
            state
                .segments
                .push(Arc::new(Segment::build(entry.segment_id, registry, docs)?));
            state.tombstones.push(entry.tombstones.iter().copied().collect());
            state.checksums.push(entry.checksum);
        }

        tracing::info!(
            target: "musearch::engine",
            index = registry.index_name(),
            segments = state.segments.len(),
            docs = state.live_docs(),
            "Index loaded from disk"
        );

        Ok(MemoryIndex {
            registry,
            dir: Some(dir.to_path_buf()),
            state: RwLock::new(state),
            next_segment_id: AtomicU64::new(data.next_segment_id),
            writer_open: AtomicBool::new(false),
        })
    }

    /// Open the single writer of this index.
    pub fn writer(self: &Arc<Self>) -> EngineResult<MemoryIndexWriter> {
        if self
            .writer_open
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(EngineError::WriterLocked(
                self.registry.index_name().to_string(),
            ));
        }
        Ok(MemoryIndexWriter {
            index: Arc::clone(self),
            pending: Vec::new(),
        })
    }

    /// Number of segments (1 after a merge of a non-empty index).
    pub fn segment_count(&self) -> usize {
        self.state.read().segments.len()
    }

    fn persist_manifest(&self, state: &IndexState) -> EngineResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let data = ManifestData {
            version: 1,
            next_segment_id: self.next_segment_id.load(Ordering::Relaxed),
            segments: state
                .segments
                .iter()
                .zip(&state.tombstones)
                .zip(&state.checksums)
                .map(|((seg, tombstones), checksum)| SegmentManifestEntry {
                    segment_id: seg.id,
                    doc_count: seg.max_doc(),
                    checksum: *checksum,
                    tombstones: tombstones.iter().copied().collect(),
                })
                .collect(),
        };
        manifest::write_manifest(dir, &data)
    }

    fn new_segment(&self, docs: Vec<Document>) -> EngineResult<(Arc<Segment>, u64)> {
        let id = self.next_segment_id.fetch_add(1, Ordering::Relaxed);
        let checksum = match &self.dir {
            Some(dir) => manifest::write_segment(dir, id, &docs)?,
            None => 0,
        };
        Ok((Arc::new(Segment::build(id, self.registry, docs)?), checksum))
    }

    /// Apply buffered operations in order as one atomic state change.
    fn apply(&self, ops: Vec<PendingOp>) -> EngineResult<()> {
        let mut state = self.state.write();
        let mut tombstones = state.tombstones.clone();
        let mut added: Vec<Document> = Vec::new();

        for op in ops {
            match op {
                PendingOp::Add(doc) => added.push(doc),
                PendingOp::Delete { field, term } => {
                    for (i, seg) in state.segments.iter().enumerate() {
                        if let Some(postings) = seg.postings(&field, &term) {
                            tombstones[i].extend(postings.iter().map(|p| p.doc));
                        }
                    }
                    added.retain(|d| !segment::doc_has_term(self.registry, d, &field, &term));
                }
            }
        }

        let mut segments = state.segments.clone();
        let mut checksums = state.checksums.clone();
        if !added.is_empty() {
            let (seg, checksum) = self.new_segment(added)?;
            segments.push(seg);
            tombstones.push(HashSet::new());
            checksums.push(checksum);
        }

        let next = IndexState {
            segments,
            tombstones,
            checksums,
        };
        self.persist_manifest(&next)?;
        *state = next;
        Ok(())
    }

    /// Rewrite all live documents into one segment.
    fn merge(&self) -> EngineResult<()> {
        let mut state = self.state.write();
        let before = state.segments.len();
        let live: Vec<Document> = state
            .segments
            .iter()
            .zip(&state.tombstones)
            .flat_map(|(seg, dead)| {
                seg.docs
                    .iter()
                    .enumerate()
                    .filter(move |(i, _)| !dead.contains(&(*i as u32)))
                    .map(|(_, d)| d.clone())
            })
            .collect();

        let old_ids: Vec<u64> = state.segments.iter().map(|s| s.id).collect();
        let next = if live.is_empty() {
            IndexState::default()
        } else {
            let (seg, checksum) = self.new_segment(live)?;
            IndexState {
                segments: vec![seg],
                tombstones: vec![HashSet::new()],
                checksums: vec![checksum],
            }
        };
        self.persist_manifest(&next)?;
        *state = next;

        if let Some(dir) = &self.dir {
            for id in old_ids {
                if let Err(e) = std::fs::remove_file(manifest::segment_path(dir, id)) {
                    tracing::warn!(
                        target: "musearch::engine",
                        segment_id = id,
                        error = %e,
                        "Failed to remove merged segment file"
                    );
                }
            }
        }

        tracing::debug!(
            target: "musearch::engine",
            index = self.registry.index_name(),
            segments_before = before,
            docs = state.live_docs(),
            "Segments merged"
        );
        Ok(())
    }

    fn stored_fields(&self, doc: &Document) -> Document {
        let mut out = Document::new();
        for field in doc.fields() {
            if self.registry.get(&field.name).map(|s| s.stored).unwrap_or(false) {
                match &field.value {
                    musearch_core::FieldValue::Text(t) => out.add_text(&field.name, t.as_str()),
                    musearch_core::FieldValue::Int(v) => out.add_int(&field.name, *v),
                    musearch_core::FieldValue::Long(v) => out.add_long(&field.name, *v),
                };
            }
        }
        out
    }

    fn check_fields(&self, query: &Query) -> EngineResult<()> {
        let field = match query {
            Query::Term { field, .. }
            | Query::Phrase { field, .. }
            | Query::Prefix { field, .. }
            | Query::Fuzzy { field, .. }
            | Query::Range { field, .. } => field,
            Query::DisjunctionMax { disjuncts, .. } => {
                return disjuncts.iter().try_for_each(|q| self.check_fields(q))
            }
            Query::Boolean { clauses } => {
                return clauses.iter().try_for_each(|(_, q)| self.check_fields(q))
            }
            Query::MatchAll | Query::MatchNone => return Ok(()),
        };
        self.registry.require(field)?;
        Ok(())
    }
}

impl IndexReader for MemoryIndex {
    fn registry(&self) -> &'static FieldRegistry {
        self.registry
    }

    fn num_docs(&self) -> u64 {
        self.state.read().live_docs()
    }

    fn doc_freq(&self, field: &str, term: &str) -> u64 {
        let state = self.state.read();
        let options = SearchOptions::new(0, 0);
        Executor::new(&state.segments, &state.tombstones, &options).doc_freq(field, term)
    }

    fn search(&self, query: &Query, options: &SearchOptions) -> EngineResult<TopDocs> {
        self.check_fields(query)?;
        let state = self.state.read();
        let executor = Executor::new(&state.segments, &state.tombstones, options);
        Ok(executor.top_docs(query, |d| self.stored_fields(d)))
    }
}

// ============================================================================
// MemoryIndexWriter
// ============================================================================

enum PendingOp {
    Add(Document),
    Delete { field: String, term: String },
}

/// The single writer of a [`MemoryIndex`].
///
/// Operations are buffered and become visible atomically on `commit`;
/// dropping the writer discards anything uncommitted.
pub struct MemoryIndexWriter {
    index: Arc<MemoryIndex>,
    pending: Vec<PendingOp>,
}

impl MemoryIndexWriter {
    /// Number of buffered operations.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl IndexWriter for MemoryIndexWriter {
    fn index_name(&self) -> &str {
        self.index.registry.index_name()
    }

    fn add_document(&mut self, doc: Document) -> EngineResult<()> {
        segment::validate(self.index.registry, &doc)?;
        self.pending.push(PendingOp::Add(doc));
        Ok(())
    }

    fn delete_documents(&mut self, field: &str, term: &str) -> EngineResult<()> {
        self.index.registry.require(field)?;
        self.pending.push(PendingOp::Delete {
            field: field.to_string(),
            term: term.to_string(),
        });
        Ok(())
    }

    fn commit(&mut self) -> EngineResult<()> {
        let ops = std::mem::take(&mut self.pending);
        if ops.is_empty() {
            return Ok(());
        }
        self.index.apply(ops)
    }

    fn force_merge(&mut self) -> EngineResult<()> {
        self.commit()?;
        self.index.merge()
    }

    fn num_docs(&self) -> u64 {
        self.index.num_docs()
    }
}

impl Drop for MemoryIndexWriter {
    fn drop(&mut self) {
        self.index.writer_open.store(false, Ordering::Release);
    }
}

// ============================================================================
// Tests
// ============================================================================
