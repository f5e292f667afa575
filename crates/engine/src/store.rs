//! Index directory: one index per [`IndexKind`]
//!
//! `MemoryStore` keeps every open index in a `DashMap` so several indexes
//! can be built, updated and searched concurrently. With a root directory
//! each index is mirrored to `<root>/<name>_index/` and lazily loaded on
//! first access.

use crate::error::{EngineError, EngineResult};
use crate::index::MemoryIndex;
use crate::{IndexReader, IndexWriter};
use dashmap::DashMap;
use musearch_core::IndexKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opens writers and readers by index kind.
pub trait IndexStore: Send + Sync {
    /// Replace the index with an empty one and open its writer.
    fn create(&self, kind: IndexKind) -> EngineResult<Box<dyn IndexWriter>>;

    /// Open the writer of an existing index.
    fn open_writer(&self, kind: IndexKind) -> EngineResult<Box<dyn IndexWriter>>;

    /// Open a reader on an existing index.
    fn open_reader(&self, kind: IndexKind) -> EngineResult<Arc<dyn IndexReader>>;
}

/// In-memory index store, optionally persisted.
#[derive(Default)]
pub struct MemoryStore {
    root: Option<PathBuf>,
    indexes: DashMap<IndexKind, Arc<MemoryIndex>>,
}

impl MemoryStore {
    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store persisting each index under `root`.
    pub fn persistent(root: &Path) -> Self {
        MemoryStore {
            root: Some(root.to_path_buf()),
            indexes: DashMap::new(),
        }
    }

    /// Directory of one index, if persistent.
    pub fn index_dir(&self, kind: IndexKind) -> Option<PathBuf> {
        self.root.as_ref().map(|r| r.join(kind.dir_name()))
    }

    /// The index itself, loading it from disk on first access.
    pub fn index(&self, kind: IndexKind) -> EngineResult<Arc<MemoryIndex>> {
        if let Some(index) = self.indexes.get(&kind) {
            return Ok(Arc::clone(&index));
        }
        let dir = self
            .index_dir(kind)
            .ok_or_else(|| EngineError::NotFound(kind.name().to_string()))?;
        let loaded = Arc::new(MemoryIndex::open(kind.registry(), &dir)?);
        let entry = self.indexes.entry(kind).or_insert(loaded);
        Ok(Arc::clone(&entry))
    }
}

impl IndexStore for MemoryStore {
    fn create(&self, kind: IndexKind) -> EngineResult<Box<dyn IndexWriter>> {
        let index = match self.index_dir(kind) {
            Some(dir) => MemoryIndex::create(kind.registry(), &dir)?,
            None => MemoryIndex::new(kind.registry()),
        };
        let index = Arc::new(index);
        let writer = index.writer()?;
        self.indexes.insert(kind, index);
        Ok(Box::new(writer))
    }

    fn open_writer(&self, kind: IndexKind) -> EngineResult<Box<dyn IndexWriter>> {
        Ok(Box::new(self.index(kind)?.writer()?))
    }

    fn open_reader(&self, kind: IndexKind) -> EngineResult<Arc<dyn IndexReader>> {
        let index: Arc<dyn IndexReader> = self.index(kind)?;
        Ok(index)
    }
}
