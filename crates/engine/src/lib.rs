//! Full-text index engine
//!
//! The index engine consumed by the build pipeline, the updater and the
//! search service. Consumers only depend on the [`IndexWriter`],
//! [`IndexReader`] and [`IndexStore`] traits; `MemoryStore` is the
//! in-memory, segment-based implementation.
//!
//! Consumed operations:
//! - add-document, delete-by-term
//! - force-merge
//! - open reader / writer
//! - execute a structured [`Query`] → ranked hits with stored fields

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod index;
mod manifest;
pub mod query;
pub mod search;
mod segment;
pub mod similarity;
pub mod store;

pub use error::{EngineError, EngineResult};
pub use index::{MemoryIndex, MemoryIndexWriter};
pub use query::{Occur, Query};
pub use search::{ScoredDoc, SearchOptions, TopDocs};
pub use similarity::{ClassicSimilarity, Similarity};
pub use store::{IndexStore, MemoryStore};

use musearch_core::{Document, FieldRegistry};

/// The single write path of one index.
pub trait IndexWriter: Send {
    /// Name of the index being written.
    fn index_name(&self) -> &str;

    /// Buffer a document for the next commit.
    fn add_document(&mut self, doc: Document) -> EngineResult<()>;

    /// Buffer deletion of every document indexed under `term` in `field`.
    fn delete_documents(&mut self, field: &str, term: &str) -> EngineResult<()>;

    /// Make buffered operations visible (and durable, if persisted).
    fn commit(&mut self) -> EngineResult<()>;

    /// Commit, then merge all segments into one.
    fn force_merge(&mut self) -> EngineResult<()>;

    /// Live committed documents.
    fn num_docs(&self) -> u64;
}

/// Read access to one index.
pub trait IndexReader: Send + Sync {
    /// Field table of the index.
    fn registry(&self) -> &'static FieldRegistry;

    /// Live committed documents.
    fn num_docs(&self) -> u64;

    /// Live documents containing `term` in `field`.
    fn doc_freq(&self, field: &str, term: &str) -> u64;

    /// Execute a query.
    fn search(&self, query: &Query, options: &SearchOptions) -> EngineResult<TopDocs>;
}
