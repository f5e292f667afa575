//! musearch - search indexes for a music catalog
//!
//! Builds one full-text index per entity type (recording, release, artist,
//! label, work, event, annotation) from a relational catalog, keeps them
//! current by replaying change-data-capture packets, and answers
//! relevance-ranked queries.
//!
//! # Quick Start
//!
//! ```ignore
//! use musearch::engine::MemoryStore;
//! use musearch::index::{BuildConfig, MemoryCatalog, Orchestrator};
//! use musearch::query::{QueryConfig, SearchService};
//! use musearch::core::IndexKind;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(MemoryCatalog::open("catalog.json".as_ref())?);
//! let store = Arc::new(MemoryStore::in_memory());
//! Orchestrator::new(BuildConfig::default(), catalog, store.clone())?.run()?;
//!
//! let service = SearchService::new(store, QueryConfig::default());
//! let results = service.search(IndexKind::Artist, "massive attack", 0, None);
//! ```
//!
//! # Crates
//!
//! - [`core`]: documents, field registries, analyzers, replication types
//! - [`engine`]: the index engine (writers, readers, query execution)
//! - [`replication`]: change decoding, packets and change logs
//! - [`index`]: builders, build orchestration, incremental updates
//! - [`query`]: ranking compiler and search service

pub use musearch_core as core;
pub use musearch_engine as engine;
pub use musearch_index as index;
pub use musearch_query as query;
pub use musearch_replication as replication;
