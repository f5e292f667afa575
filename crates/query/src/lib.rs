//! Relevance-ranked search over the built indexes
//!
//! - [`parser`]: raw query syntax
//! - [`alias`]: per-index pseudo-fields over weighted real fields
//! - [`compiler`]: raw query → engine [`Query`](musearch_engine::Query)
//! - [`similarity`]: per-index scoring
//! - [`service`]: search entry point with normalized scores

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alias;
pub mod compiler;
pub mod config;
pub mod error;
pub mod parser;
pub mod service;
pub mod similarity;

pub use alias::{Alias, AliasField, AliasTable};
pub use compiler::QueryCompiler;
pub use config::QueryConfig;
pub use error::{QueryError, QueryResult};
pub use service::{normalize_score, Hit, Results, SearchService};
pub use similarity::{similarity_for, RecordingSimilarity};
