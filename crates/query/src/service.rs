//! Search service
//!
//! Compiles a raw query for one index, runs it with that index's
//! similarity and shapes the page of hits. Callers always get a response:
//! a failure is logged and answered with an empty page.

use crate::compiler::QueryCompiler;
use crate::config::QueryConfig;
use crate::error::QueryResult;
use crate::similarity::similarity_for;
use musearch_core::field::{META_FIELD, META_VALUE};
use musearch_core::{Document, IndexKind};
use musearch_engine::{IndexStore, Occur, Query, SearchOptions};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// One ranked document.
#[derive(Debug, Clone)]
pub struct Hit {
    /// Stored fields
    pub doc: Document,
    /// Raw engine score
    pub score: f32,
    /// Score relative to the best match, 0..=100
    pub normalized_score: u8,
}

/// A page of results.
#[derive(Debug, Clone, Default)]
pub struct Results {
    /// Documents matching the query
    pub total_hits: usize,
    /// Best score over all matches
    pub max_score: f32,
    /// Hits skipped before this page
    pub offset: usize,
    /// This page, best first
    pub hits: Vec<Hit>,
}

impl Results {
    fn empty(offset: usize) -> Self {
        Results {
            offset,
            ..Results::default()
        }
    }
}

/// Scale `score` against `max_score` to 0..=100.
pub fn normalize_score(score: f32, max_score: f32) -> u8 {
    if max_score <= 0.0 || !score.is_finite() {
        return 0;
    }
    (score / max_score * 100.0) as u8
}

/// Searches the indexes of one store.
pub struct SearchService {
    store: Arc<dyn IndexStore>,
    config: QueryConfig,
}

impl SearchService {
    /// Service over `store`.
    pub fn new(store: Arc<dyn IndexStore>, config: QueryConfig) -> Self {
        SearchService { store, config }
    }

    /// Ranking configuration in use.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// The compiled form of `raw` against `kind`.
    pub fn compile(&self, kind: IndexKind, raw: &str) -> Query {
        QueryCompiler::new(kind, &self.config).compile(raw)
    }

    /// Search `kind`; `limit` defaults to the configured page size.
    pub fn search(
        &self,
        kind: IndexKind,
        raw: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Results {
        match self.try_search(kind, raw, offset, limit) {
            Ok(results) => results,
            Err(e) => {
                warn!(
                    target: "musearch::query",
                    index = kind.name(),
                    query = raw,
                    error = %e,
                    "Search failed, returning no results"
                );
                Results::empty(offset)
            }
        }
    }

    /// Like [`search`](Self::search), but reporting failures.
    pub fn try_search(
        &self,
        kind: IndexKind,
        raw: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> QueryResult<Results> {
        let start = Instant::now();
        let query = self.compile(kind, raw);
        if query.is_match_none() {
            return Ok(Results::empty(offset));
        }
        let reader = self.store.open_reader(kind)?;

        // the replication state lives in the index as an ordinary document
        let query = Query::Boolean {
            clauses: vec![
                (Occur::Must, query),
                (Occur::MustNot, Query::term(META_FIELD, META_VALUE)),
            ],
        };
        let mut options = SearchOptions::new(offset, limit.unwrap_or(self.config.default_limit))
            .with_similarity(similarity_for(kind));
        options.max_expansions = self.config.max_expansions;
        options.expansion_tie_breaker = self.config.expansion_tie_breaker;

        let top = reader.search(&query, &options)?;
        let hits = top
            .hits
            .into_iter()
            .map(|h| Hit {
                normalized_score: normalize_score(h.score, top.max_score),
                score: h.score,
                doc: h.doc,
            })
            .collect::<Vec<_>>();

        debug!(
            target: "musearch::query",
            index = kind.name(),
            query = raw,
            total_hits = top.total_hits,
            returned = hits.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Search complete"
        );
        Ok(Results {
            total_hits: top.total_hits,
            max_score: top.max_score,
            offset,
            hits,
        })
    }
}
