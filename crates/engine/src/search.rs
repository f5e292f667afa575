//! Query execution over a set of segments
//!
//! Execution runs in two passes:
//! 1. `rewrite` resolves corpus statistics once for the whole index: idf
//!    of every term and phrase, and the concrete term lists of prefix,
//!    fuzzy and range queries (expanded over all segments so every
//!    segment scores the same expansion set).
//! 2. `eval` walks the rewritten tree per segment and accumulates scores
//!    per live document.
//!
//! Prefix and fuzzy expansions are scored with the *original* term's idf
//! and a term frequency of one, so an expanded variant can never outscore
//! an exact match of the term it was expanded from.

use crate::query::{Occur, Query};
use crate::segment::{Posting, Segment};
use crate::similarity::Similarity;
use musearch_core::Document;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;

/// Options for one search call.
#[derive(Clone)]
pub struct SearchOptions {
    /// Hits to skip
    pub offset: usize,
    /// Hits to return
    pub limit: usize,
    /// Scoring function
    pub similarity: Arc<dyn Similarity>,
    /// Cap on terms a prefix or fuzzy query expands to
    pub max_expansions: usize,
    /// Tie breaker of the best-of combiner over an expansion's terms
    pub expansion_tie_breaker: f32,
}

impl SearchOptions {
    /// Options with the classic similarity.
    pub fn new(offset: usize, limit: usize) -> Self {
        SearchOptions {
            offset,
            limit,
            similarity: Arc::new(crate::similarity::ClassicSimilarity),
            max_expansions: 200,
            expansion_tie_breaker: 0.0,
        }
    }

    /// Builder: set similarity
    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }
}

impl std::fmt::Debug for SearchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOptions")
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("similarity", &self.similarity.name())
            .field("max_expansions", &self.max_expansions)
            .finish()
    }
}

/// A scored hit with its stored fields.
#[derive(Debug, Clone)]
pub struct ScoredDoc {
    /// Raw score
    pub score: f32,
    /// Stored fields of the document
    pub doc: Document,
}

/// Ranked result page.
#[derive(Debug, Clone, Default)]
pub struct TopDocs {
    /// Number of matching documents
    pub total_hits: usize,
    /// Highest score over all matches
    pub max_score: f32,
    /// Requested page, best first
    pub hits: Vec<ScoredDoc>,
}

// ============================================================================
// Rewritten query tree
// ============================================================================

#[derive(Debug)]
enum Node {
    Term {
        field: String,
        term: String,
        boost: f32,
        idf: f32,
    },
    Phrase {
        field: String,
        terms: Vec<String>,
        slop: u32,
        boost: f32,
        idf: f32,
    },
    Expansion {
        field: String,
        terms: Vec<String>,
        boost: f32,
        idf: f32,
        tie_breaker: f32,
    },
    Constant {
        field: String,
        terms: Vec<String>,
        boost: f32,
    },
    DisMax {
        nodes: Vec<Node>,
        tie_breaker: f32,
    },
    Bool {
        must: Vec<Node>,
        should: Vec<Node>,
        must_not: Vec<Node>,
    },
    All,
    Nothing,
}

type Scores = HashMap<u32, f32>;

// ============================================================================
// Executor
// ============================================================================

pub(crate) struct Executor<'a> {
    segments: &'a [Arc<Segment>],
    tombstones: &'a [HashSet<u32>],
    options: &'a SearchOptions,
    num_docs: u64,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(
        segments: &'a [Arc<Segment>],
        tombstones: &'a [HashSet<u32>],
        options: &'a SearchOptions,
    ) -> Self {
        let num_docs = segments
            .iter()
            .zip(tombstones)
            .map(|(s, t)| (s.max_doc() as usize - t.len()) as u64)
            .sum();
        Executor {
            segments,
            tombstones,
            options,
            num_docs,
        }
    }

    pub(crate) fn num_docs(&self) -> u64 {
        self.num_docs
    }

    fn live(&self, seg: usize, doc: u32) -> bool {
        !self.tombstones[seg].contains(&doc)
    }

    /// Live documents containing `term` in `field`.
    pub(crate) fn doc_freq(&self, field: &str, term: &str) -> u64 {
        self.segments
            .iter()
            .enumerate()
            .map(|(i, s)| {
                s.postings(field, term)
                    .map(|ps| ps.iter().filter(|p| self.live(i, p.doc)).count() as u64)
                    .unwrap_or(0)
            })
            .sum()
    }

    fn idf(&self, field: &str, term: &str) -> f32 {
        self.options
            .similarity
            .idf(self.doc_freq(field, term), self.num_docs)
    }

    /// Union of the term dictionaries of `field` restricted to `range`.
    fn terms_in_range(&self, field: &str, lower: Bound<&str>, upper: Bound<&str>) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        if is_empty_range(lower, upper) {
            return out;
        }
        for seg in self.segments {
            if let Some(f) = seg.field(field) {
                for (term, _) in f.terms.range::<str, _>((lower, upper)) {
                    out.insert(term.clone());
                }
            }
        }
        out
    }

    fn all_terms(&self, field: &str) -> BTreeSet<String> {
        self.terms_in_range(field, Bound::Unbounded, Bound::Unbounded)
    }

    /// Weight of an expansion: the original term's idf, or 1 when the
    /// original term does not occur at all.
    fn expansion_idf(&self, field: &str, original: &str) -> f32 {
        if self.doc_freq(field, original) > 0 {
            self.idf(field, original)
        } else {
            1.0
        }
    }

    fn rewrite(&self, query: &Query) -> Node {
        match query {
            Query::Term { field, term, boost } => Node::Term {
                field: field.clone(),
                term: term.clone(),
                boost: *boost,
                idf: self.idf(field, term),
            },
            Query::Phrase {
                field,
                terms,
                slop,
                boost,
            } => match terms.len() {
                0 => Node::Nothing,
                1 => self.rewrite(&Query::Term {
                    field: field.clone(),
                    term: terms[0].clone(),
                    boost: *boost,
                }),
                _ => Node::Phrase {
                    field: field.clone(),
                    terms: terms.clone(),
                    slop: *slop,
                    boost: *boost,
                    idf: terms.iter().map(|t| self.idf(field, t)).sum(),
                },
            },
            Query::Prefix {
                field,
                prefix,
                boost,
            } => {
                let terms: Vec<String> = self
                    .terms_in_range(field, Bound::Included(prefix.as_str()), Bound::Unbounded)
                    .into_iter()
                    .take_while(|t| t.starts_with(prefix.as_str()))
                    .take(self.options.max_expansions)
                    .collect();
                Node::Expansion {
                    field: field.clone(),
                    idf: self.expansion_idf(field, prefix),
                    terms,
                    boost: *boost,
                    tie_breaker: self.options.expansion_tie_breaker,
                }
            }
            Query::Fuzzy {
                field,
                term,
                max_edits,
                boost,
            } => {
                let target_len = term.chars().count();
                let max_edits = *max_edits as usize;
                let mut candidates: Vec<(usize, String)> = self
                    .all_terms(field)
                    .into_iter()
                    .filter(|t| t.chars().count().abs_diff(target_len) <= max_edits)
                    .filter_map(|t| {
                        let d = strsim::levenshtein(term, &t);
                        (d <= max_edits).then_some((d, t))
                    })
                    .collect();
                candidates.sort();
                candidates.truncate(self.options.max_expansions);
                Node::Expansion {
                    field: field.clone(),
                    idf: self.expansion_idf(field, term),
                    terms: candidates.into_iter().map(|(_, t)| t).collect(),
                    boost: *boost,
                    tie_breaker: self.options.expansion_tie_breaker,
                }
            }
            Query::Range {
                field,
                lower,
                upper,
                inclusive,
                boost,
            } => {
                let bound = |b: &Option<String>| -> Bound<String> {
                    match b {
                        None => Bound::Unbounded,
                        Some(v) if *inclusive => Bound::Included(v.clone()),
                        Some(v) => Bound::Excluded(v.clone()),
                    }
                };
                let (lo, hi) = (bound(lower), bound(upper));
                let terms = self
                    .terms_in_range(field, as_str_bound(&lo), as_str_bound(&hi))
                    .into_iter()
                    .collect();
                Node::Constant {
                    field: field.clone(),
                    terms,
                    boost: *boost,
                }
            }
            Query::DisjunctionMax {
                disjuncts,
                tie_breaker,
            } => Node::DisMax {
                nodes: disjuncts.iter().map(|q| self.rewrite(q)).collect(),
                tie_breaker: *tie_breaker,
            },
            Query::Boolean { clauses } => {
                let (mut must, mut should, mut must_not) = (Vec::new(), Vec::new(), Vec::new());
                for (occur, q) in clauses {
                    let node = self.rewrite(q);
                    match occur {
                        Occur::Must => must.push(node),
                        Occur::Should => should.push(node),
                        Occur::MustNot => must_not.push(node),
                    }
                }
                Node::Bool {
                    must,
                    should,
                    must_not,
                }
            }
            Query::MatchAll => Node::All,
            Query::MatchNone => Node::Nothing,
        }
    }

    fn eval(&self, seg_idx: usize, node: &Node) -> Scores {
        let seg = &self.segments[seg_idx];
        let sim = self.options.similarity.as_ref();
        let mut out = Scores::new();
        match node {
            Node::Term {
                field,
                term,
                boost,
                idf,
            } => {
                if let (Some(postings), Some(f)) = (seg.postings(field, term), seg.field(field)) {
                    for p in postings.iter().filter(|p| self.live(seg_idx, p.doc)) {
                        let score =
                            sim.score(field, p.freq() as f32, f.field_len(p.doc), *idf, *boost);
                        out.insert(p.doc, score);
                    }
                }
            }
            Node::Phrase {
                field,
                terms,
                slop,
                boost,
                idf,
            } => {
                let lists: Option<Vec<&[Posting]>> =
                    terms.iter().map(|t| seg.postings(field, t)).collect();
                if let (Some(lists), Some(f)) = (lists, seg.field(field)) {
                    for first in lists[0].iter().filter(|p| self.live(seg_idx, p.doc)) {
                        let per_term: Option<Vec<&Posting>> = lists[1..]
                            .iter()
                            .map(|l| l.iter().find(|p| p.doc == first.doc))
                            .collect();
                        let Some(rest) = per_term else { continue };
                        let freq = phrase_freq(first, &rest, *slop);
                        if freq > 0 {
                            let score =
                                sim.score(field, freq as f32, f.field_len(first.doc), *idf, *boost);
                            out.insert(first.doc, score);
                        }
                    }
                }
            }
            Node::Expansion {
                field,
                terms,
                boost,
                idf,
                tie_breaker,
            } => {
                if let Some(f) = seg.field(field) {
                    let mut per_doc: HashMap<u32, (f32, f32)> = HashMap::new();
                    for term in terms {
                        let Some(postings) = f.terms.get(term) else { continue };
                        for p in postings.iter().filter(|p| self.live(seg_idx, p.doc)) {
                            let s = sim.score(field, 1.0, f.field_len(p.doc), *idf, *boost);
                            let e = per_doc.entry(p.doc).or_insert((0.0, 0.0));
                            e.0 = e.0.max(s);
                            e.1 += s;
                        }
                    }
                    for (doc, (max, sum)) in per_doc {
                        out.insert(doc, max + tie_breaker * (sum - max));
                    }
                }
            }
            Node::Constant {
                field,
                terms,
                boost,
            } => {
                for term in terms {
                    if let Some(postings) = seg.postings(field, term) {
                        for p in postings.iter().filter(|p| self.live(seg_idx, p.doc)) {
                            out.insert(p.doc, *boost);
                        }
                    }
                }
            }
            Node::DisMax { nodes, tie_breaker } => {
                let mut acc: HashMap<u32, (f32, f32)> = HashMap::new();
                for n in nodes {
                    for (doc, s) in self.eval(seg_idx, n) {
                        let e = acc.entry(doc).or_insert((f32::MIN, 0.0));
                        e.0 = e.0.max(s);
                        e.1 += s;
                    }
                }
                for (doc, (max, sum)) in acc {
                    out.insert(doc, max + tie_breaker * (sum - max));
                }
            }
            Node::Bool {
                must,
                should,
                must_not,
            } => {
                let mut acc: Option<Scores> = None;
                for n in must {
                    let scores = self.eval(seg_idx, n);
                    acc = Some(match acc {
                        None => scores,
                        Some(prev) => prev
                            .into_iter()
                            .filter_map(|(d, s)| scores.get(&d).map(|s2| (d, s + s2)))
                            .collect(),
                    });
                }
                let should_scores: Vec<Scores> = should.iter().map(|n| self.eval(seg_idx, n)).collect();
                let mut acc = match acc {
                    Some(a) => a,
                    None => {
                        let mut union = Scores::new();
                        for scores in &should_scores {
                            for d in scores.keys() {
                                union.insert(*d, 0.0);
                            }
                        }
                        union
                    }
                };
                for scores in &should_scores {
                    for (d, s) in acc.iter_mut() {
                        if let Some(extra) = scores.get(d) {
                            *s += extra;
                        }
                    }
                }
                for n in must_not {
                    for d in self.eval(seg_idx, n).keys() {
                        acc.remove(d);
                    }
                }
                out = acc;
            }
            Node::All => {
                for doc in 0..seg.max_doc() {
                    if self.live(seg_idx, doc) {
                        out.insert(doc, 1.0);
                    }
                }
            }
            Node::Nothing => {}
        }
        out
    }

    /// Execute `query` and return the requested page with stored fields.
    pub(crate) fn top_docs(
        &self,
        query: &Query,
        stored: impl Fn(&Document) -> Document,
    ) -> TopDocs {
        let root = self.rewrite(query);
        let mut all: Vec<(f32, usize, u32)> = Vec::new();
        for seg_idx in 0..self.segments.len() {
            for (doc, score) in self.eval(seg_idx, &root) {
                all.push((score, seg_idx, doc));
            }
        }

        let total_hits = all.len();
        let max_score = all.iter().map(|h| h.0).fold(0.0f32, f32::max);
        all.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let hits = all
            .into_iter()
            .skip(self.options.offset)
            .take(self.options.limit)
            .map(|(score, seg_idx, doc)| ScoredDoc {
                score,
                doc: stored(&self.segments[seg_idx].docs[doc as usize]),
            })
            .collect();

        TopDocs {
            total_hits,
            max_score,
            hits,
        }
    }
}

/// `BTreeMap::range` panics on inverted bounds; treat them as matching nothing.
fn is_empty_range(lower: Bound<&str>, upper: Bound<&str>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}

fn as_str_bound(b: &Bound<String>) -> Bound<&str> {
    match b {
        Bound::Included(s) => Bound::Included(s.as_str()),
        Bound::Excluded(s) => Bound::Excluded(s.as_str()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Number of positions where the phrase occurs, term `i` at `start + i`
/// give or take `slop`.
fn phrase_freq(first: &Posting, rest: &[&Posting], slop: u32) -> u32 {
    let slop = slop as i64;
    first
        .positions
        .iter()
        .filter(|&&start| {
            rest.iter().enumerate().all(|(i, p)| {
                let expected = start as i64 + i as i64 + 1;
                p.positions
                    .iter()
                    .any(|&pos| (pos as i64 - expected).abs() <= slop)
            })
        })
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(doc: u32, positions: &[u32]) -> Posting {
        Posting {
            doc,
            positions: positions.to_vec(),
        }
    }

    #[test]
    fn test_phrase_freq_exact() {
        let first = posting(0, &[0, 5]);
        let second = posting(0, &[1, 9]);
        assert_eq!(phrase_freq(&first, &[&second], 0), 1);
    }

    #[test]
    fn test_phrase_freq_gap_breaks_phrase() {
        let first = posting(0, &[0]);
        let second = posting(0, &[11]);
        assert_eq!(phrase_freq(&first, &[&second], 0), 0);
        assert_eq!(phrase_freq(&first, &[&second], 10), 1);
    }
}
