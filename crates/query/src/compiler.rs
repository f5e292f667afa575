//! Relevance-ranking query compiler
//!
//! Turns a raw user query into the engine's structured [`Query`]:
//!
//! - each unfielded term becomes a best-of combiner (dismax) over the
//!   default alias's fields, so a term matching two fields of the alias is
//!   counted once
//! - long unquoted terms add prefix and fuzzy alternatives per fuzzy field,
//!   at a fraction of that field's exact boost
//! - a plain multi-word query additionally gets an optional whole-query
//!   phrase clause at a small boost, refining rather than dominating ranking
//!
//! Compilation never fails: a query that doesn't parse is retried as plain
//! words, and a clause naming an unknown field or carrying an unusable
//! value compiles to a clause that matches nothing.

use crate::alias::{Alias, AliasTable};
use crate::config::QueryConfig;
use crate::error::{QueryError, QueryResult};
use crate::parser::{self, Node};
use musearch_core::numeric::{encode_int, encode_long, term_limits};
use musearch_core::{FieldRegistry, FieldSpec, IndexKind, NumericKind, NO_VALUE};
use musearch_engine::{Occur, Query};
use tracing::{debug, warn};

/// Compiles raw queries against one index.
pub struct QueryCompiler<'a> {
    registry: &'static FieldRegistry,
    aliases: &'static AliasTable,
    config: &'a QueryConfig,
}

impl<'a> QueryCompiler<'a> {
    /// Compiler for `kind` with its default alias table.
    pub fn new(kind: IndexKind, config: &'a QueryConfig) -> Self {
        QueryCompiler {
            registry: kind.registry(),
            aliases: AliasTable::for_index(kind),
            config,
        }
    }

    /// Compile `raw` into a structured query.
    pub fn compile(&self, raw: &str) -> Query {
        let tree = match parser::parse(raw) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(
                    target: "musearch::query",
                    index = self.registry.index_name(),
                    query = raw,
                    error = %e,
                    "Query does not parse, searching its words instead"
                );
                match parser::parse(&parser::escape(raw)) {
                    Ok(tree) => tree,
                    Err(_) => return Query::MatchNone,
                }
            }
        };

        let terms = self.node(&tree);
        let query = match self.phrase_bonus(&tree) {
            Some(phrase) if !terms.is_match_none() => Query::Boolean {
                clauses: vec![(Occur::Must, terms), (Occur::Should, phrase)],
            },
            _ => terms,
        };
        debug!(
            target: "musearch::query",
            index = self.registry.index_name(),
            query = raw,
            compiled = ?query,
            "Compiled query"
        );
        query
    }

    fn node(&self, node: &Node) -> Query {
        match node {
            Node::Group(clauses) => self.group(clauses),
            Node::Text {
                field: None,
                text,
                quoted,
            } => self.alias_query(self.aliases.default_alias(), text, *quoted),
            Node::Text {
                field: Some(name),
                text,
                quoted,
            } => match (self.registry.get(name), self.aliases.get(name)) {
                (Some(spec), _) => self
                    .field_query(spec, text, *quoted, 1.0)
                    .unwrap_or_else(|e| self.unusable(e)),
                (None, Some(alias)) => self.alias_query(alias, text, *quoted),
                (None, None) => self.unusable(self.unknown(name)),
            },
            Node::Range {
                field,
                lower,
                upper,
                inclusive,
            } => {
                let Some(name) = field else {
                    return self.unusable(QueryError::syntax(0, "range without a field"));
                };
                match self.registry.get(name) {
                    Some(spec) => self
                        .range_query(spec, lower.as_deref(), upper.as_deref(), *inclusive)
                        .unwrap_or_else(|e| self.unusable(e)),
                    None => self.unusable(self.unknown(name)),
                }
            }
        }
    }

    fn group(&self, clauses: &[(Occur, Node)]) -> Query {
        let mut compiled: Vec<(Occur, Query)> = clauses
            .iter()
            .map(|(occur, node)| (*occur, self.node(node)))
            .collect();
        if compiled.is_empty() {
            return Query::MatchNone;
        }
        if compiled.iter().all(|(occur, _)| *occur == Occur::MustNot) {
            compiled.insert(0, (Occur::Must, Query::MatchAll));
        }
        if compiled.len() == 1 && compiled[0].0 != Occur::MustNot {
            return compiled.remove(0).1;
        }
        Query::Boolean { clauses: compiled }
    }

    /// Best-of combiner over the alias's fields for one term.
    fn alias_query(&self, alias: &Alias, text: &str, quoted: bool) -> Query {
        let long_enough = text.chars().count() >= self.config.fuzzy_min_length;
        let mut disjuncts = Vec::new();
        for af in alias.fields {
            let Some(spec) = self.registry.get(af.field) else {
                continue;
            };
            let exact = match self.field_query(spec, text, quoted, af.boost) {
                Ok(q) if !q.is_match_none() => q,
                _ => continue,
            };
            let single = match &exact {
                Query::Term { term, .. } if af.fuzzy && !quoted && long_enough => {
                    Some(term.clone())
                }
                _ => None,
            };
            disjuncts.push(exact);
            if let Some(term) = single {
                let boost = af.boost * self.config.wildcard_boost_reducer;
                disjuncts.push(Query::Prefix {
                    field: af.field.to_string(),
                    prefix: term.clone(),
                    boost,
                });
                disjuncts.push(Query::Fuzzy {
                    field: af.field.to_string(),
                    term,
                    max_edits: self.config.fuzzy_max_edits,
                    boost,
                });
            }
        }
        if disjuncts.is_empty() {
            return Query::MatchNone;
        }
        Query::DisjunctionMax {
            disjuncts,
            tie_breaker: alias.tie_breaker,
        }
    }

    /// Exact-match query of `text` in one real field.
    fn field_query(
        &self,
        spec: &FieldSpec,
        text: &str,
        quoted: bool,
        boost: f32,
    ) -> QueryResult<Query> {
        if !spec.indexed {
            return Err(self.unknown(spec.name));
        }
        if let Some(kind) = spec.numeric {
            let term = encode_number(spec.name, kind, text)?;
            return Ok(term_query(spec.name, term, boost));
        }
        let mut terms = spec.analyzer.terms(text);
        Ok(match terms.len() {
            0 => Query::MatchNone,
            1 => term_query(spec.name, terms.remove(0), boost),
            _ if quoted => Query::Phrase {
                field: spec.name.to_string(),
                terms,
                slop: 0,
                boost,
            },
            _ => Query::Boolean {
                clauses: terms
                    .into_iter()
                    .map(|t| (Occur::Should, term_query(spec.name, t, boost)))
                    .collect(),
            },
        })
    }

    fn range_query(
        &self,
        spec: &FieldSpec,
        lower: Option<&str>,
        upper: Option<&str>,
        inclusive: bool,
    ) -> QueryResult<Query> {
        if !spec.indexed {
            return Err(self.unknown(spec.name));
        }
        let bound = |value: Option<&str>, is_lower: bool| -> QueryResult<Option<String>> {
            match (value, spec.numeric) {
                (None, Some(kind)) => {
                    let (lo, hi) = term_limits(kind);
                    Ok(Some(if is_lower { lo } else { hi }))
                }
                (None, None) => Ok(None),
                (Some(v), Some(kind)) => encode_number(spec.name, kind, v).map(Some),
                (Some(v), None) => Ok(Some(
                    spec.analyzer
                        .terms(v)
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| v.to_string()),
                )),
            }
        };
        Ok(Query::Range {
            field: spec.name.to_string(),
            lower: bound(lower, true)?,
            upper: bound(upper, false)?,
            inclusive,
            boost: 1.0,
        })
    }

    /// Optional phrase clause over the default alias for plain queries.
    fn phrase_bonus(&self, tree: &Node) -> Option<Query> {
        let Node::Group(clauses) = tree else {
            return None;
        };
        if !tree.is_plain() {
            return None;
        }
        let words: Vec<&str> = clauses
            .iter()
            .filter_map(|(_, node)| match node {
                Node::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        let text = words.join(" ");
        let alias = self.aliases.default_alias();
        let disjuncts: Vec<Query> = alias
            .fields
            .iter()
            .filter_map(|af| {
                let spec = self.registry.get(af.field)?;
                let terms = spec.analyzer.terms(&text);
                (spec.numeric.is_none() && terms.len() > 1).then(|| Query::Phrase {
                    field: af.field.to_string(),
                    terms,
                    slop: 0,
                    // Same boost for every field, whatever its alias weight.
                    boost: self.config.phrase_boost_reducer,
                })
            })
            .collect();
        if disjuncts.is_empty() {
            return None;
        }
        Some(Query::DisjunctionMax {
            disjuncts,
            tie_breaker: alias.tie_breaker,
        })
    }

    fn unknown(&self, field: &str) -> QueryError {
        QueryError::UnknownField {
            index: self.registry.index_name().to_string(),
            field: field.to_string(),
        }
    }

    fn unusable(&self, error: QueryError) -> Query {
        warn!(
            target: "musearch::query",
            index = self.registry.index_name(),
            error = %error,
            "Clause matches nothing"
        );
        Query::MatchNone
    }
}

fn term_query(field: &str, term: String, boost: f32) -> Query {
    Query::Term {
        field: field.to_string(),
        term,
        boost,
    }
}

fn encode_number(field: &str, kind: NumericKind, value: &str) -> QueryResult<String> {
    if value == NO_VALUE {
        return Ok(NO_VALUE.to_string());
    }
    let invalid = || QueryError::InvalidNumber {
        field: field.to_string(),
        value: value.to_string(),
    };
    Ok(match kind {
        NumericKind::Int => encode_int(value.trim().parse().map_err(|_| invalid())?),
        NumericKind::Long => encode_long(value.trim().parse().map_err(|_| invalid())?),
    })
}
