//! Structured query AST executed by the engine
//!
//! Terms carried by these queries are already analyzed: the engine matches
//! them against the term dictionary verbatim.

/// How a clause participates in a boolean query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// Must match; contributes to the score
    Must,
    /// Optional; contributes to the score when it matches
    Should,
    /// Must not match
    MustNot,
}

/// A structured query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Exact term in one field
    Term {
        /// Field name
        field: String,
        /// Analyzed term
        term: String,
        /// Boost
        boost: f32,
    },
    /// Consecutive terms in one field
    Phrase {
        /// Field name
        field: String,
        /// Analyzed terms in order
        terms: Vec<String>,
        /// Allowed positional slack
        slop: u32,
        /// Boost
        boost: f32,
    },
    /// Every term starting with `prefix`
    Prefix {
        /// Field name
        field: String,
        /// Analyzed prefix
        prefix: String,
        /// Boost
        boost: f32,
    },
    /// Every term within `max_edits` of `term`
    Fuzzy {
        /// Field name
        field: String,
        /// Analyzed term
        term: String,
        /// Maximum Levenshtein distance
        max_edits: u32,
        /// Boost
        boost: f32,
    },
    /// Encoded terms between `lower` and `upper`
    Range {
        /// Field name
        field: String,
        /// Lower bound (open when `None`)
        lower: Option<String>,
        /// Upper bound (open when `None`)
        upper: Option<String>,
        /// Whether bounds are inclusive
        inclusive: bool,
        /// Boost
        boost: f32,
    },
    /// Best-of combiner: max score plus `tie_breaker` times the others
    DisjunctionMax {
        /// Alternatives
        disjuncts: Vec<Query>,
        /// Weight of the non-maximal scores
        tie_breaker: f32,
    },
    /// Boolean combination
    Boolean {
        /// Clauses
        clauses: Vec<(Occur, Query)>,
    },
    /// Every live document
    MatchAll,
    /// Nothing
    MatchNone,
}

impl Query {
    /// Term query with boost 1.
    pub fn term(field: &str, term: &str) -> Self {
        Query::Term {
            field: field.to_string(),
            term: term.to_string(),
            boost: 1.0,
        }
    }

    /// Multiply the boost of this query (and of nested clauses for combiners).
    pub fn boosted(self, factor: f32) -> Self {
        match self {
            Query::Term { field, term, boost } => Query::Term {
                field,
                term,
                boost: boost * factor,
            },
            Query::Phrase {
                field,
                terms,
                slop,
                boost,
            } => Query::Phrase {
                field,
                terms,
                slop,
                boost: boost * factor,
            },
            Query::Prefix {
                field,
                prefix,
                boost,
            } => Query::Prefix {
                field,
                prefix,
                boost: boost * factor,
            },
            Query::Fuzzy {
                field,
                term,
                max_edits,
                boost,
            } => Query::Fuzzy {
                field,
                term,
                max_edits,
                boost: boost * factor,
            },
            Query::Range {
                field,
                lower,
                upper,
                inclusive,
                boost,
            } => Query::Range {
                field,
                lower,
                upper,
                inclusive,
                boost: boost * factor,
            },
            Query::DisjunctionMax {
                disjuncts,
                tie_breaker,
            } => Query::DisjunctionMax {
                disjuncts: disjuncts.into_iter().map(|q| q.boosted(factor)).collect(),
                tie_breaker,
            },
            Query::Boolean { clauses } => Query::Boolean {
                clauses: clauses
                    .into_iter()
                    .map(|(o, q)| (o, q.boosted(factor)))
                    .collect(),
            },
            other => other,
        }
    }

    /// Whether the query can never match.
    pub fn is_match_none(&self) -> bool {
        match self {
            Query::MatchNone => true,
            Query::DisjunctionMax { disjuncts, .. } => disjuncts.iter().all(Query::is_match_none),
            Query::Boolean { clauses } => {
                clauses.is_empty()
                    || clauses
                        .iter()
                        .any(|(o, q)| *o == Occur::Must && q.is_match_none())
                    || clauses
                        .iter()
                        .filter(|(o, _)| *o != Occur::MustNot)
                        .all(|(_, q)| q.is_match_none())
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boosted_multiplies_nested() {
        let q = Query::DisjunctionMax {
            disjuncts: vec![Query::term("a", "x"), Query::term("b", "x").boosted(2.0)],
            tie_breaker: 0.0,
        }
        .boosted(0.5);
        match q {
            Query::DisjunctionMax { disjuncts, .. } => {
                assert_eq!(disjuncts[0], Query::term("a", "x").boosted(0.5));
                match &disjuncts[1] {
                    Query::Term { boost, .. } => assert!((boost - 1.0).abs() < 1e-6),
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_is_match_none() {
        assert!(Query::MatchNone.is_match_none());
        assert!(Query::Boolean { clauses: vec![] }.is_match_none());
        assert!(Query::Boolean {
            clauses: vec![(Occur::Must, Query::MatchNone), (Occur::Should, Query::term("a", "b"))]
        }
        .is_match_none());
        assert!(!Query::Boolean {
            clauses: vec![(Occur::Should, Query::MatchNone), (Occur::Should, Query::term("a", "b"))]
        }
        .is_match_none());
    }
}
