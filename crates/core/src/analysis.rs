//! Per-field text analysis
//!
//! Every field declares an [`AnalyzerKind`]; the same analyzer is applied
//! when a document is indexed and when a query term is compiled against the
//! field, so both sides agree on the token form.
//!
//! Pipelines:
//! - `Standard`: UAX#29 word boundaries → accent folding → lowercase
//! - `AccentPreserving`: UAX#29 word boundaries → lowercase
//! - `Keyword`: whole value as one token, untouched
//! - `CaseInsensitiveKeyword`: whole value as one token, lowercased
//! - `WithPositionGap`: `Standard`, plus a position gap between values of a
//!   multi-valued field so phrases never match across two values
//!
//! No stopwords are removed: titles such as "The The" must stay searchable.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Position gap inserted between values of a `WithPositionGap` field.
pub const POSITION_INCREMENT_GAP: u32 = 10;

/// A single analyzed token and its position within the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Normalized token text
    pub text: String,
    /// Position relative to the start of the value
    pub position: u32,
}

/// Pluggable text analyzer.
pub trait Analyzer: Send + Sync {
    /// Split a value into tokens.
    fn analyze(&self, text: &str) -> Vec<Token>;

    /// Gap added to positions between successive values of the same field.
    fn position_gap(&self) -> u32 {
        0
    }
}

/// Analyzer variants a field can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalyzerKind {
    /// Word split, accent folded, lowercased
    Standard,
    /// Word split, lowercased, accents kept
    AccentPreserving,
    /// Exact value
    Keyword,
    /// Exact value, lowercased
    CaseInsensitiveKeyword,
    /// `Standard` with a gap between multi-valued entries
    WithPositionGap,
}

impl AnalyzerKind {
    /// Resolve the analyzer implementation for this kind.
    pub fn analyzer(self) -> &'static dyn Analyzer {
        match self {
            AnalyzerKind::Standard => &StandardAnalyzer,
            AnalyzerKind::AccentPreserving => &AccentPreservingAnalyzer,
            AnalyzerKind::Keyword => &KeywordAnalyzer,
            AnalyzerKind::CaseInsensitiveKeyword => &CaseInsensitiveKeywordAnalyzer,
            AnalyzerKind::WithPositionGap => &PositionGapAnalyzer,
        }
    }

    /// Whether the analyzer keeps the whole value as a single token.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            AnalyzerKind::Keyword | AnalyzerKind::CaseInsensitiveKeyword
        )
    }

    /// Shortcut for `self.analyzer().analyze(text)`.
    pub fn analyze(self, text: &str) -> Vec<Token> {
        self.analyzer().analyze(text)
    }

    /// Analyze and return only token texts.
    pub fn terms(self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }
}

/// Strip diacritics: decompose (NFKD) and drop combining marks.
pub fn fold_accents(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

fn word_tokens(text: &str, fold: bool) -> Vec<Token> {
    text.unicode_words()
        .enumerate()
        .map(|(i, word)| {
            let text = if fold {
                fold_accents(word).to_lowercase()
            } else {
                word.to_lowercase()
            };
            Token {
                text,
                position: i as u32,
            }
        })
        .filter(|t| !t.text.is_empty())
        .collect()
}

struct StandardAnalyzer;

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        word_tokens(text, true)
    }
}

struct AccentPreservingAnalyzer;

impl Analyzer for AccentPreservingAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        word_tokens(text, false)
    }
}

struct KeywordAnalyzer;

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![Token {
            text: text.to_string(),
            position: 0,
        }]
    }
}

struct CaseInsensitiveKeywordAnalyzer;

impl Analyzer for CaseInsensitiveKeywordAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![Token {
            text: text.to_lowercase(),
            position: 0,
        }]
    }
}

struct PositionGapAnalyzer;

impl Analyzer for PositionGapAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        word_tokens(text, true)
    }

    fn position_gap(&self) -> u32 {
        POSITION_INCREMENT_GAP
    }
}
