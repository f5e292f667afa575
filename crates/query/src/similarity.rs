//! Per-index scoring
//!
//! Recording titles are short and their length says nothing about
//! relevance ("Crocodiles" vs "Crocodiles (bonus disc)"), so the recording
//! index scores its name field without length normalization. Every other
//! field and index uses the classic TF-IDF similarity.

use musearch_core::IndexKind;
use musearch_engine::{ClassicSimilarity, Similarity};
use std::sync::Arc;

/// Classic TF-IDF with a flat length norm on the recording name field.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingSimilarity;

/// Field whose length is ignored by [`RecordingSimilarity`].
const NAME_FIELD: &str = "recording";

impl Similarity for RecordingSimilarity {
    fn idf(&self, doc_freq: u64, num_docs: u64) -> f32 {
        ClassicSimilarity.idf(doc_freq, num_docs)
    }

    fn tf(&self, freq: f32) -> f32 {
        ClassicSimilarity.tf(freq)
    }

    fn length_norm(&self, field: &str, num_terms: u32) -> f32 {
        if field == NAME_FIELD {
            1.0
        } else {
            ClassicSimilarity.length_norm(field, num_terms)
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Similarity used to search `kind`.
pub fn similarity_for(kind: IndexKind) -> Arc<dyn Similarity> {
    match kind {
        IndexKind::Recording => Arc::new(RecordingSimilarity),
        _ => Arc::new(ClassicSimilarity),
    }
}
