//! Scoring infrastructure
//!
//! This module provides:
//! - Similarity trait for pluggable per-index scoring
//! - ClassicSimilarity, the default TF-IDF implementation
//!
//! A similarity is chosen per search, so the same index can be scored
//! differently by different readers.

// ============================================================================
// Similarity Trait
// ============================================================================

/// Pluggable scoring interface.
///
/// The engine scores an exact term match in one field as
/// `boost * tf(freq) * idf² * length_norm(field, field_len)`.
///
/// # Thread Safety
///
/// Similarities must be Send + Sync for concurrent search operations.
pub trait Similarity: Send + Sync {
    /// Inverse document frequency of a term.
    fn idf(&self, doc_freq: u64, num_docs: u64) -> f32;

    /// Weight of a term occurring `freq` times in the field.
    fn tf(&self, freq: f32) -> f32;

    /// Normalization for a field holding `num_terms` tokens.
    fn length_norm(&self, field: &str, num_terms: u32) -> f32;

    /// Name for debugging and logging
    fn name(&self) -> &str;

    /// Score of one term (or phrase) occurrence set in one field.
    fn score(&self, field: &str, freq: f32, field_len: u32, idf: f32, boost: f32) -> f32 {
        boost * self.tf(freq) * idf * idf * self.length_norm(field, field_len)
    }
}

// ============================================================================
// ClassicSimilarity
// ============================================================================

/// Classic TF-IDF.
///
/// - `idf = 1 + ln(N / (df + 1))`
/// - `tf = sqrt(freq)`
/// - `length_norm = 1 / sqrt(num_terms)`
///
/// `idf` stays positive for any `df <= N`, and `tf(1) == 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicSimilarity;

impl Similarity for ClassicSimilarity {
    fn idf(&self, doc_freq: u64, num_docs: u64) -> f32 {
        1.0 + (num_docs as f32 / (doc_freq as f32 + 1.0)).ln()
    }

    fn tf(&self, freq: f32) -> f32 {
        freq.sqrt()
    }

    fn length_norm(&self, _field: &str, num_terms: u32) -> f32 {
        if num_terms == 0 {
            return 1.0;
        }
        1.0 / (num_terms as f32).sqrt()
    }

    fn name(&self) -> &str {
        "classic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_decreases_with_doc_freq() {
        let sim = ClassicSimilarity;
        assert!(sim.idf(1, 100) > sim.idf(10, 100));
        assert!(sim.idf(100, 100) > 0.0);
    }

    #[test]
    fn test_tf_of_one_is_one() {
        assert!((ClassicSimilarity.tf(1.0) - 1.0).abs() < 1e-6);
        assert!(ClassicSimilarity.tf(4.0) > ClassicSimilarity.tf(1.0));
    }

    #[test]
    fn test_length_norm() {
        let sim = ClassicSimilarity;
        assert!((sim.length_norm("f", 4) - 0.5).abs() < 1e-6);
        assert!(sim.length_norm("f", 1) > sim.length_norm("f", 9));
        assert!((sim.length_norm("f", 0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_score_formula() {
        let sim = ClassicSimilarity;
        let idf = sim.idf(1, 10);
        let expected = 2.0 * 2.0 * idf * idf * 0.5;
        assert!((sim.score("f", 4.0, 4, idf, 2.0) - expected).abs() < 1e-5);
    }
}
