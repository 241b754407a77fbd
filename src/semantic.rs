use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::embedding::Embedder;
use crate::error::EmbeddingError;
use crate::model::{EvidenceSegment, Paragraph, RetrievalMethod};

/// Cosine similarity with explicit norms, so it holds for unnormalized
/// vectors. Mismatched lengths, empty vectors and zero norms score 0.0.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut left_norm = 0.0_f64;
    let mut right_norm = 0.0_f64;
    for (left_value, right_value) in left.iter().zip(right.iter()) {
        let left_value = f64::from(*left_value);
        let right_value = f64::from(*right_value);
        dot += left_value * right_value;
        left_norm += left_value * left_value;
        right_norm += right_value * right_value;
    }

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    (dot / (left_norm.sqrt() * right_norm.sqrt())).clamp(-1.0, 1.0)
}

/// Similarity of one query vector against each row of a batch.
pub fn batch_cosine_similarity(query: &[f32], rows: &[Vec<f32>]) -> Vec<f64> {
    rows.iter()
        .map(|row| cosine_similarity(query, row))
        .collect::<Vec<f64>>()
}

/// Mean cosine similarity over all unordered pairs; `None` below two vectors.
pub fn mean_pairwise_similarity(vectors: &[Vec<f32>]) -> Option<f64> {
    if vectors.len() < 2 {
        return None;
    }

    let mut total = 0.0_f64;
    let mut pairs = 0usize;
    for (position, left) in vectors.iter().enumerate() {
        for right in &vectors[position + 1..] {
            total += cosine_similarity(left, right);
            pairs += 1;
        }
    }
    Some(total / pairs as f64)
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredParagraph<'a> {
    pub paragraph: &'a Paragraph,
    pub similarity: f64,
}

/// Dense re-ranking over caller-supplied candidates. Holds no state beyond
/// the embedder, so identical inputs always produce identical output.
#[derive(Clone, Copy)]
pub struct SemanticRanker<'e> {
    embedder: &'e dyn Embedder,
    excerpt_chars: usize,
}

impl<'e> SemanticRanker<'e> {
    pub fn new(embedder: &'e dyn Embedder, excerpt_chars: usize) -> Self {
        Self {
            embedder,
            excerpt_chars,
        }
    }

    pub fn embedder(&self) -> &'e dyn Embedder {
        self.embedder
    }

    pub fn excerpt_chars(&self) -> usize {
        self.excerpt_chars
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self.embedder.embed(text)?;
        self.check_dimensions(&vector)?;
        Ok(vector)
    }

    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let vectors = self.embedder.embed_batch(texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::BatchLength {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }
        Ok(vectors)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), EmbeddingError> {
        let expected = self.embedder.dimensions();
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Every candidate with its similarity to `query`, highest first. Equal
    /// similarities keep candidate order.
    pub fn rank_candidates<'p>(
        &self,
        query: &str,
        candidates: &[&'p Paragraph],
    ) -> Result<Vec<ScoredParagraph<'p>>, EmbeddingError> {
        if candidates.is_empty() {
            warn!("no candidate paragraphs provided for semantic ranking");
            return Ok(Vec::new());
        }

        let query_vector = self.embed(query)?;
        let texts = candidates
            .iter()
            .map(|paragraph| paragraph.text.as_str())
            .collect::<Vec<&str>>();
        let candidate_vectors = self.embed_batch(&texts)?;

        let mut scored = candidates
            .iter()
            .zip(batch_cosine_similarity(&query_vector, &candidate_vectors))
            .map(|(paragraph, similarity)| ScoredParagraph {
                paragraph: *paragraph,
                similarity,
            })
            .collect::<Vec<ScoredParagraph<'p>>>();
        scored.sort_by(|left, right| {
            right
                .similarity
                .partial_cmp(&left.similarity)
                .unwrap_or(Ordering::Equal)
        });
        Ok(scored)
    }

    /// Ranks candidates, keeps those at or above `min_similarity`, and returns
    /// at most `top_k` segments tagged `semantic`.
    pub fn retrieve_evidence(
        &self,
        query: &str,
        candidates: &[&Paragraph],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<EvidenceSegment>, EmbeddingError> {
        let ranked = self.rank_candidates(query, candidates)?;
        let segments = select_segments(
            &ranked,
            top_k,
            min_similarity,
            RetrievalMethod::Semantic,
            self.excerpt_chars,
        );
        debug!(
            candidate_count = candidates.len(),
            segment_count = segments.len(),
            top_k,
            min_similarity,
            "semantic retrieval complete"
        );
        Ok(segments)
    }
}

/// Threshold filter then truncation over an already-sorted ranking.
pub fn select_segments(
    ranked: &[ScoredParagraph<'_>],
    top_k: usize,
    min_similarity: f64,
    method: RetrievalMethod,
    excerpt_chars: usize,
) -> Vec<EvidenceSegment> {
    ranked
        .iter()
        .filter(|scored| scored.similarity >= min_similarity)
        .take(top_k)
        .map(|scored| {
            EvidenceSegment::from_paragraph(
                scored.paragraph,
                scored.similarity,
                method,
                excerpt_chars,
            )
        })
        .collect::<Vec<EvidenceSegment>>()
}

#[cfg(test)]
mod tests;
