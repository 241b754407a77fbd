use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::error::EmbeddingError;
use crate::model::{ConfidenceLevel, EvidenceSegment, QualityReport};
use crate::sections::is_high_priority_section;
use crate::semantic::{SemanticRanker, mean_pairwise_similarity};

const AVERAGE_WEIGHT: f64 = 0.35;
const MINIMUM_WEIGHT: f64 = 0.15;
const DIVERSITY_WEIGHT: f64 = 0.20;
const PRIORITY_WEIGHT: f64 = 0.20;
const CONSISTENCY_WEIGHT: f64 = 0.10;

/// Distinct sections at which diversity saturates.
const IDEAL_SECTION_COUNT: f64 = 3.0;
/// Share of Methods/Results segments at which the priority component saturates.
const IDEAL_PRIORITY_SHARE: f64 = 0.4;

/// Maps the mean pairwise similarity of a segment set onto a contradiction
/// score. Segments that agree with each other score low.
pub fn contradiction_band(mean_similarity: f64) -> f64 {
    if mean_similarity >= 0.7 {
        0.0
    } else if mean_similarity >= 0.5 {
        0.3
    } else if mean_similarity >= 0.3 {
        0.6
    } else {
        0.9
    }
}

pub fn compute_quality_score(
    average_similarity: f64,
    min_similarity: f64,
    section_diversity: usize,
    high_priority_count: usize,
    contradiction_score: f64,
    total_segments: usize,
) -> f64 {
    let diversity = (section_diversity as f64 / IDEAL_SECTION_COUNT).min(1.0);
    let priority_share = if total_segments > 0 {
        high_priority_count as f64 / total_segments as f64
    } else {
        0.0
    };
    let priority = (priority_share / IDEAL_PRIORITY_SHARE).min(1.0);

    // Reweighted scores can exceed 1.0; the similarity components stay bounded.
    let quality = AVERAGE_WEIGHT * average_similarity.clamp(0.0, 1.0)
        + MINIMUM_WEIGHT * min_similarity.clamp(0.0, 1.0)
        + DIVERSITY_WEIGHT * diversity
        + PRIORITY_WEIGHT * priority
        + CONSISTENCY_WEIGHT * (1.0 - contradiction_score.clamp(0.0, 1.0));
    quality.clamp(0.0, 1.0)
}

pub fn confidence_for(quality_score: f64) -> ConfidenceLevel {
    if quality_score >= 0.8 {
        ConfidenceLevel::High
    } else if quality_score >= 0.6 {
        ConfidenceLevel::Medium
    } else if quality_score >= 0.4 {
        ConfidenceLevel::Low
    } else {
        ConfidenceLevel::VeryLow
    }
}

/// Scores a retrieved segment set. Read-only over its input.
#[derive(Clone, Copy)]
pub struct QualityAuditor<'e> {
    semantic: SemanticRanker<'e>,
}

impl<'e> QualityAuditor<'e> {
    pub fn new(semantic: SemanticRanker<'e>) -> Self {
        Self { semantic }
    }

    pub fn audit(&self, segments: &[EvidenceSegment]) -> Result<QualityReport, EmbeddingError> {
        if segments.is_empty() {
            debug!("no segments to audit");
            return Ok(QualityReport::empty());
        }

        let scores = segments
            .iter()
            .map(|segment| segment.similarity_score)
            .collect::<Vec<f64>>();
        let average_similarity = scores.iter().sum::<f64>() / scores.len() as f64;
        let min_similarity = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max_similarity = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let section_diversity = segments
            .iter()
            .map(|segment| segment.section.as_str())
            .collect::<BTreeSet<&str>>()
            .len();
        let high_priority_segment_count = segments
            .iter()
            .filter(|segment| is_high_priority_section(&segment.section))
            .count();

        let contradiction_score = self.contradiction_score(segments)?;
        let quality_score = compute_quality_score(
            average_similarity,
            min_similarity,
            section_diversity,
            high_priority_segment_count,
            contradiction_score,
            segments.len(),
        );
        let confidence_level = confidence_for(quality_score);

        info!(
            segment_count = segments.len(),
            quality_score,
            confidence = confidence_level.as_str(),
            "evidence quality assessed"
        );

        Ok(QualityReport {
            average_similarity,
            min_similarity,
            max_similarity,
            section_diversity,
            high_priority_segment_count,
            contradiction_score,
            quality_score,
            confidence_level,
        })
    }

    fn contradiction_score(&self, segments: &[EvidenceSegment]) -> Result<f64, EmbeddingError> {
        if segments.len() < 2 {
            return Ok(0.0);
        }
        let texts = segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect::<Vec<&str>>();
        let vectors = self.semantic.embed_batch(&texts)?;
        Ok(mean_pairwise_similarity(&vectors)
            .map(contradiction_band)
            .unwrap_or(0.0))
    }
}
