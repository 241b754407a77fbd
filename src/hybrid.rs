use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RetrievalError;
use crate::lexical::{Bm25Params, LexicalRanker};
use crate::model::{EvidenceSegment, Paragraph, RetrievalMethod};
use crate::segmenter::DocumentSegmenter;
use crate::semantic::{ScoredParagraph, SemanticRanker, select_segments};

/// Fallback thresholds tried, in order, after the caller's minimum.
pub const THRESHOLD_LADDER: [f64; 7] = [0.6, 0.5, 0.4, 0.3, 0.2, 0.1, 0.0];

/// Threshold used by the forced fill. Cosine similarity never drops below it,
/// so every ranked candidate qualifies.
pub const FORCE_FILL_FLOOR: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub bm25_top_n: usize,
    pub final_top_k: usize,
    pub min_similarity: f64,
    pub minimum_segments: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            bm25_top_n: 20,
            final_top_k: 5,
            min_similarity: 0.7,
            minimum_segments: 3,
        }
    }
}

impl HybridConfig {
    pub fn semantic_top_k(&self) -> usize {
        self.final_top_k.max(self.minimum_segments)
    }
}

/// The caller's minimum followed by every ladder step below it.
pub fn threshold_schedule(min_similarity: f64) -> Vec<f64> {
    std::iter::once(min_similarity)
        .chain(
            THRESHOLD_LADDER
                .into_iter()
                .filter(|threshold| *threshold < min_similarity),
        )
        .collect::<Vec<f64>>()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSelection {
    pub segments: Vec<EvidenceSegment>,
    pub threshold_used: f64,
    pub forced_fill: bool,
}

/// Walks the threshold schedule over a ranking that was scored once and
/// returns the first selection holding at least `minimum_segments`. If none
/// does, the top `minimum_segments` candidates are returned regardless of
/// score.
pub fn select_with_threshold_ladder(
    ranked: &[ScoredParagraph<'_>],
    min_similarity: f64,
    top_k: usize,
    minimum_segments: usize,
    method: RetrievalMethod,
    excerpt_chars: usize,
) -> ThresholdSelection {
    let satisfied = threshold_schedule(min_similarity)
        .into_iter()
        .map(|threshold| {
            (
                threshold,
                select_segments(ranked, top_k, threshold, method, excerpt_chars),
            )
        })
        .find(|(_, segments)| segments.len() >= minimum_segments);

    match satisfied {
        Some((threshold_used, segments)) => ThresholdSelection {
            segments,
            threshold_used,
            forced_fill: false,
        },
        None => ThresholdSelection {
            segments: select_segments(
                ranked,
                minimum_segments,
                FORCE_FILL_FLOOR,
                method,
                excerpt_chars,
            ),
            threshold_used: FORCE_FILL_FLOOR,
            forced_fill: true,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HybridOutcome {
    pub segments: Vec<EvidenceSegment>,
    pub threshold_used: f64,
    pub forced_fill: bool,
    pub lexical_candidate_count: usize,
    pub backfilled_count: usize,
}

impl HybridOutcome {
    fn empty(threshold_used: f64) -> Self {
        Self {
            segments: Vec::new(),
            threshold_used,
            forced_fill: false,
            lexical_candidate_count: 0,
            backfilled_count: 0,
        }
    }
}

/// Lexical coarse filter followed by semantic re-ranking with adaptive
/// threshold relaxation.
pub struct HybridRetriever<'e> {
    semantic: SemanticRanker<'e>,
    segmenter: DocumentSegmenter,
    bm25: Bm25Params,
    config: HybridConfig,
}

impl<'e> HybridRetriever<'e> {
    pub fn new(
        semantic: SemanticRanker<'e>,
        segmenter: DocumentSegmenter,
        bm25: Bm25Params,
        config: HybridConfig,
    ) -> Self {
        Self {
            semantic,
            segmenter,
            bm25,
            config,
        }
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    pub fn semantic(&self) -> SemanticRanker<'e> {
        self.semantic
    }

    pub fn segmenter(&self) -> &DocumentSegmenter {
        &self.segmenter
    }

    /// Fresh lexical index over `paragraphs`.
    pub fn build_lexical_index(&self, paragraphs: &[Paragraph]) -> LexicalRanker {
        let mut lexical = LexicalRanker::new(self.bm25);
        lexical.build_index(paragraphs);
        lexical
    }

    /// Segments `reference_xml` and retrieves evidence for `query` from it.
    pub fn retrieve(
        &self,
        query: &str,
        reference_xml: &str,
    ) -> Result<Vec<EvidenceSegment>, RetrievalError> {
        Ok(self.retrieve_detailed(query, reference_xml)?.segments)
    }

    pub fn retrieve_detailed(
        &self,
        query: &str,
        reference_xml: &str,
    ) -> Result<HybridOutcome, RetrievalError> {
        let document = self.segmenter.segment(reference_xml);
        self.retrieve_from_paragraphs(query, &document.paragraphs)
    }

    pub fn retrieve_from_paragraphs(
        &self,
        query: &str,
        paragraphs: &[Paragraph],
    ) -> Result<HybridOutcome, RetrievalError> {
        let lexical = self.build_lexical_index(paragraphs);
        self.retrieve_with_index(query, &lexical)
    }

    /// Runs both stages against an index the caller already built.
    pub fn retrieve_with_index(
        &self,
        query: &str,
        lexical: &LexicalRanker,
    ) -> Result<HybridOutcome, RetrievalError> {
        retrieve_with_config(self.semantic, query, lexical, &self.config)
    }

    /// One retrieval per (query, reference document) pair, in order.
    pub fn batch_retrieve(
        &self,
        pairs: &[(&str, &str)],
    ) -> Result<Vec<Vec<EvidenceSegment>>, RetrievalError> {
        pairs
            .iter()
            .map(|(query, reference_xml)| self.retrieve(query, reference_xml))
            .collect()
    }
}

pub(crate) fn retrieve_with_config(
    semantic: SemanticRanker<'_>,
    query: &str,
    lexical: &LexicalRanker,
    config: &HybridConfig,
) -> Result<HybridOutcome, RetrievalError> {
    if query.trim().is_empty() {
        warn!("empty query; returning no evidence");
        return Ok(HybridOutcome::empty(config.min_similarity));
    }

    let hits = lexical.search(query, config.bm25_top_n)?;
    let lexical_candidate_count = hits.len();
    let mut candidates = hits
        .iter()
        .map(|hit| hit.paragraph)
        .collect::<Vec<&Paragraph>>();
    info!(
        lexical_candidate_count,
        bm25_top_n = config.bm25_top_n,
        "lexical stage complete"
    );

    let backfilled_count =
        backfill_candidates(&mut candidates, lexical.paragraphs(), config.minimum_segments);
    if backfilled_count > 0 {
        warn!(
            lexical_candidate_count,
            backfilled_count,
            minimum_segments = config.minimum_segments,
            "too few lexical candidates; backfilled in document order"
        );
    }

    if candidates.is_empty() {
        warn!("no candidate paragraphs; returning no evidence");
        return Ok(HybridOutcome::empty(config.min_similarity));
    }

    let ranked = semantic.rank_candidates(query, &candidates)?;
    let selection = select_with_threshold_ladder(
        &ranked,
        config.min_similarity,
        config.semantic_top_k(),
        config.minimum_segments,
        RetrievalMethod::Hybrid,
        semantic.excerpt_chars(),
    );

    if selection.forced_fill {
        warn!(
            segment_count = selection.segments.len(),
            minimum_segments = config.minimum_segments,
            "threshold ladder exhausted; forcing minimum evidence"
        );
    } else if selection.threshold_used < config.min_similarity {
        warn!(
            from = config.min_similarity,
            to = selection.threshold_used,
            segment_count = selection.segments.len(),
            minimum_segments = config.minimum_segments,
            "lowered similarity threshold to reach minimum evidence"
        );
    } else {
        info!(
            segment_count = selection.segments.len(),
            threshold = selection.threshold_used,
            "hybrid retrieval complete"
        );
    }

    Ok(HybridOutcome {
        segments: selection.segments,
        threshold_used: selection.threshold_used,
        forced_fill: selection.forced_fill,
        lexical_candidate_count,
        backfilled_count,
    })
}

/// Tops up `candidates` with unseen paragraphs, in document order, until it
/// holds `minimum` entries or the document runs out. Returns how many were
/// added.
fn backfill_candidates<'p>(
    candidates: &mut Vec<&'p Paragraph>,
    paragraphs: &'p [Paragraph],
    minimum: usize,
) -> usize {
    let before = candidates.len();
    for paragraph in paragraphs {
        if candidates.len() >= minimum {
            break;
        }
        if candidates
            .iter()
            .all(|candidate| candidate.index != paragraph.index)
        {
            candidates.push(paragraph);
        }
    }
    let added = candidates.len() - before;
    debug!(added, "candidate backfill");
    added
}

#[cfg(test)]
mod tests;
