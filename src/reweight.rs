use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RetrievalError;
use crate::hybrid::{HybridConfig, HybridRetriever, retrieve_with_config};
use crate::lexical::LexicalRanker;
use crate::model::{CitationType, EvidenceSegment, RetrievalMethod};
use crate::sections::{DISCUSSION, METHODS, RESULTS, canonical_section_alias};

/// Weight applied to sections missing from a citation type's table.
pub const DEFAULT_SECTION_WEIGHT: f64 = 0.5;

const METHODOLOGICAL_WEIGHTS: &[(&str, f64)] = &[
    ("Materials and methods", 3.5),
    ("Materials and Methods", 3.5),
    ("Methods", 3.5),
    ("Experimental procedures", 3.5),
    ("Results", 2.0),
    ("Abstract", 1.5),
    ("Introduction", 0.3),
    ("Background", 0.3),
    ("Discussion", 0.3),
    ("Conclusions", 0.2),
    ("Conclusion", 0.2),
];

const CONCEPTUAL_WEIGHTS: &[(&str, f64)] = &[
    ("Results", 3.0),
    ("Discussion", 3.0),
    ("Abstract", 2.5),
    ("Conclusions", 2.0),
    ("Conclusion", 2.0),
    ("Introduction", 1.0),
    ("Background", 0.8),
    ("Methods", 0.4),
    ("Materials and methods", 0.4),
    ("Materials and Methods", 0.4),
    ("Experimental procedures", 0.4),
];

const BACKGROUND_WEIGHTS: &[(&str, f64)] = &[
    ("Abstract", 3.5),
    ("Introduction", 3.0),
    ("Background", 3.0),
    ("Discussion", 1.5),
    ("Conclusions", 1.2),
    ("Results", 0.5),
    ("Methods", 0.2),
    ("Materials and methods", 0.2),
    ("Materials and Methods", 0.2),
];

const ATTRIBUTION_WEIGHTS: &[(&str, f64)] = &[
    ("Abstract", 3.0),
    ("Results", 2.5),
    ("Introduction", 2.0),
    ("Discussion", 1.5),
    ("Methods", 1.0),
    ("Materials and methods", 1.0),
    ("Materials and Methods", 1.0),
    ("Conclusions", 1.5),
];

fn weight_table(citation_type: CitationType) -> Option<&'static [(&'static str, f64)]> {
    match citation_type {
        CitationType::Methodological => Some(METHODOLOGICAL_WEIGHTS),
        CitationType::Conceptual => Some(CONCEPTUAL_WEIGHTS),
        CitationType::Background => Some(BACKGROUND_WEIGHTS),
        CitationType::Attribution => Some(ATTRIBUTION_WEIGHTS),
        CitationType::Unknown => None,
    }
}

/// Weight for `section` under `citation_type`. Lookup order: exact name,
/// alias-normalized name, then case-insensitive containment in either
/// direction in table order. `Unknown` is neutral everywhere.
pub fn section_weight(citation_type: CitationType, section: &str) -> f64 {
    let Some(table) = weight_table(citation_type) else {
        return 1.0;
    };

    let exact = |name: &str| {
        table
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, weight)| *weight)
    };

    if let Some(weight) = exact(section) {
        return weight;
    }
    if let Some(weight) = exact(&canonical_section_alias(section)) {
        return weight;
    }

    let lowered = section.to_lowercase();
    if lowered.is_empty() {
        return DEFAULT_SECTION_WEIGHT;
    }
    table
        .iter()
        .find(|(key, _)| {
            let key = key.to_lowercase();
            lowered.contains(&key) || key.contains(&lowered)
        })
        .map(|(_, weight)| *weight)
        .unwrap_or(DEFAULT_SECTION_WEIGHT)
}

/// Multiplies each score by its section weight, re-sorts, truncates to
/// `top_n`, and retags. Scores are not renormalized and may exceed 1.0.
pub fn reweight_segments(
    segments: Vec<EvidenceSegment>,
    citation_type: CitationType,
    top_n: usize,
) -> Vec<EvidenceSegment> {
    let mut adjusted = segments
        .into_iter()
        .map(|mut segment| {
            let weight = section_weight(citation_type, &segment.section);
            let base = segment.similarity_score;
            segment.similarity_score = base * weight;
            segment.retrieval_method = RetrievalMethod::TypeAware(citation_type);
            if weight >= 2.5 {
                debug!(
                    section = %segment.section,
                    base,
                    adjusted = segment.similarity_score,
                    weight,
                    "boosted section"
                );
            } else if weight <= 0.5 {
                debug!(
                    section = %segment.section,
                    base,
                    adjusted = segment.similarity_score,
                    weight,
                    "downweighted section"
                );
            }
            segment
        })
        .collect::<Vec<EvidenceSegment>>();

    adjusted.sort_by(|left, right| {
        right
            .similarity_score
            .partial_cmp(&left.similarity_score)
            .unwrap_or(Ordering::Equal)
    });
    adjusted.truncate(top_n);
    adjusted
}

/// Shortfalls in the sections a citation type depends on.
pub fn coverage_warnings(segments: &[EvidenceSegment], citation_type: CitationType) -> Vec<String> {
    if segments.is_empty() {
        return Vec::new();
    }

    let counts = section_counts(segments);
    let count = |section: &str| counts.get(section).copied().unwrap_or(0);

    let mut warnings = Vec::<String>::new();
    match citation_type {
        CitationType::Methodological => {
            let methods = count(METHODS);
            if methods < 2 {
                warnings.push(format!(
                    "low Methods coverage for METHODOLOGICAL citation: {methods} segments (expected at least 2)"
                ));
            }
        }
        CitationType::Conceptual => {
            let results = count(RESULTS);
            let discussion = count(DISCUSSION);
            if results < 1 || discussion < 1 {
                warnings.push(format!(
                    "low Results/Discussion coverage for CONCEPTUAL citation: Results={results}, Discussion={discussion} (expected at least 1 each)"
                ));
            }
        }
        CitationType::Background | CitationType::Attribution | CitationType::Unknown => {}
    }

    for warning in &warnings {
        warn!(citation_type = %citation_type, "{warning}");
    }
    warnings
}

fn section_counts(segments: &[EvidenceSegment]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::<String, usize>::new();
    for segment in segments {
        *counts
            .entry(canonical_section_alias(&segment.section))
            .or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeAwareConfig {
    pub top_n: usize,
    pub min_similarity: f64,
    pub candidate_multiplier: usize,
    /// Fraction of `min_similarity` a candidate needs before weighting.
    pub candidate_threshold_factor: f64,
}

impl Default for TypeAwareConfig {
    fn default() -> Self {
        Self {
            top_n: 15,
            min_similarity: 0.5,
            candidate_multiplier: 3,
            candidate_threshold_factor: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAwareOutcome {
    pub segments: Vec<EvidenceSegment>,
    pub coverage_warnings: Vec<String>,
}

/// Hybrid retrieval over a wider candidate net, followed by section
/// reweighting keyed on the citation type.
pub struct TypeAwareRetriever<'r, 'e> {
    hybrid: &'r HybridRetriever<'e>,
    config: TypeAwareConfig,
}

impl<'r, 'e> TypeAwareRetriever<'r, 'e> {
    pub fn new(hybrid: &'r HybridRetriever<'e>, config: TypeAwareConfig) -> Self {
        Self { hybrid, config }
    }

    /// Hybrid settings for the wide net: both the lexical cut and the
    /// semantic top-k are raised to `candidate_multiplier * top_n`.
    pub fn candidate_config(&self) -> HybridConfig {
        let wide = self.config.top_n.saturating_mul(self.config.candidate_multiplier);
        HybridConfig {
            bm25_top_n: wide,
            final_top_k: wide,
            min_similarity: self.config.min_similarity * self.config.candidate_threshold_factor,
            minimum_segments: self.hybrid.config().minimum_segments,
        }
    }

    pub fn retrieve(
        &self,
        query: &str,
        reference_xml: &str,
        citation_type: CitationType,
    ) -> Result<TypeAwareOutcome, RetrievalError> {
        let document = self.hybrid.segmenter().segment(reference_xml);
        let lexical = self.hybrid.build_lexical_index(&document.paragraphs);
        self.retrieve_with_index(query, &lexical, citation_type)
    }

    pub fn retrieve_with_index(
        &self,
        query: &str,
        lexical: &LexicalRanker,
        citation_type: CitationType,
    ) -> Result<TypeAwareOutcome, RetrievalError> {
        info!(
            citation_type = %citation_type,
            top_n = self.config.top_n,
            min_similarity = self.config.min_similarity,
            "type-aware retrieval"
        );

        let candidates =
            retrieve_with_config(self.hybrid.semantic(), query, lexical, &self.candidate_config())?;
        let segments = reweight_segments(candidates.segments, citation_type, self.config.top_n);

        let distribution = section_counts(&segments);
        info!(
            segment_count = segments.len(),
            citation_type = %citation_type,
            sections = ?distribution,
            "type-aware retrieval complete"
        );

        let coverage_warnings = coverage_warnings(&segments, citation_type);
        Ok(TypeAwareOutcome {
            segments,
            coverage_warnings,
        })
    }
}

/// Static section priorities for the section-priority ranking.
const SECTION_PRIORITIES: &[(&str, f64)] = &[
    ("Methods", 0.40),
    ("Results", 0.40),
    ("Discussion", 0.15),
    ("Introduction", 0.05),
    ("Abstract", 0.00),
    ("Materials and Methods", 0.40),
    ("Results and Discussion", 0.35),
    ("Conclusion", 0.10),
    ("Background", 0.05),
];

pub const DEFAULT_SECTION_PRIORITY: f64 = 0.05;

/// Exact name first, then the first table key contained in the lowercased
/// section name.
pub fn section_priority(section: &str) -> f64 {
    if let Some((_, priority)) = SECTION_PRIORITIES.iter().find(|(key, _)| *key == section) {
        return *priority;
    }
    let lowered = section.to_lowercase();
    SECTION_PRIORITIES
        .iter()
        .find(|(key, _)| lowered.contains(&key.to_lowercase()))
        .map(|(_, priority)| *priority)
        .unwrap_or(DEFAULT_SECTION_PRIORITY)
}

/// 70% similarity, 30% section bonus.
pub fn priority_weighted_score(similarity: f64, section: &str) -> f64 {
    similarity * (0.7 + 0.3 * section_priority(section))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionPriorityConfig {
    pub bm25_top_n: usize,
    pub top_n: usize,
    pub min_similarity: f64,
}

impl Default for SectionPriorityConfig {
    fn default() -> Self {
        Self {
            bm25_top_n: 30,
            top_n: 15,
            min_similarity: 0.5,
        }
    }
}

/// Lexical filter, semantic threshold, then a static section-priority blend.
/// No threshold relaxation: an empty result means nothing cleared
/// `min_similarity`.
pub struct SectionPriorityRetriever<'r, 'e> {
    hybrid: &'r HybridRetriever<'e>,
    config: SectionPriorityConfig,
}

impl<'r, 'e> SectionPriorityRetriever<'r, 'e> {
    pub fn new(hybrid: &'r HybridRetriever<'e>, config: SectionPriorityConfig) -> Self {
        Self { hybrid, config }
    }

    pub fn retrieve(
        &self,
        query: &str,
        reference_xml: &str,
    ) -> Result<Vec<EvidenceSegment>, RetrievalError> {
        let document = self.hybrid.segmenter().segment(reference_xml);
        let lexical = self.hybrid.build_lexical_index(&document.paragraphs);
        self.retrieve_with_index(query, &lexical)
    }

    pub fn retrieve_with_index(
        &self,
        query: &str,
        lexical: &LexicalRanker,
    ) -> Result<Vec<EvidenceSegment>, RetrievalError> {
        if query.trim().is_empty() {
            warn!("empty query; returning no evidence");
            return Ok(Vec::new());
        }

        let hits = lexical.search(query, self.config.bm25_top_n)?;
        if hits.is_empty() {
            warn!("no lexical candidates for section-priority retrieval");
            return Ok(Vec::new());
        }

        let semantic = self.hybrid.semantic();
        let candidates = hits.iter().map(|hit| hit.paragraph).collect::<Vec<_>>();
        let ranked = semantic.rank_candidates(query, &candidates)?;

        let mut segments = ranked
            .iter()
            .filter(|scored| scored.similarity >= self.config.min_similarity)
            .map(|scored| {
                EvidenceSegment::from_paragraph(
                    scored.paragraph,
                    priority_weighted_score(scored.similarity, &scored.paragraph.section),
                    RetrievalMethod::HybridEnhanced,
                    semantic.excerpt_chars(),
                )
            })
            .collect::<Vec<EvidenceSegment>>();

        segments.sort_by(|left, right| {
            right
                .similarity_score
                .partial_cmp(&left.similarity_score)
                .unwrap_or(Ordering::Equal)
        });
        segments.truncate(self.config.top_n);

        info!(segment_count = segments.len(), "section-priority retrieval complete");
        Ok(segments)
    }
}
