use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::{RetrievalMode, RetrievalSettings};
use crate::embedding::Embedder;
use crate::error::{EmbeddingError, RetrievalError};
use crate::hybrid::HybridRetriever;
use crate::lexical::{LexicalRanker, lexical_segments};
use crate::model::{
    CitationContext, CitationType, EvidenceBundle, EvidenceSegment, Paragraph, QualityReport,
};
use crate::quality::QualityAuditor;
use crate::reweight::{SectionPriorityRetriever, TypeAwareRetriever};
use crate::segmenter::DocumentSegmenter;
use crate::semantic::SemanticRanker;

/// SHA-256 of the raw document text, hex encoded.
pub fn document_fingerprint(xml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(xml.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A reference document segmented once and ready for repeated retrieval.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub fingerprint: String,
    pub abstract_text: String,
    pub lexical: LexicalRanker,
}

impl IndexedDocument {
    pub fn paragraphs(&self) -> &[Paragraph] {
        self.lexical.paragraphs()
    }
}

/// Caller-owned cache of indexed documents keyed by fingerprint. Entries are
/// immutable once built, so identical documents share one index.
#[derive(Debug, Default)]
pub struct DocumentIndexCache {
    entries: HashMap<String, IndexedDocument>,
    hits: usize,
}

impl DocumentIndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn get(&self, fingerprint: &str) -> Option<&IndexedDocument> {
        self.entries.get(fingerprint)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutput {
    pub segments: Vec<EvidenceSegment>,
    pub coverage_warnings: Vec<String>,
}

impl RetrievalOutput {
    fn segments_only(segments: Vec<EvidenceSegment>) -> Self {
        Self {
            segments,
            coverage_warnings: Vec::new(),
        }
    }
}

/// Runs the configured retrieval mode and the quality audit for one
/// (query, reference document) pair at a time.
pub struct EvidenceGatherer<'e> {
    settings: RetrievalSettings,
    hybrid: HybridRetriever<'e>,
}

impl<'e> EvidenceGatherer<'e> {
    pub fn new(embedder: &'e dyn Embedder, settings: RetrievalSettings) -> Self {
        let hybrid = HybridRetriever::new(
            SemanticRanker::new(embedder, settings.excerpt_chars),
            DocumentSegmenter::new(settings.segmenter.clone()),
            settings.bm25,
            settings.hybrid,
        );
        Self { settings, hybrid }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    pub fn hybrid(&self) -> &HybridRetriever<'e> {
        &self.hybrid
    }

    pub fn index_document(&self, reference_xml: &str) -> IndexedDocument {
        let fingerprint = document_fingerprint(reference_xml);
        let document = self.hybrid.segmenter().segment(reference_xml);
        let lexical = self.hybrid.build_lexical_index(&document.paragraphs);
        IndexedDocument {
            fingerprint,
            abstract_text: document.abstract_text,
            lexical,
        }
    }

    /// The cached index for `reference_xml`, building it on first use.
    pub fn cached_index<'c>(
        &self,
        reference_xml: &str,
        cache: &'c mut DocumentIndexCache,
    ) -> &'c IndexedDocument {
        let fingerprint = document_fingerprint(reference_xml);
        if cache.entries.contains_key(&fingerprint) {
            cache.hits += 1;
            debug!(fingerprint = %fingerprint, "document index cache hit");
        }
        cache
            .entries
            .entry(fingerprint)
            .or_insert_with(|| self.index_document(reference_xml))
    }

    pub fn retrieve(
        &self,
        query: &str,
        indexed: &IndexedDocument,
        citation_type: CitationType,
    ) -> Result<RetrievalOutput, RetrievalError> {
        if query.trim().is_empty() {
            warn!("empty query; returning no evidence");
            return Ok(RetrievalOutput::segments_only(Vec::new()));
        }

        let mode = self.settings.mode;
        debug!(mode = %mode, citation_type = %citation_type, "retrieving evidence");
        match mode {
            RetrievalMode::Lexical => {
                let hits = indexed
                    .lexical
                    .search(query, self.settings.hybrid.final_top_k)?;
                Ok(RetrievalOutput::segments_only(lexical_segments(
                    &hits,
                    self.settings.excerpt_chars,
                )))
            }
            RetrievalMode::Semantic => {
                let candidates = indexed.paragraphs().iter().collect::<Vec<&Paragraph>>();
                let segments = self.hybrid.semantic().retrieve_evidence(
                    query,
                    &candidates,
                    self.settings.hybrid.final_top_k,
                    self.settings.hybrid.min_similarity,
                )?;
                Ok(RetrievalOutput::segments_only(segments))
            }
            RetrievalMode::Hybrid => {
                let outcome = self.hybrid.retrieve_with_index(query, &indexed.lexical)?;
                Ok(RetrievalOutput::segments_only(outcome.segments))
            }
            RetrievalMode::Enhanced => {
                let retriever =
                    SectionPriorityRetriever::new(&self.hybrid, self.settings.section_priority);
                Ok(RetrievalOutput::segments_only(
                    retriever.retrieve_with_index(query, &indexed.lexical)?,
                ))
            }
            RetrievalMode::TypeAware => {
                let retriever = TypeAwareRetriever::new(&self.hybrid, self.settings.type_aware);
                let outcome =
                    retriever.retrieve_with_index(query, &indexed.lexical, citation_type)?;
                Ok(RetrievalOutput {
                    segments: outcome.segments,
                    coverage_warnings: outcome.coverage_warnings,
                })
            }
        }
    }

    pub fn audit(&self, segments: &[EvidenceSegment]) -> Result<QualityReport, EmbeddingError> {
        QualityAuditor::new(self.hybrid.semantic()).audit(segments)
    }

    pub fn gather_indexed(
        &self,
        query: &str,
        indexed: &IndexedDocument,
        citation_type: CitationType,
    ) -> Result<EvidenceBundle, RetrievalError> {
        let output = self.retrieve(query, indexed, citation_type)?;
        let quality = self.audit(&output.segments)?;
        Ok(EvidenceBundle {
            reference_abstract: indexed.abstract_text.clone(),
            segments: output.segments,
            quality,
            coverage_warnings: output.coverage_warnings,
        })
    }

    pub fn gather(
        &self,
        query: &str,
        reference_xml: &str,
        citation_type: CitationType,
    ) -> Result<EvidenceBundle, RetrievalError> {
        let indexed = self.index_document(reference_xml);
        self.gather_indexed(query, &indexed, citation_type)
    }

    /// One bundle per citation context, using each context's sentence window
    /// as the query. The reference document is indexed at most once.
    pub fn gather_for_contexts(
        &self,
        contexts: &[CitationContext],
        reference_xml: &str,
        citation_type: CitationType,
        cache: &mut DocumentIndexCache,
    ) -> Result<Vec<EvidenceBundle>, RetrievalError> {
        let indexed = self.cached_index(reference_xml, cache);
        let bundles = contexts
            .iter()
            .map(|context| self.gather_indexed(&context.context_text, indexed, citation_type))
            .collect::<Result<Vec<EvidenceBundle>, RetrievalError>>()?;
        info!(
            context_count = contexts.len(),
            paragraph_count = indexed.paragraphs().len(),
            mode = %self.settings.mode,
            "evidence gathered"
        );
        Ok(bundles)
    }
}
