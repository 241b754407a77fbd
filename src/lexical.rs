use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use bm25::{Embedder, EmbedderBuilder, Scorer, Tokenizer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RetrievalError;
use crate::model::{EvidenceSegment, Paragraph, RetrievalMethod};
use crate::text::{tokenize, tokenize_query};

/// Okapi BM25 term-frequency saturation (`k1`) and length normalization (`b`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Lowercased alphanumeric runs. Queries are filtered with
/// [`tokenize_query`] before they reach the embedder, and the filtered
/// tokens re-tokenize to themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParagraphTokenizer;

impl Tokenizer for ParagraphTokenizer {
    fn tokenize(&self, input_text: &str) -> Vec<String> {
        tokenize(input_text)
    }
}

struct Bm25Index {
    paragraphs: Vec<Paragraph>,
    average_length: f32,
    embedder: Embedder<u32, ParagraphTokenizer>,
    scorer: Scorer<usize, u32>,
}

impl fmt::Debug for Bm25Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bm25Index")
            .field("paragraph_count", &self.paragraphs.len())
            .field("average_length", &self.average_length)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LexicalHit<'a> {
    pub paragraph: &'a Paragraph,
    pub score: f64,
}

/// BM25 ranking over one document's paragraphs. The index owns a copy of the
/// paragraphs so hits can borrow from it.
#[derive(Debug, Clone, Default)]
pub struct LexicalRanker {
    params: Bm25Params,
    index: Option<Arc<Bm25Index>>,
}

impl LexicalRanker {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            index: None,
        }
    }

    /// Builds (or rebuilds) the index and returns the number of paragraphs
    /// indexed. An empty build is valid and makes every search return nothing.
    pub fn build_index(&mut self, paragraphs: &[Paragraph]) -> usize {
        let token_total = paragraphs
            .iter()
            .map(|paragraph| tokenize(&paragraph.text).len())
            .sum::<usize>();
        let average_length = if paragraphs.is_empty() || token_total == 0 {
            1.0
        } else {
            token_total as f32 / paragraphs.len() as f32
        };

        let embedder = EmbedderBuilder::<u32, ParagraphTokenizer>::with_avgdl(average_length)
        .tokenizer(ParagraphTokenizer)
        .k1(self.params.k1 as f32)
        .b(self.params.b as f32)
        .build();

        let mut scorer = Scorer::<usize, u32>::new();
        for (position, paragraph) in paragraphs.iter().enumerate() {
            scorer.upsert(&position, embedder.embed(&paragraph.text));
        }

        if paragraphs.is_empty() {
            warn!("no paragraphs to index; lexical search will return nothing");
        } else {
            info!(
                paragraph_count = paragraphs.len(),
                average_length,
                "built lexical index"
            );
        }

        self.index = Some(Arc::new(Bm25Index {
            paragraphs: paragraphs.to_vec(),
            average_length,
            embedder,
            scorer,
        }));
        paragraphs.len()
    }

    pub fn is_built(&self) -> bool {
        self.index.is_some()
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        self.index
            .as_deref()
            .map(|index| index.paragraphs.as_slice())
            .unwrap_or_default()
    }

    /// Top `top_n` paragraphs by BM25 score, highest first with ties in
    /// document order. Paragraphs scoring zero are never returned.
    pub fn search(&self, query: &str, top_n: usize) -> Result<Vec<LexicalHit<'_>>, RetrievalError> {
        let index = self.index.as_deref().ok_or(RetrievalError::IndexNotBuilt)?;

        let query_tokens = tokenize_query(query);
        if query_tokens.is_empty() {
            warn!("query is empty after tokenization");
            return Ok(Vec::new());
        }

        let query_embedding = index.embedder.embed(&query_tokens.join(" "));
        let mut ranked = (0..index.paragraphs.len())
            .map(|position| {
                let score = index
                    .scorer
                    .score(&position, &query_embedding)
                    .map(f64::from)
                    .unwrap_or(0.0);
                (position, score)
            })
            .collect::<Vec<(usize, f64)>>();
        ranked.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
        ranked.truncate(top_n);

        let hits = ranked
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(position, score)| LexicalHit {
                paragraph: &index.paragraphs[position],
                score,
            })
            .collect::<Vec<LexicalHit<'_>>>();

        debug!(
            query_token_count = query_tokens.len(),
            hit_count = hits.len(),
            top_n,
            "lexical search complete"
        );
        Ok(hits)
    }
}

/// Lexical-only segments, with the BM25 score standing in for similarity.
pub fn lexical_segments(hits: &[LexicalHit<'_>], excerpt_chars: usize) -> Vec<EvidenceSegment> {
    hits.iter()
        .map(|hit| {
            EvidenceSegment::from_paragraph(
                hit.paragraph,
                hit.score,
                RetrievalMethod::Lexical,
                excerpt_chars,
            )
        })
        .collect::<Vec<EvidenceSegment>>()
}
