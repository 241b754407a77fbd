use super::*;
use crate::embedding::{Embedder, LocalHashEmbedder};
use crate::error::EmbeddingError;
use crate::fixtures::{
    FailingEmbedder, ScriptedEmbedder, at_cosine, jats_article, p, paragraph, sec,
};

fn scored<'a>(paragraphs: &'a [Paragraph], similarities: &[f64]) -> Vec<ScoredParagraph<'a>> {
    paragraphs
        .iter()
        .zip(similarities)
        .map(|(paragraph, similarity)| ScoredParagraph {
            paragraph,
            similarity: *similarity,
        })
        .collect::<Vec<ScoredParagraph<'a>>>()
}

fn four_paragraphs() -> Vec<Paragraph> {
    vec![
        paragraph(0, "Introduction", "first paragraph"),
        paragraph(1, "Methods", "second paragraph"),
        paragraph(2, "Results", "third paragraph"),
        paragraph(3, "Discussion", "fourth paragraph"),
    ]
}

#[test]
fn threshold_schedule_starts_at_caller_minimum() {
    assert_eq!(
        threshold_schedule(0.7),
        vec![0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1, 0.0]
    );
    assert_eq!(threshold_schedule(0.6), vec![0.6, 0.5, 0.4, 0.3, 0.2, 0.1, 0.0]);
    assert_eq!(threshold_schedule(0.45), vec![0.45, 0.4, 0.3, 0.2, 0.1, 0.0]);
    assert_eq!(threshold_schedule(0.0), vec![0.0]);
}

#[test]
fn ladder_stops_at_first_threshold_meeting_minimum() {
    let paragraphs = four_paragraphs();
    let ranked = scored(&paragraphs, &[0.65, 0.55, 0.45, 0.2]);

    let selection = select_with_threshold_ladder(&ranked, 0.7, 5, 3, RetrievalMethod::Hybrid, 500);
    assert_eq!(selection.threshold_used, 0.4);
    assert!(!selection.forced_fill);
    assert_eq!(selection.segments.len(), 3);
    assert!(selection.segments.iter().all(|segment| segment.similarity_score >= 0.4));
}

#[test]
fn ladder_keeps_caller_threshold_when_already_satisfied() {
    let paragraphs = four_paragraphs();
    let ranked = scored(&paragraphs, &[0.95, 0.9, 0.8, 0.75]);

    let selection = select_with_threshold_ladder(&ranked, 0.7, 5, 3, RetrievalMethod::Hybrid, 500);
    assert_eq!(selection.threshold_used, 0.7);
    assert_eq!(selection.segments.len(), 4);
}

#[test]
fn ladder_forces_fill_with_negative_similarities() {
    let paragraphs = four_paragraphs();
    let ranked = scored(&paragraphs, &[0.1, -0.2, -0.5, -0.6]);

    let selection = select_with_threshold_ladder(&ranked, 0.7, 5, 3, RetrievalMethod::Hybrid, 500);
    assert!(selection.forced_fill);
    let scores = selection
        .segments
        .iter()
        .map(|segment| segment.similarity_score)
        .collect::<Vec<f64>>();
    assert_eq!(scores, vec![0.1, -0.2, -0.5]);
}

fn retriever(embedder: &dyn Embedder, config: HybridConfig) -> HybridRetriever<'_> {
    HybridRetriever::new(
        SemanticRanker::new(embedder, 500),
        DocumentSegmenter::default(),
        Bm25Params::default(),
        config,
    )
}

fn scripted_corpus() -> (ScriptedEmbedder, Vec<Paragraph>) {
    let texts = [
        "protocol alpha was applied to every sample",
        "protocol beta replaced the earlier approach",
        "protocol gamma is discussed at length here",
        "no shared vocabulary appears in this one",
    ];
    let embedder = ScriptedEmbedder::new(at_cosine(0.05))
        .with("protocol alpha", vec![1.0, 0.0])
        .with("sample", vec![1.0, 0.0])
        .with(texts[0], at_cosine(0.9))
        .with(texts[1], at_cosine(0.35))
        .with(texts[2], at_cosine(0.62));
    let paragraphs = texts
        .iter()
        .enumerate()
        .map(|(index, text)| paragraph(index, "Results", text))
        .collect::<Vec<Paragraph>>();
    (embedder, paragraphs)
}

#[test]
fn retrieve_relaxes_threshold_and_tags_hybrid() {
    let (embedder, paragraphs) = scripted_corpus();
    let hybrid = retriever(&embedder, HybridConfig::default());

    let outcome = hybrid
        .retrieve_from_paragraphs("protocol alpha", &paragraphs)
        .expect("scripted retrieval");
    assert_eq!(outcome.lexical_candidate_count, 3);
    assert_eq!(outcome.backfilled_count, 0);
    assert_eq!(outcome.threshold_used, 0.3);
    let indexes = outcome
        .segments
        .iter()
        .map(|segment| segment.paragraph_index)
        .collect::<Vec<usize>>();
    assert_eq!(indexes, vec![0, 2, 1]);
    assert!(
        outcome
            .segments
            .iter()
            .all(|segment| segment.retrieval_method == RetrievalMethod::Hybrid)
    );
}

#[test]
fn retrieve_backfills_when_lexical_stage_is_short() {
    let (embedder, paragraphs) = scripted_corpus();
    let hybrid = retriever(&embedder, HybridConfig::default());

    let outcome = hybrid
        .retrieve_from_paragraphs("sample", &paragraphs)
        .expect("scripted retrieval");
    assert_eq!(outcome.lexical_candidate_count, 1);
    assert_eq!(outcome.backfilled_count, 2);
    assert_eq!(outcome.threshold_used, 0.3);
    let indexes = outcome
        .segments
        .iter()
        .map(|segment| segment.paragraph_index)
        .collect::<Vec<usize>>();
    assert_eq!(indexes, vec![0, 2, 1]);
}

#[test]
fn retrieve_returns_at_least_minimum_even_when_final_top_k_is_smaller() {
    let (embedder, paragraphs) = scripted_corpus();
    let config = HybridConfig {
        final_top_k: 1,
        min_similarity: 0.0,
        ..HybridConfig::default()
    };
    let hybrid = retriever(&embedder, config);

    let segments = hybrid
        .retrieve_from_paragraphs("protocol alpha", &paragraphs)
        .expect("scripted retrieval")
        .segments;
    assert_eq!(segments.len(), 3);
}

#[test]
fn retrieve_with_empty_query_returns_nothing() {
    let (embedder, paragraphs) = scripted_corpus();
    let hybrid = retriever(&embedder, HybridConfig::default());

    let outcome = hybrid
        .retrieve_from_paragraphs("   ", &paragraphs)
        .expect("empty query");
    assert!(outcome.segments.is_empty());
    assert_eq!(embedder.calls(), 0);
}

#[test]
fn retrieve_over_empty_document_returns_nothing() {
    let (embedder, _) = scripted_corpus();
    let hybrid = retriever(&embedder, HybridConfig::default());

    let segments = hybrid
        .retrieve("protocol alpha", "<article><body>")
        .expect("malformed document is not an error");
    assert!(segments.is_empty());
}

#[test]
fn retrieve_propagates_embedding_failures() {
    let (_, paragraphs) = scripted_corpus();
    let hybrid = retriever(&FailingEmbedder, HybridConfig::default());

    let err = hybrid
        .retrieve_from_paragraphs("protocol alpha", &paragraphs)
        .expect_err("embedding failure must surface");
    assert!(matches!(
        err,
        RetrievalError::Embedding(EmbeddingError::Backend(_))
    ));
}

#[test]
fn batch_retrieve_is_deterministic_across_pairs() {
    let embedder = LocalHashEmbedder::default();
    let hybrid = retriever(&embedder, HybridConfig::default());
    let body = [
        sec(
            Some("Methods"),
            &p("Cells were cultured in standard medium before imaging experiments began."),
        ),
        sec(
            Some("Results"),
            &p("Imaging revealed rapid calcium transients in the cultured neuron population."),
        ),
        sec(
            Some("Discussion"),
            &p("Calcium transients may reflect spontaneous network activity during development."),
        ),
    ]
    .concat();
    let xml = jats_article(&[], &body);
    let query = "calcium imaging of cultured neurons";

    let results = hybrid
        .batch_retrieve(&[(query, xml.as_str()), (query, xml.as_str())])
        .expect("local embedder");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0], results[1]);
    assert!(results[0].len() >= 3);
    assert!(
        results[0]
            .windows(2)
            .all(|pair| pair[0].similarity_score >= pair[1].similarity_score)
    );
}
