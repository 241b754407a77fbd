use super::*;
use crate::fixtures::{FailingEmbedder, ScriptedEmbedder, at_cosine, paragraph};

#[test]
fn cosine_similarity_handles_unnormalized_and_degenerate_vectors() {
    assert!((cosine_similarity(&[3.0, 0.0], &[5.0, 0.0]) - 1.0).abs() < 1e-12);
    assert!((cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-12);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[], &[]), 0.0);
}

#[test]
fn mean_pairwise_similarity_needs_two_vectors() {
    assert_eq!(mean_pairwise_similarity(&[vec![1.0, 0.0]]), None);
    let mean = mean_pairwise_similarity(&[vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]])
        .expect("three vectors");
    assert!((mean - 1.0 / 3.0).abs() < 1e-12);
}

fn scripted() -> ScriptedEmbedder {
    ScriptedEmbedder::new(vec![0.0, 1.0])
        .with("query", vec![1.0, 0.0])
        .with("strong match text", at_cosine(0.9))
        .with("medium match text", at_cosine(0.6))
        .with("another medium text", at_cosine(0.6))
}

#[test]
fn retrieve_evidence_sorts_filters_and_truncates() {
    let embedder = scripted();
    let ranker = SemanticRanker::new(&embedder, 500);
    let paragraphs = vec![
        paragraph(0, "Introduction", "unrelated text"),
        paragraph(1, "Results", "medium match text"),
        paragraph(2, "Methods", "strong match text"),
        paragraph(3, "Discussion", "another medium text"),
    ];
    let candidates = paragraphs.iter().collect::<Vec<&Paragraph>>();

    let segments = ranker
        .retrieve_evidence("query", &candidates, 2, 0.5)
        .expect("scripted embedder");
    let indexes = segments
        .iter()
        .map(|segment| segment.paragraph_index)
        .collect::<Vec<usize>>();
    // Ties keep candidate order: paragraph 1 precedes paragraph 3.
    assert_eq!(indexes, vec![2, 1]);
    assert!(segments.iter().all(|segment| segment.retrieval_method == RetrievalMethod::Semantic));

    let strict = ranker
        .retrieve_evidence("query", &candidates, 5, 0.95)
        .expect("scripted embedder");
    assert!(strict.is_empty());
}

#[test]
fn retrieve_evidence_is_repeatable() {
    let embedder = scripted();
    let ranker = SemanticRanker::new(&embedder, 500);
    let paragraphs = vec![
        paragraph(0, "Results", "medium match text"),
        paragraph(1, "Discussion", "another medium text"),
        paragraph(2, "Methods", "strong match text"),
    ];
    let candidates = paragraphs.iter().collect::<Vec<&Paragraph>>();

    let first = ranker.retrieve_evidence("query", &candidates, 3, 0.0).expect("first");
    let second = ranker.retrieve_evidence("query", &candidates, 3, 0.0).expect("second");
    assert_eq!(first, second);
}

#[test]
fn retrieve_evidence_on_empty_candidates_skips_embedding() {
    let embedder = scripted();
    let ranker = SemanticRanker::new(&embedder, 500);
    let segments = ranker.retrieve_evidence("query", &[], 3, 0.0).expect("empty");
    assert!(segments.is_empty());
    assert_eq!(embedder.calls(), 0);
}

#[test]
fn embedding_failures_propagate() {
    let ranker = SemanticRanker::new(&FailingEmbedder, 500);
    let paragraphs = vec![paragraph(0, "Results", "text")];
    let candidates = paragraphs.iter().collect::<Vec<&Paragraph>>();

    let err = ranker
        .retrieve_evidence("query", &candidates, 3, 0.0)
        .expect_err("backend failure must surface");
    assert!(matches!(err, EmbeddingError::Backend(_)));
}

#[test]
fn dimension_mismatch_is_reported() {
    let embedder = ScriptedEmbedder::new(vec![0.0, 1.0]).with("wide", vec![1.0, 0.0, 0.0]);
    let ranker = SemanticRanker::new(&embedder, 500);
    let err = ranker.embed("wide").expect_err("three dims from a two-dim embedder");
    assert!(matches!(
        err,
        EmbeddingError::DimensionMismatch {
            expected: 2,
            actual: 3
        }
    ));
}
