//! Builders shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embedding::Embedder;
use crate::error::EmbeddingError;
use crate::model::Paragraph;

pub(crate) fn jats_article(abstract_paragraphs: &[&str], body: &str) -> String {
    let abstract_markup = abstract_paragraphs
        .iter()
        .map(|text| format!("<p>{text}</p>"))
        .collect::<String>();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE article PUBLIC \"-//NLM//DTD JATS (Z39.96) Journal Archiving and Interchange DTD v1.2 20190208//EN\" \"JATS-archivearticle1.dtd\">\n\
         <article><front><article-meta><abstract>{abstract_markup}</abstract></article-meta></front>\
         <body>{body}</body><back><ref-list><ref id=\"bib1\"/></ref-list></back></article>"
    )
}

pub(crate) fn sec(title: Option<&str>, inner: &str) -> String {
    match title {
        Some(title) => format!("<sec><title>{title}</title>{inner}</sec>"),
        None => format!("<sec>{inner}</sec>"),
    }
}

pub(crate) fn p(text: &str) -> String {
    format!("<p>{text}</p>")
}

pub(crate) fn paragraph(index: usize, section: &str, text: &str) -> Paragraph {
    Paragraph {
        text: text.to_string(),
        section: section.to_string(),
        section_title: Some(section.to_string()),
        index,
    }
}

/// Returns a configured vector per exact text and a fallback otherwise.
pub(crate) struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
    calls: AtomicUsize,
}

impl ScriptedEmbedder {
    pub(crate) fn new(fallback: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for ScriptedEmbedder {
    fn model_id(&self) -> &str {
        "scripted"
    }

    fn dimensions(&self) -> usize {
        self.fallback.len()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

pub(crate) struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing"
    }

    fn dimensions(&self) -> usize {
        4
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Backend("model offline".to_string()))
    }
}

/// Unit vector in the plane whose cosine with `[1, 0]` is `cosine`.
pub(crate) fn at_cosine(cosine: f32) -> Vec<f32> {
    vec![cosine, (1.0 - cosine * cosine).max(0.0).sqrt()]
}
