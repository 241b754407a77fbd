use roxmltree::Node;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::jats::{element_text, is_element, parse_document, section_title};
use crate::model::CitationContext;
use crate::sections::{UNKNOWN_SECTION, categorize_section};
use crate::text::{lowercase_word_set, split_sentences};

/// Which citation to extract and how to label the resulting contexts.
#[derive(Debug, Clone, Copy)]
pub struct ContextRequest<'a> {
    pub source_document_id: &'a str,
    pub target_document_id: &'a str,
    pub reference_key: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentenceWindow {
    pub before_2: String,
    pub before_1: String,
    pub citation_sentence: String,
    pub after_1: String,
}

impl SentenceWindow {
    pub fn context_text(&self) -> String {
        [
            self.before_2.as_str(),
            self.before_1.as_str(),
            self.citation_sentence.as_str(),
            self.after_1.as_str(),
        ]
        .into_iter()
        .filter(|slot| !slot.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedReference {
    pub reference_key: String,
    pub occurrences: usize,
}

/// Extracts one context per resolvable anchor, numbering from 1.
pub fn extract_contexts(xml: &str, request: ContextRequest<'_>) -> Vec<CitationContext> {
    let mut next_instance_id = 1_u32;
    extract_contexts_with_counter(xml, request, &mut next_instance_id)
}

/// Same as [`extract_contexts`] but continues a caller-owned counter, so
/// numbering can run across several extraction calls.
pub fn extract_contexts_with_counter(
    xml: &str,
    request: ContextRequest<'_>,
    next_instance_id: &mut u32,
) -> Vec<CitationContext> {
    let document = match parse_document(xml) {
        Ok(document) => document,
        Err(err) => {
            error!(
                error = %err,
                source_document_id = request.source_document_id,
                "citing document parse failed; returning no contexts"
            );
            return Vec::new();
        }
    };

    let mut contexts = Vec::<CitationContext>::new();
    let mut unresolved_count = 0usize;

    let anchors = document
        .descendants()
        .filter(|node| is_bibliography_anchor(*node))
        .filter(|node| anchor_keys(*node).any(|key| key == request.reference_key));

    for anchor in anchors {
        let Some(window) = resolve_anchor(anchor) else {
            unresolved_count += 1;
            warn!(
                reference_key = request.reference_key,
                source_document_id = request.source_document_id,
                anchor_text = %element_text(anchor),
                "citation anchor could not be matched to a sentence; skipping occurrence"
            );
            continue;
        };

        let context_text = window.window.context_text();
        contexts.push(CitationContext {
            instance_id: *next_instance_id,
            source_document_id: request.source_document_id.to_string(),
            target_document_id: request.target_document_id.to_string(),
            reference_key: request.reference_key.to_string(),
            section: window.section,
            in_text_citation: window.anchor_text,
            before_2: window.window.before_2,
            before_1: window.window.before_1,
            citation_sentence: window.window.citation_sentence,
            after_1: window.window.after_1,
            context_text,
        });
        *next_instance_id += 1;
    }

    debug!(
        reference_key = request.reference_key,
        context_count = contexts.len(),
        unresolved_count,
        "citation contexts extracted"
    );
    contexts
}

struct ResolvedAnchor {
    anchor_text: String,
    section: String,
    window: SentenceWindow,
}

fn resolve_anchor(anchor: Node<'_, '_>) -> Option<ResolvedAnchor> {
    let anchor_text = element_text(anchor);
    if anchor_text.is_empty() {
        return None;
    }

    let paragraph = anchor.ancestors().find(|node| is_element(*node, "p"))?;
    let sentences = split_sentences(&element_text(paragraph));
    let sentence_index = locate_citation_sentence(&sentences, &anchor_text)?;

    Some(ResolvedAnchor {
        anchor_text,
        section: enclosing_section_label(anchor),
        window: build_window(&sentences, sentence_index),
    })
}

fn is_bibliography_anchor(node: Node<'_, '_>) -> bool {
    is_element(node, "xref")
        && node
            .attribute("ref-type")
            .is_none_or(|ref_type| ref_type == "bibr")
}

fn anchor_keys<'a>(node: Node<'a, '_>) -> impl Iterator<Item = &'a str> {
    node.attribute("rid").unwrap_or_default().split_whitespace()
}

fn enclosing_section_label(node: Node<'_, '_>) -> String {
    node.ancestors()
        .filter(|ancestor| is_element(*ancestor, "sec"))
        .find_map(section_title)
        .map(|title| categorize_section(&title))
        .unwrap_or_else(|| UNKNOWN_SECTION.to_string())
}

/// Index of the sentence holding the anchor: exact substring first, then a
/// word-set subset test for anchors whose markup splits their text.
pub fn locate_citation_sentence(sentences: &[String], anchor_text: &str) -> Option<usize> {
    if anchor_text.trim().is_empty() {
        return None;
    }

    if let Some(index) = sentences
        .iter()
        .position(|sentence| sentence.contains(anchor_text))
    {
        return Some(index);
    }

    let anchor_words = lowercase_word_set(anchor_text);
    sentences
        .iter()
        .position(|sentence| anchor_words.is_subset(&lowercase_word_set(sentence)))
}

/// Sentences at offsets -2, -1, 0 and +1 around `index`; positions outside
/// the paragraph are empty.
pub fn build_window(sentences: &[String], index: usize) -> SentenceWindow {
    let slot = |offset: isize| -> String {
        index
            .checked_add_signed(offset)
            .and_then(|position| sentences.get(position))
            .cloned()
            .unwrap_or_default()
    };

    SentenceWindow {
        before_2: slot(-2),
        before_1: slot(-1),
        citation_sentence: slot(0),
        after_1: slot(1),
    }
}

/// Distinct bibliography keys cited in document order, with anchor counts.
pub fn cited_reference_keys(xml: &str) -> Vec<CitedReference> {
    let document = match parse_document(xml) {
        Ok(document) => document,
        Err(err) => {
            error!(error = %err, "citing document parse failed; returning no references");
            return Vec::new();
        }
    };

    let mut references = Vec::<CitedReference>::new();
    for anchor in document
        .descendants()
        .filter(|node| is_bibliography_anchor(*node))
    {
        for key in anchor_keys(anchor) {
            match references
                .iter_mut()
                .find(|reference| reference.reference_key == key)
            {
                Some(reference) => reference.occurrences += 1,
                None => references.push(CitedReference {
                    reference_key: key.to_string(),
                    occurrences: 1,
                }),
            }
        }
    }
    references
}

#[cfg(test)]
mod tests;
