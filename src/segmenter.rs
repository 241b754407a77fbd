use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::DocumentError;
use crate::jats::{element_text, first_descendant, is_element, parse_document, section_title};
use crate::model::{Paragraph, SegmentedDocument};
use crate::sections::{ABSTRACT, UNKNOWN, categorize_section};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Body paragraphs at or below this many characters are dropped as noise.
    pub min_paragraph_chars: usize,
    /// Abstract blocks at or below this many characters are dropped.
    pub min_abstract_chars: usize,
    /// Append abstract blocks to the indexed paragraphs with section "Abstract".
    pub index_abstract: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_paragraph_chars: 50,
            min_abstract_chars: 20,
            index_abstract: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentSegmenter {
    config: SegmenterConfig,
}

/// Section label in force for a subtree. Frames live in an arena and the
/// traversal stack refers to them by index.
struct SectionFrame {
    label: String,
    title: Option<String>,
}

impl DocumentSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Never fails: malformed XML or a missing body yields zero paragraphs,
    /// which callers treat as "no evidence available".
    pub fn segment(&self, xml: &str) -> SegmentedDocument {
        let document = match parse_document(xml) {
            Ok(document) => document,
            Err(err) => {
                error!(error = %err, "document parse failed; returning no paragraphs");
                return SegmentedDocument::default();
            }
        };

        let abstract_blocks = abstract_blocks(&document, self.config.min_abstract_chars);
        let abstract_text = abstract_blocks.join("\n\n");

        let mut paragraphs = match self.body_paragraphs(&document) {
            Ok(paragraphs) => paragraphs,
            Err(err) => {
                warn!(error = %err, "document body unavailable; returning no paragraphs");
                Vec::new()
            }
        };

        if self.config.index_abstract {
            for block in abstract_blocks {
                let index = paragraphs.len();
                paragraphs.push(Paragraph {
                    text: block,
                    section: ABSTRACT.to_string(),
                    section_title: Some(ABSTRACT.to_string()),
                    index,
                });
            }
        }

        debug!(
            paragraph_count = paragraphs.len(),
            abstract_chars = abstract_text.chars().count(),
            "document segmented"
        );

        SegmentedDocument {
            abstract_text,
            paragraphs,
        }
    }

    /// Depth-first walk of `<body>`, threading the enclosing section through
    /// an explicit stack. Outermost `<p>` elements become paragraphs; nested
    /// paragraphs are part of their parent's text.
    fn body_paragraphs(&self, document: &Document<'_>) -> Result<Vec<Paragraph>, DocumentError> {
        let body =
            first_descendant(document.root_element(), "body").ok_or(DocumentError::MissingBody)?;

        let mut frames = vec![SectionFrame {
            label: UNKNOWN.to_string(),
            title: None,
        }];
        let mut stack: Vec<(Node<'_, '_>, usize)> = children_in_reverse(body, 0);
        let mut paragraphs = Vec::<Paragraph>::new();

        while let Some((node, frame_index)) = stack.pop() {
            if !node.is_element() {
                continue;
            }

            if is_element(node, "sec") {
                let child_frame = match section_title(node) {
                    Some(title) => {
                        frames.push(SectionFrame {
                            label: categorize_section(&title),
                            title: Some(title),
                        });
                        frames.len() - 1
                    }
                    None => frame_index,
                };
                stack.extend(children_in_reverse(node, child_frame));
                continue;
            }

            if is_element(node, "p") {
                let text = element_text(node);
                if text.chars().count() > self.config.min_paragraph_chars {
                    let frame = &frames[frame_index];
                    paragraphs.push(Paragraph {
                        text,
                        section: frame.label.clone(),
                        section_title: frame.title.clone(),
                        index: paragraphs.len(),
                    });
                }
                continue;
            }

            if is_element(node, "title") {
                continue;
            }

            stack.extend(children_in_reverse(node, frame_index));
        }

        Ok(paragraphs)
    }
}

fn children_in_reverse<'a, 'input>(
    node: Node<'a, 'input>,
    frame_index: usize,
) -> Vec<(Node<'a, 'input>, usize)> {
    let mut children = node
        .children()
        .filter(|child| child.is_element())
        .map(|child| (child, frame_index))
        .collect::<Vec<_>>();
    children.reverse();
    children
}

/// Abstract paragraphs above the threshold; an abstract without `<p>` blocks
/// contributes its whole text as a single block.
fn abstract_blocks(document: &Document<'_>, min_chars: usize) -> Vec<String> {
    let Some(abstract_node) = first_descendant(document.root_element(), "abstract") else {
        debug!("document has no abstract");
        return Vec::new();
    };

    let paragraph_nodes = abstract_node
        .descendants()
        .filter(|node| is_element(*node, "p"))
        .collect::<Vec<_>>();

    if paragraph_nodes.is_empty() {
        let text = element_text(abstract_node);
        return if text.is_empty() { Vec::new() } else { vec![text] };
    }

    paragraph_nodes
        .into_iter()
        .map(element_text)
        .filter(|text| text.chars().count() > min_chars)
        .collect::<Vec<String>>()
}

/// Extracts only the abstract string, joined with blank lines.
pub fn extract_abstract(xml: &str, min_abstract_chars: usize) -> String {
    match parse_document(xml) {
        Ok(document) => abstract_blocks(&document, min_abstract_chars).join("\n\n"),
        Err(err) => {
            error!(error = %err, "abstract extraction failed");
            String::new()
        }
    }
}
