//! Small helpers over `roxmltree` for JATS article markup.

use roxmltree::{Document, Node, ParsingOptions};

use crate::error::DocumentError;
use crate::text::normalize_whitespace;

/// Parses article XML. JATS files routinely carry a DOCTYPE, so DTDs are
/// allowed (external subsets are never fetched).
pub fn parse_document(xml: &str) -> Result<Document<'_>, DocumentError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(xml, options).map_err(|err| DocumentError::Parse(err.to_string()))
}

pub fn is_element(node: Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

pub fn first_descendant<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.descendants().find(|candidate| is_element(*candidate, name))
}

pub fn direct_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| is_element(*child, name))
}

/// Concatenated descendant text, in document order, without normalization.
pub fn raw_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|descendant| descendant.is_text())
        .filter_map(|descendant| descendant.text())
        .collect::<String>()
}

/// Descendant text with whitespace runs collapsed to single spaces.
pub fn element_text(node: Node<'_, '_>) -> String {
    normalize_whitespace(&raw_text(node))
}

/// Text of a section's own `<title>` child, if present and non-empty.
pub fn section_title(sec: Node<'_, '_>) -> Option<String> {
    direct_child(sec, "title")
        .map(element_text)
        .filter(|title| !title.is_empty())
}
