use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static WORD_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));
static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("valid regex"));

const QUERY_STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "this", "that", "these",
    "those", "it", "its", "they", "their", "them", "we", "our", "us",
];

pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Lowercased alphanumeric runs, used for indexed paragraphs.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_RUN
        .find_iter(&lowered)
        .map(|token| token.as_str().to_string())
        .collect::<Vec<String>>()
}

/// Paragraph tokenization minus stop words and tokens of two characters or fewer.
pub fn tokenize_query(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|token| token.chars().count() > 2)
        .filter(|token| QUERY_STOPWORDS.iter().all(|stopword| stopword != token))
        .collect::<Vec<String>>()
}

/// Splits on `.`, `!` or `?` followed by whitespace. Whitespace is collapsed
/// first, so the returned sentences never contain newlines.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    let mut sentences = Vec::<String>::new();
    let mut start = 0usize;

    for boundary in SENTENCE_BOUNDARY.find_iter(&normalized) {
        let end = boundary.start() + 1;
        push_sentence(&mut sentences, &normalized[start..end]);
        start = boundary.end();
    }
    push_sentence(&mut sentences, &normalized[start..]);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

pub fn lowercase_word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect::<HashSet<String>>()
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
