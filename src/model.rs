use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::text::excerpt;

/// One qualifying text block of a document body, labeled with its section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    pub section: String,
    pub section_title: Option<String>,
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentedDocument {
    pub abstract_text: String,
    pub paragraphs: Vec<Paragraph>,
}

impl SegmentedDocument {
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }
}

/// Default bound on `EvidenceSegment::text`, in characters.
pub const DEFAULT_EXCERPT_CHARS: usize = 500;

/// Four-sentence window around one occurrence of a citation anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationContext {
    pub instance_id: u32,
    pub source_document_id: String,
    pub target_document_id: String,
    pub reference_key: String,
    pub section: String,
    pub in_text_citation: String,
    pub before_2: String,
    pub before_1: String,
    pub citation_sentence: String,
    pub after_1: String,
    pub context_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CitationType {
    Methodological,
    Conceptual,
    Background,
    Attribution,
    Unknown,
}

impl CitationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Methodological => "METHODOLOGICAL",
            Self::Conceptual => "CONCEPTUAL",
            Self::Background => "BACKGROUND",
            Self::Attribution => "ATTRIBUTION",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parses a caller hint; anything unrecognized degrades to `Unknown`.
    pub fn from_hint(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Unknown)
    }
}

impl FromStr for CitationType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "METHODOLOGICAL" => Ok(Self::Methodological),
            "CONCEPTUAL" => Ok(Self::Conceptual),
            "BACKGROUND" => Ok(Self::Background),
            "ATTRIBUTION" => Ok(Self::Attribution),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(format!("unknown citation type: {other}")),
        }
    }
}

impl fmt::Display for CitationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an evidence segment was scored. Serialized as its string tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RetrievalMethod {
    Lexical,
    Semantic,
    Hybrid,
    HybridEnhanced,
    TypeAware(CitationType),
}

impl RetrievalMethod {
    pub fn tag(self) -> String {
        match self {
            Self::Lexical => "lexical".to_string(),
            Self::Semantic => "semantic".to_string(),
            Self::Hybrid => "hybrid".to_string(),
            Self::HybridEnhanced => "hybrid_enhanced".to_string(),
            Self::TypeAware(citation_type) => {
                format!("type_aware_{}", citation_type.as_str().to_ascii_lowercase())
            }
        }
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl From<RetrievalMethod> for String {
    fn from(method: RetrievalMethod) -> Self {
        method.tag()
    }
}

impl TryFrom<String> for RetrievalMethod {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.as_str() {
            "lexical" => Ok(Self::Lexical),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            "hybrid_enhanced" => Ok(Self::HybridEnhanced),
            other => other
                .strip_prefix("type_aware_")
                .and_then(|value| value.parse::<CitationType>().ok())
                .map(Self::TypeAware)
                .ok_or_else(|| format!("unknown retrieval method: {other}")),
        }
    }
}

/// One ranked candidate passage. `similarity_score` is final and may exceed
/// 1.0 after section reweighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSegment {
    pub section: String,
    pub section_title: Option<String>,
    pub text: String,
    pub full_paragraph_text: Option<String>,
    pub similarity_score: f64,
    pub retrieval_method: RetrievalMethod,
    pub paragraph_index: usize,
}

impl EvidenceSegment {
    /// Builds a segment whose `text` is the first `excerpt_chars` characters of
    /// the paragraph. The full text is kept only when the excerpt is shorter.
    pub fn from_paragraph(
        paragraph: &Paragraph,
        similarity_score: f64,
        retrieval_method: RetrievalMethod,
        excerpt_chars: usize,
    ) -> Self {
        let text = excerpt(&paragraph.text, excerpt_chars);
        let full_paragraph_text =
            (text.len() < paragraph.text.len()).then(|| paragraph.text.clone());
        Self {
            section: paragraph.section.clone(),
            section_title: paragraph.section_title.clone(),
            text,
            full_paragraph_text,
            similarity_score,
            retrieval_method,
            paragraph_index: paragraph.index,
        }
    }

    /// Full paragraph text, whether or not the excerpt was cut.
    pub fn full_text(&self) -> &str {
        self.full_paragraph_text.as_deref().unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "VERY_LOW",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub average_similarity: f64,
    pub min_similarity: f64,
    pub max_similarity: f64,
    pub section_diversity: usize,
    pub high_priority_segment_count: usize,
    pub contradiction_score: f64,
    pub quality_score: f64,
    pub confidence_level: ConfidenceLevel,
}

impl QualityReport {
    pub fn empty() -> Self {
        Self {
            average_similarity: 0.0,
            min_similarity: 0.0,
            max_similarity: 0.0,
            section_diversity: 0,
            high_priority_segment_count: 0,
            contradiction_score: 0.0,
            quality_score: 0.0,
            confidence_level: ConfidenceLevel::VeryLow,
        }
    }
}

/// What the downstream reasoner receives for one (citation, reference) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub reference_abstract: String,
    pub segments: Vec<EvidenceSegment>,
    pub quality: QualityReport,
    pub coverage_warnings: Vec<String>,
}
