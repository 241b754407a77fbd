use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::embedding::{DEFAULT_MODEL_ID, SemanticModelConfig, resolve_model_config};
use crate::hybrid::HybridConfig;
use crate::lexical::Bm25Params;
use crate::model::DEFAULT_EXCERPT_CHARS;
use crate::reweight::{SectionPriorityConfig, TypeAwareConfig};
use crate::segmenter::SegmenterConfig;

/// Which retrieval strategy produces the evidence segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrievalMode {
    Lexical,
    Semantic,
    #[default]
    Hybrid,
    Enhanced,
    TypeAware,
}

impl RetrievalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
            Self::Enhanced => "enhanced",
            Self::TypeAware => "type-aware",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "lexical" => Ok(Self::Lexical),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            "enhanced" => Ok(Self::Enhanced),
            "type-aware" => Ok(Self::TypeAware),
            other => Err(format!("unknown retrieval mode: {other}")),
        }
    }
}

/// Every tunable of the retrieval core. Missing JSON fields take their
/// defaults, so a settings file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub mode: RetrievalMode,
    pub model_id: String,
    pub excerpt_chars: usize,
    pub segmenter: SegmenterConfig,
    pub bm25: Bm25Params,
    pub hybrid: HybridConfig,
    pub type_aware: TypeAwareConfig,
    pub section_priority: SectionPriorityConfig,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::default(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            segmenter: SegmenterConfig::default(),
            bm25: Bm25Params::default(),
            hybrid: HybridConfig::default(),
            type_aware: TypeAwareConfig::default(),
            section_priority: SectionPriorityConfig::default(),
        }
    }
}

impl RetrievalSettings {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn model_config(&self) -> SemanticModelConfig {
        resolve_model_config(&self.model_id)
    }

    /// Human-readable problems with the settings; empty when usable.
    pub fn validation_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.excerpt_chars == 0 {
            issues.push("excerpt_chars must be positive".to_string());
        }
        if self.hybrid.bm25_top_n == 0 {
            issues.push("hybrid.bm25_top_n must be positive".to_string());
        }
        if !(-1.0..=1.0).contains(&self.hybrid.min_similarity) {
            issues.push(format!(
                "hybrid.min_similarity {} is outside [-1, 1]",
                self.hybrid.min_similarity
            ));
        }
        if self.type_aware.candidate_multiplier == 0 {
            issues.push("type_aware.candidate_multiplier must be positive".to_string());
        }
        if self.bm25.k1 < 0.0 || !(0.0..=1.0).contains(&self.bm25.b) {
            issues.push("bm25 requires k1 >= 0 and b in [0, 1]".to_string());
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let settings = RetrievalSettings::from_json_str(
            r#"{"mode": "type-aware", "hybrid": {"min_similarity": 0.6}, "segmenter": {"index_abstract": true}}"#,
        )
        .expect("valid settings");
        assert_eq!(settings.mode, RetrievalMode::TypeAware);
        assert_eq!(settings.hybrid.min_similarity, 0.6);
        assert_eq!(settings.hybrid.bm25_top_n, 20);
        assert_eq!(settings.hybrid.minimum_segments, 3);
        assert!(settings.segmenter.index_abstract);
        assert_eq!(settings.segmenter.min_paragraph_chars, 50);
        assert_eq!(settings.type_aware.top_n, 15);
        assert_eq!(settings.section_priority.bm25_top_n, 30);
        assert_eq!(settings.excerpt_chars, 500);
        assert_eq!(settings.model_id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn empty_object_is_the_default() {
        let settings = RetrievalSettings::from_json_str("{}").expect("empty settings");
        assert_eq!(settings, RetrievalSettings::default());
        assert!(settings.validation_issues().is_empty());
    }

    #[test]
    fn retrieval_mode_parses_both_spellings() {
        assert_eq!("type_aware".parse::<RetrievalMode>(), Ok(RetrievalMode::TypeAware));
        assert_eq!("Enhanced".parse::<RetrievalMode>(), Ok(RetrievalMode::Enhanced));
        assert!("fusion".parse::<RetrievalMode>().is_err());
    }

    #[test]
    fn validation_flags_unusable_values() {
        let mut settings = RetrievalSettings::default();
        settings.excerpt_chars = 0;
        settings.hybrid.min_similarity = 1.5;
        assert_eq!(settings.validation_issues().len(), 2);
    }
}
