//! Section label normalization.
//!
//! Article templates name their sections freely ("Materials and methods",
//! "Genotyping and imputation", "Results and discussion"). Titles are mapped to
//! a closed set of labels by an ordered keyword table; the first rule with a
//! keyword contained in the lowercased title wins, and unmatched titles pass
//! through verbatim.

pub const METHODS: &str = "Methods";
pub const RESULTS: &str = "Results";
pub const DISCUSSION: &str = "Discussion";
pub const INTRODUCTION: &str = "Introduction";
pub const ABSTRACT: &str = "Abstract";
/// Label for paragraphs outside any titled section.
pub const UNKNOWN: &str = "Unknown";
/// Label for citation anchors outside any titled section.
pub const UNKNOWN_SECTION: &str = "Unknown Section";

struct SectionRule {
    label: &'static str,
    keywords: &'static [&'static str],
}

const SECTION_RULES: &[SectionRule] = &[
    SectionRule {
        label: METHODS,
        keywords: &[
            "method",
            "material",
            "experimental",
            "procedure",
            "genotyp",
            "imputation",
            "sequencing",
            "quantification",
            "assay",
            "collection",
            "analysis",
            "metric",
            "protocol",
        ],
    },
    SectionRule {
        label: RESULTS,
        keywords: &["result", "finding", "association"],
    },
    SectionRule {
        label: DISCUSSION,
        keywords: &["discussion", "conclusion"],
    },
    SectionRule {
        label: INTRODUCTION,
        keywords: &["introduction", "background"],
    },
];

/// Maps a raw section title onto a normalized label.
pub fn categorize_section(title: &str) -> String {
    let lowered = title.to_lowercase();
    SECTION_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|keyword| lowered.contains(keyword)))
        .map(|rule| rule.label.to_string())
        .unwrap_or_else(|| title.to_string())
}

const SECTION_ALIASES: &[&[&str]] = &[
    &[
        "Methods",
        "Materials and methods",
        "Materials and Methods",
        "Experimental procedures",
        "Materials & Methods",
    ],
    &["Results", "Results and discussion", "Results and Discussion"],
    &["Discussion", "Results and discussion", "Results and Discussion"],
    &["Introduction", "Background"],
    &["Conclusions", "Conclusion", "Concluding remarks"],
];

/// Collapses known alias spellings onto their canonical (first) name,
/// case-insensitively. Unknown names are returned as given.
pub fn canonical_section_alias(section: &str) -> String {
    let lowered = section.to_lowercase();
    SECTION_ALIASES
        .iter()
        .find(|aliases| aliases.iter().any(|alias| alias.to_lowercase() == lowered))
        .map(|aliases| aliases[0].to_string())
        .unwrap_or_else(|| section.to_string())
}

pub fn is_high_priority_section(section: &str) -> bool {
    matches!(section, "Methods" | "Results" | "Materials and Methods")
}
