use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use citation_evidence::config::RetrievalMode;
use citation_evidence::model::CitationType;

#[derive(Parser, Debug)]
#[command(
    name = "citation-evidence",
    version,
    about = "Citation context extraction and evidence retrieval over JATS articles"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Segment(SegmentArgs),
    Contexts(ContextsArgs),
    Retrieve(RetrieveArgs),
    Qualify(QualifyArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SegmentArgs {
    #[arg(long)]
    pub document: PathBuf,

    #[arg(long)]
    pub min_paragraph_chars: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub index_abstract: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ContextsArgs {
    #[arg(long)]
    pub citing: PathBuf,

    #[arg(long)]
    pub reference_key: Option<String>,

    #[arg(long, default_value = "source")]
    pub source_id: String,

    #[arg(long, default_value = "target")]
    pub target_id: String,

    /// List the bibliography keys cited in the document instead.
    #[arg(long, default_value_t = false)]
    pub list_keys: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModeArg {
    Lexical,
    Semantic,
    Hybrid,
    Enhanced,
    TypeAware,
}

impl From<ModeArg> for RetrievalMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Lexical => Self::Lexical,
            ModeArg::Semantic => Self::Semantic,
            ModeArg::Hybrid => Self::Hybrid,
            ModeArg::Enhanced => Self::Enhanced,
            ModeArg::TypeAware => Self::TypeAware,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CitationTypeArg {
    Methodological,
    Conceptual,
    Background,
    Attribution,
    Unknown,
}

impl From<CitationTypeArg> for CitationType {
    fn from(citation_type: CitationTypeArg) -> Self {
        match citation_type {
            CitationTypeArg::Methodological => Self::Methodological,
            CitationTypeArg::Conceptual => Self::Conceptual,
            CitationTypeArg::Background => Self::Background,
            CitationTypeArg::Attribution => Self::Attribution,
            CitationTypeArg::Unknown => Self::Unknown,
        }
    }
}

/// Retrieval knobs shared by `retrieve` and `qualify`. Unset flags fall back
/// to the settings file, then to built-in defaults.
#[derive(Args, Debug, Clone)]
pub struct RetrievalArgs {
    #[arg(long)]
    pub settings: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    #[arg(long, value_enum, default_value_t = CitationTypeArg::Unknown)]
    pub citation_type: CitationTypeArg,

    #[arg(long)]
    pub min_similarity: Option<f64>,

    #[arg(long)]
    pub bm25_top_n: Option<usize>,

    #[arg(long)]
    pub final_top_k: Option<usize>,

    #[arg(long)]
    pub minimum_segments: Option<usize>,

    /// Result count for the type-aware and enhanced modes.
    #[arg(long)]
    pub top_n: Option<usize>,

    #[arg(long)]
    pub model_id: Option<String>,

    /// SQLite file for persisting embeddings between runs.
    #[arg(long)]
    pub embedding_cache: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RetrieveArgs {
    #[arg(long)]
    pub reference: PathBuf,

    #[arg(long, conflicts_with = "citing")]
    pub query: Option<String>,

    #[arg(long, requires = "reference_key")]
    pub citing: Option<PathBuf>,

    #[arg(long)]
    pub reference_key: Option<String>,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct QualifyArgs {
    #[arg(long)]
    pub citing: PathBuf,

    #[arg(long)]
    pub reference: PathBuf,

    #[arg(long)]
    pub reference_key: String,

    #[arg(long, default_value = "source")]
    pub source_id: String,

    #[arg(long, default_value = "target")]
    pub target_id: String,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    #[arg(long)]
    pub output: Option<PathBuf>,
}
