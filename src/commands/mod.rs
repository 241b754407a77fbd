pub mod contexts;
pub mod qualify;
pub mod retrieve;
pub mod segment;

use std::fs;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use citation_evidence::config::RetrievalSettings;
use citation_evidence::embedding::{Embedder, LocalHashEmbedder};
use citation_evidence::embedding_cache::CachedEmbedder;

use crate::cli::RetrievalArgs;

/// Settings file (if any), then per-flag overrides.
pub(crate) fn load_settings(args: &RetrievalArgs) -> Result<RetrievalSettings> {
    let mut settings = match &args.settings {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            RetrievalSettings::from_json_str(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => RetrievalSettings::default(),
    };

    if let Some(mode) = args.mode {
        settings.mode = mode.into();
    }
    if let Some(min_similarity) = args.min_similarity {
        settings.hybrid.min_similarity = min_similarity;
        settings.type_aware.min_similarity = min_similarity;
        settings.section_priority.min_similarity = min_similarity;
    }
    if let Some(bm25_top_n) = args.bm25_top_n {
        settings.hybrid.bm25_top_n = bm25_top_n;
        settings.section_priority.bm25_top_n = bm25_top_n;
    }
    if let Some(final_top_k) = args.final_top_k {
        settings.hybrid.final_top_k = final_top_k;
    }
    if let Some(minimum_segments) = args.minimum_segments {
        settings.hybrid.minimum_segments = minimum_segments;
    }
    if let Some(top_n) = args.top_n {
        settings.type_aware.top_n = top_n;
        settings.section_priority.top_n = top_n;
    }
    if let Some(model_id) = &args.model_id {
        settings.model_id = model_id.clone();
    }

    let issues = settings.validation_issues();
    if !issues.is_empty() {
        bail!("invalid retrieval settings: {}", issues.join("; "));
    }
    Ok(settings)
}

/// Local embedder for the configured model, optionally behind the SQLite
/// vector cache.
pub(crate) fn build_embedder(
    settings: &RetrievalSettings,
    args: &RetrievalArgs,
) -> Result<Box<dyn Embedder>> {
    let model = settings.model_config();
    info!(
        model_id = %model.model_id,
        model_name = %model.model_name,
        dimensions = model.dimensions,
        backend = %model.backend,
        "embedding model resolved"
    );
    let local = LocalHashEmbedder::new(&model);

    let Some(cache_path) = &args.embedding_cache else {
        return Ok(Box::new(local));
    };
    let cached = CachedEmbedder::open(cache_path, local)
        .with_context(|| format!("failed to open embedding cache {}", cache_path.display()))?;
    match cached.cached_count() {
        Ok(count) => info!(path = %cache_path.display(), cached = count, "embedding cache opened"),
        Err(err) => warn!(error = %err, "could not count cached embeddings"),
    }
    Ok(Box::new(cached))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use citation_evidence::config::RetrievalMode;

    use super::*;
    use crate::cli::{CitationTypeArg, ModeArg};

    fn args() -> RetrievalArgs {
        RetrievalArgs {
            settings: None,
            mode: None,
            citation_type: CitationTypeArg::Unknown,
            min_similarity: None,
            bm25_top_n: None,
            final_top_k: None,
            minimum_segments: None,
            top_n: None,
            model_id: None,
            embedding_cache: None,
        }
    }

    #[test]
    fn flags_override_settings_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp settings");
        writeln!(file, r#"{{"mode": "enhanced", "hybrid": {{"final_top_k": 8, "min_similarity": 0.65}}}}"#)
            .expect("write settings");

        let mut retrieval = args();
        retrieval.settings = Some(file.path().to_path_buf());
        retrieval.mode = Some(ModeArg::TypeAware);
        retrieval.top_n = Some(9);

        let settings = load_settings(&retrieval).expect("settings load");
        assert_eq!(settings.mode, RetrievalMode::TypeAware);
        assert_eq!(settings.hybrid.final_top_k, 8);
        assert_eq!(settings.hybrid.min_similarity, 0.65);
        assert_eq!(settings.type_aware.top_n, 9);
        assert_eq!(settings.section_priority.top_n, 9);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let mut retrieval = args();
        retrieval.min_similarity = Some(2.0);
        let err = load_settings(&retrieval).expect_err("out of range threshold");
        assert!(err.to_string().contains("min_similarity"));
    }

    #[test]
    fn embedding_cache_flag_wraps_the_local_embedder() {
        let directory = tempfile::tempdir().expect("temp dir");
        let mut retrieval = args();
        retrieval.embedding_cache = Some(directory.path().join("embeddings.sqlite"));
        let settings = load_settings(&retrieval).expect("defaults");

        let embedder = build_embedder(&settings, &retrieval).expect("cache opens");
        assert_eq!(embedder.dimensions(), 384);
        let first = embedder.embed("cached text").expect("embed");
        let second = embedder.embed("cached text").expect("embed again");
        assert_eq!(first, second);
    }
}
