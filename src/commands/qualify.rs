use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use citation_evidence::citation::{ContextRequest, extract_contexts};
use citation_evidence::config::RetrievalSettings;
use citation_evidence::embedding::SemanticModelConfig;
use citation_evidence::model::{CitationContext, CitationType, EvidenceBundle};
use citation_evidence::pipeline::{DocumentIndexCache, EvidenceGatherer, document_fingerprint};

use crate::cli::QualifyArgs;
use crate::commands::{build_embedder, load_settings};
use crate::util::{
    now_utc_string, read_document, utc_compact_string, write_json_pretty, write_json_stdout,
};

#[derive(Debug, Serialize)]
struct QualifyManifest {
    manifest_version: u32,
    run_id: String,
    started_at: String,
    completed_at: String,
    citing_path: String,
    reference_path: String,
    reference_fingerprint: String,
    reference_key: String,
    citation_type: CitationType,
    model: SemanticModelConfig,
    settings: RetrievalSettings,
    context_count: usize,
    results: Vec<QualifiedContext>,
}

#[derive(Debug, Serialize)]
struct QualifiedContext {
    context: CitationContext,
    evidence: EvidenceBundle,
}

pub fn run(args: QualifyArgs) -> Result<()> {
    let started = Utc::now();
    let run_id = format!("qualify-{}", utc_compact_string(started));
    let started_at = now_utc_string();

    let settings = load_settings(&args.retrieval)?;
    let citation_type = CitationType::from(args.retrieval.citation_type);
    let citing_xml = read_document(&args.citing)?;
    let reference_xml = read_document(&args.reference)?;

    let contexts = extract_contexts(
        &citing_xml,
        ContextRequest {
            source_document_id: &args.source_id,
            target_document_id: &args.target_id,
            reference_key: &args.reference_key,
        },
    );
    if contexts.is_empty() {
        warn!(reference_key = %args.reference_key, "no citation contexts found in citing document");
    }

    let embedder = build_embedder(&settings, &args.retrieval)?;
    let model = settings.model_config();
    let gatherer = EvidenceGatherer::new(embedder.as_ref(), settings);
    let mut cache = DocumentIndexCache::new();
    let bundles = gatherer
        .gather_for_contexts(&contexts, &reference_xml, citation_type, &mut cache)
        .context("evidence gathering failed")?;

    let results = contexts
        .into_iter()
        .zip(bundles)
        .map(|(context, evidence)| QualifiedContext { context, evidence })
        .collect::<Vec<QualifiedContext>>();
    let low_confidence = results
        .iter()
        .filter(|result| result.evidence.quality.quality_score < 0.4)
        .count();

    let manifest = QualifyManifest {
        manifest_version: 1,
        run_id,
        started_at,
        completed_at: now_utc_string(),
        citing_path: args.citing.display().to_string(),
        reference_path: args.reference.display().to_string(),
        reference_fingerprint: document_fingerprint(&reference_xml),
        reference_key: args.reference_key.clone(),
        citation_type,
        model,
        settings: gatherer.settings().clone(),
        context_count: results.len(),
        results,
    };

    info!(
        run_id = %manifest.run_id,
        context_count = manifest.context_count,
        low_confidence,
        "qualification completed"
    );

    match &args.output {
        Some(path) => {
            write_json_pretty(path, &manifest)?;
            info!(path = %path.display(), "wrote qualification manifest");
            Ok(())
        }
        None => write_json_stdout(&manifest),
    }
}
