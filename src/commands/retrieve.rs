use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use citation_evidence::citation::{ContextRequest, extract_contexts};
use citation_evidence::config::RetrievalMode;
use citation_evidence::model::{CitationType, EvidenceBundle};
use citation_evidence::pipeline::EvidenceGatherer;
use citation_evidence::text::excerpt;

use crate::cli::RetrieveArgs;
use crate::commands::{build_embedder, load_settings};
use crate::util::{read_document, write_json_stdout};

#[derive(Debug, Serialize)]
struct RetrieveResponse {
    reference: String,
    mode: RetrievalMode,
    citation_type: CitationType,
    returned: usize,
    results: Vec<QueryEvidence>,
}

#[derive(Debug, Serialize)]
struct QueryEvidence {
    query: String,
    evidence: EvidenceBundle,
}

pub fn run(args: RetrieveArgs) -> Result<()> {
    let settings = load_settings(&args.retrieval)?;
    let citation_type = CitationType::from(args.retrieval.citation_type);
    let reference_xml = read_document(&args.reference)?;
    let queries = resolve_queries(&args)?;

    let embedder = build_embedder(&settings, &args.retrieval)?;
    let gatherer = EvidenceGatherer::new(embedder.as_ref(), settings);
    let indexed = gatherer.index_document(&reference_xml);
    info!(
        path = %args.reference.display(),
        paragraph_count = indexed.paragraphs().len(),
        query_count = queries.len(),
        mode = %gatherer.settings().mode,
        "reference indexed"
    );

    let mut results = Vec::with_capacity(queries.len());
    for query in queries {
        let evidence = gatherer
            .gather_indexed(&query, &indexed, citation_type)
            .with_context(|| {
                format!("evidence retrieval failed for query: {}", excerpt(&query, 80))
            })?;
        results.push(QueryEvidence { query, evidence });
    }

    let response = RetrieveResponse {
        reference: args.reference.display().to_string(),
        mode: gatherer.settings().mode,
        citation_type,
        returned: results.len(),
        results,
    };
    if args.json {
        return write_json_stdout(&response);
    }
    write_text_response(&response)
}

fn resolve_queries(args: &RetrieveArgs) -> Result<Vec<String>> {
    if let Some(query) = &args.query {
        return Ok(vec![query.clone()]);
    }

    let (Some(citing), Some(reference_key)) = (&args.citing, &args.reference_key) else {
        bail!("either --query or --citing with --reference-key is required");
    };
    let citing_xml = read_document(citing)?;
    let contexts = extract_contexts(
        &citing_xml,
        ContextRequest {
            source_document_id: "source",
            target_document_id: "target",
            reference_key,
        },
    );
    if contexts.is_empty() {
        warn!(reference_key = %reference_key, "no citation contexts found");
    }
    Ok(contexts
        .into_iter()
        .map(|context| context.context_text)
        .collect::<Vec<String>>())
}

fn write_text_response(response: &RetrieveResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(
        output,
        "Reference: {}\tmode={}\tcitation_type={}",
        response.reference, response.mode, response.citation_type
    )?;

    for result in &response.results {
        writeln!(output, "Query: {}", excerpt(&result.query, 200))?;
        let quality = &result.evidence.quality;
        writeln!(
            output,
            "Quality: score={:.3} confidence={} sections={} high_priority={} contradiction={:.1}",
            quality.quality_score,
            quality.confidence_level.as_str(),
            quality.section_diversity,
            quality.high_priority_segment_count,
            quality.contradiction_score,
        )?;
        for warning in &result.evidence.coverage_warnings {
            writeln!(output, "Warning: {warning}")?;
        }
        for (rank, segment) in result.evidence.segments.iter().enumerate() {
            writeln!(
                output,
                "{}.\t{}\tscore={:.4}\t{}\tparagraph={}",
                rank + 1,
                segment.section,
                segment.similarity_score,
                segment.retrieval_method,
                segment.paragraph_index,
            )?;
            writeln!(output, "\t{}", excerpt(&segment.text, 200))?;
        }
    }
    output.flush()?;
    Ok(())
}
