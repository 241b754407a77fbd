use std::io::{self, Write};

use anyhow::{Result, bail};
use tracing::info;

use citation_evidence::citation::{ContextRequest, cited_reference_keys, extract_contexts};

use crate::cli::ContextsArgs;
use crate::util::{read_document, write_json_stdout};

pub fn run(args: ContextsArgs) -> Result<()> {
    let xml = read_document(&args.citing)?;

    if args.list_keys {
        let references = cited_reference_keys(&xml);
        info!(reference_count = references.len(), "cited references listed");
        if args.json {
            return write_json_stdout(&references);
        }
        let mut output = io::BufWriter::new(io::stdout().lock());
        for reference in &references {
            writeln!(output, "{}\t{}", reference.reference_key, reference.occurrences)?;
        }
        output.flush()?;
        return Ok(());
    }

    let Some(reference_key) = args.reference_key.as_deref() else {
        bail!("--reference-key is required unless --list-keys is given");
    };
    let contexts = extract_contexts(
        &xml,
        ContextRequest {
            source_document_id: &args.source_id,
            target_document_id: &args.target_id,
            reference_key,
        },
    );
    info!(
        reference_key,
        context_count = contexts.len(),
        "citation contexts extracted"
    );

    if args.json {
        return write_json_stdout(&contexts);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    for context in &contexts {
        writeln!(
            output,
            "#{}\t{}\t{}",
            context.instance_id, context.section, context.in_text_citation
        )?;
        writeln!(output, "\t{}", context.context_text)?;
    }
    output.flush()?;
    Ok(())
}
