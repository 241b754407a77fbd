use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use citation_evidence::model::Paragraph;
use citation_evidence::segmenter::{DocumentSegmenter, SegmenterConfig};
use citation_evidence::text::excerpt;

use crate::cli::SegmentArgs;
use crate::util::{read_document, write_json_stdout};

#[derive(Debug, Serialize)]
struct SegmentResponse<'a> {
    document: String,
    paragraph_count: usize,
    abstract_text: &'a str,
    paragraphs: &'a [Paragraph],
}

pub fn run(args: SegmentArgs) -> Result<()> {
    let xml = read_document(&args.document)?;

    let mut config = SegmenterConfig {
        index_abstract: args.index_abstract,
        ..SegmenterConfig::default()
    };
    if let Some(min_paragraph_chars) = args.min_paragraph_chars {
        config.min_paragraph_chars = min_paragraph_chars;
    }
    let document = DocumentSegmenter::new(config).segment(&xml);
    info!(
        path = %args.document.display(),
        paragraph_count = document.paragraphs.len(),
        abstract_chars = document.abstract_text.chars().count(),
        "document segmented"
    );

    if args.json {
        return write_json_stdout(&SegmentResponse {
            document: args.document.display().to_string(),
            paragraph_count: document.paragraphs.len(),
            abstract_text: &document.abstract_text,
            paragraphs: &document.paragraphs,
        });
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Abstract: {}", excerpt(&document.abstract_text, 200))?;
    writeln!(output, "Paragraphs: {}", document.paragraphs.len())?;
    for paragraph in &document.paragraphs {
        writeln!(
            output,
            "{}.\t{}\t{}",
            paragraph.index,
            paragraph.section,
            paragraph.section_title.as_deref().unwrap_or("(untitled)")
        )?;
        writeln!(output, "\t{}", excerpt(&paragraph.text, 160))?;
    }
    output.flush()?;
    Ok(())
}
