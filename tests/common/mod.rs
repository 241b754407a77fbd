//! Article builders shared by the integration tests.

pub const REFERENCE_KEY: &str = "bib7";

pub fn reference_article() -> String {
    let body = [
        section(
            "Introduction",
            &["Genome sequencing has become routine for population studies across many organisms."],
        ),
        section(
            "Materials and methods",
            &["We sequenced 40 samples using protocol P and aligned every read to the reference genome."],
        ),
        section(
            "Results",
            &[
                "Coverage exceeded thirty fold for most libraries after alignment and duplicate removal.",
                "Variant calls were concordant between technical replicates in every batch examined.",
            ],
        ),
        section(
            "Discussion",
            &["Our approach could be extended to larger cohorts with modest additional cost."],
        ),
        section(
            "Acknowledgements",
            &["We thank the core facility for technical support and many helpful conversations."],
        ),
    ]
    .concat();
    article(
        "<p>A reproducible sequencing workflow for large population cohorts.</p>",
        &body,
    )
}

pub fn citing_article() -> String {
    let paragraph = format!(
        "<p>Tissue was collected from each donor. Samples were sequenced using protocol P \
         (<xref ref-type=\"bibr\" rid=\"{REFERENCE_KEY}\">Lee et al., 2019</xref>). \
         Reads were then filtered for quality. Figure 2 shows the results \
         (<xref ref-type=\"fig\" rid=\"fig2\">Figure 2</xref>).</p>"
    );
    article(
        "<p>We revisit population sequencing with a new cohort design.</p>",
        &format!("<sec><title>Methods</title>{paragraph}</sec>"),
    )
}

fn section(title: &str, paragraphs: &[&str]) -> String {
    let inner = paragraphs
        .iter()
        .map(|text| format!("<p>{text}</p>"))
        .collect::<String>();
    format!("<sec><title>{title}</title>{inner}</sec>")
}

fn article(abstract_markup: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE article PUBLIC \"-//NLM//DTD JATS (Z39.96) Journal Archiving and Interchange DTD v1.2 20190208//EN\" \"JATS-archivearticle1.dtd\">\n\
         <article><front><article-meta><abstract>{abstract_markup}</abstract></article-meta></front>\
         <body>{body}</body><back><ref-list><ref id=\"{REFERENCE_KEY}\"/></ref-list></back></article>"
    )
}
