use super::*;
use crate::fixtures::{jats_article, sec};

fn request(reference_key: &str) -> ContextRequest<'_> {
    ContextRequest {
        source_document_id: "84538",
        target_document_id: "10.7554/eLife.00001",
        reference_key,
    }
}

fn sentences(values: &[&str]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<String>>()
}

#[test]
fn build_window_at_document_start_leaves_preceding_slots_empty() {
    let sentences = sentences(&[
        "Cited work shows X.",
        "This extends prior findings.",
        "More text.",
    ]);

    let window = build_window(&sentences, 0);
    assert_eq!(window.before_2, "");
    assert_eq!(window.before_1, "");
    assert_eq!(window.citation_sentence, "Cited work shows X.");
    assert_eq!(window.after_1, "This extends prior findings.");
    assert_eq!(
        window.context_text(),
        "Cited work shows X. This extends prior findings."
    );
}

#[test]
fn build_window_at_paragraph_end_leaves_following_slot_empty() {
    let sentences = sentences(&["One.", "Two.", "Three.", "Four."]);
    let window = build_window(&sentences, 3);
    assert_eq!(window.before_2, "Two.");
    assert_eq!(window.before_1, "Three.");
    assert_eq!(window.citation_sentence, "Four.");
    assert_eq!(window.after_1, "");
}

#[test]
fn locate_citation_sentence_falls_back_to_word_subset() {
    let sentences = sentences(&[
        "Earlier work exists.",
        "As reported by Smith and colleagues et al 2020 the effect holds.",
    ]);
    assert_eq!(locate_citation_sentence(&sentences, "Smith et al"), Some(1));
    assert_eq!(locate_citation_sentence(&sentences, "Jones"), None);
    assert_eq!(locate_citation_sentence(&sentences, "   "), None);
}

#[test]
fn extract_contexts_numbers_each_occurrence_in_document_order() {
    let body = [
        sec(
            Some("Introduction"),
            "<p>Background sentence here. Circuits were mapped before <xref ref-type=\"bibr\" rid=\"bib1\">Smith, 2020</xref>. Later work disagreed.</p>",
        ),
        sec(
            Some("Materials and methods"),
            "<p>We followed the protocol of <xref ref-type=\"bibr\" rid=\"bib1\">Smith, 2020</xref>. Samples were frozen.</p>",
        ),
    ]
    .concat();
    let xml = jats_article(&[], &body);

    let contexts = extract_contexts(&xml, request("bib1"));
    assert_eq!(contexts.len(), 2);

    assert_eq!(contexts[0].instance_id, 1);
    assert_eq!(contexts[0].section, "Introduction");
    assert_eq!(contexts[0].before_1, "Background sentence here.");
    assert_eq!(
        contexts[0].citation_sentence,
        "Circuits were mapped before Smith, 2020."
    );
    assert_eq!(contexts[0].after_1, "Later work disagreed.");
    assert_eq!(contexts[0].in_text_citation, "Smith, 2020");

    assert_eq!(contexts[1].instance_id, 2);
    assert_eq!(contexts[1].section, "Methods");
    assert_eq!(contexts[1].target_document_id, "10.7554/eLife.00001");
    assert_eq!(
        contexts[1].context_text,
        "We followed the protocol of Smith, 2020. Samples were frozen."
    );
}

#[test]
fn extract_contexts_with_counter_continues_numbering() {
    let body = sec(
        None,
        "<p>Only one citation <xref rid=\"bib1\">Lee, 2019</xref> appears here.</p>",
    );
    let xml = jats_article(&[], &body);

    let mut next_instance_id = 5;
    let contexts = extract_contexts_with_counter(&xml, request("bib1"), &mut next_instance_id);
    assert_eq!(contexts[0].instance_id, 5);
    assert_eq!(contexts[0].section, "Unknown Section");
    assert_eq!(next_instance_id, 6);
}

#[test]
fn extract_contexts_matches_multi_key_anchors_and_ignores_other_ref_types() {
    let body = sec(
        Some("Results"),
        "<p>Two groups agree <xref ref-type=\"bibr\" rid=\"bib2 bib1\">Lee, 2019; Smith, 2020</xref>. \
         See <xref ref-type=\"fig\" rid=\"bib1\">Figure 1</xref> for data.</p>",
    );
    let xml = jats_article(&[], &body);

    let contexts = extract_contexts(&xml, request("bib1"));
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].in_text_citation, "Lee, 2019; Smith, 2020");
}

#[test]
fn extract_contexts_skips_anchor_outside_paragraph_and_keeps_others() {
    let body = sec(
        Some("Discussion"),
        "<table-wrap><xref rid=\"bib1\">Smith</xref></table-wrap>\
         <p>Our result matches <xref rid=\"bib1\">Smith</xref>. Done.</p>",
    );
    let xml = jats_article(&[], &body);

    let contexts = extract_contexts(&xml, request("bib1"));
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].instance_id, 1);
    assert_eq!(contexts[0].section, "Discussion");
}

#[test]
fn extract_contexts_returns_empty_for_malformed_xml() {
    assert!(extract_contexts("<article><p>", request("bib1")).is_empty());
}

#[test]
fn cited_reference_keys_counts_in_first_occurrence_order() {
    let body = sec(
        None,
        "<p>A <xref rid=\"bib3\">x</xref> B <xref rid=\"bib1 bib3\">y</xref> \
         C <xref ref-type=\"fig\" rid=\"fig1\">z</xref>.</p>",
    );
    let xml = jats_article(&[], &body);

    let references = cited_reference_keys(&xml);
    assert_eq!(
        references,
        vec![
            CitedReference {
                reference_key: "bib3".to_string(),
                occurrences: 2,
            },
            CitedReference {
                reference_key: "bib1".to_string(),
                occurrences: 1,
            },
        ]
    );
}
