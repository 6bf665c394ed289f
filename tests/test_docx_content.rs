//! Tests for the emitted OOXML content fragment.

use quick_xml::events::Event;
use quick_xml::Reader;
use reflow_oxide::{Document, ReflowConfig};

fn reflow(input: &str, config: &ReflowConfig) -> String {
    let mut doc = Document::from_intermediate(input, config).expect("parse failed");
    doc.join();
    doc.to_docx_content(config)
}

fn span_block(text: &str, x: f32, y: f32) -> String {
    let mut block =
        String::from("<span ctm=\"1 0 0 1 0 0\" trm=\"10 0 0 10 0 0\" font_name=\"Times-Roman\" wmode=\"0\">\n");
    for (i, c) in text.chars().enumerate() {
        block.push_str(&format!(
            "<char x=\"{}\" y=\"{}\" adv=\"0.5\" ucs=\"{}\"/>\n",
            x + i as f32 * 5.0,
            y,
            c as u32
        ));
    }
    block.push_str("</span>\n");
    block
}

/// A single-glyph span under an arbitrary CTM.
fn rotated_span_block(ctm: &str, ucs: u32) -> String {
    format!(
        "<span ctm=\"{}\" trm=\"10 0 0 10 0 0\" font_name=\"Times-Roman\" wmode=\"0\">\n\
         <char x=\"0\" y=\"0\" adv=\"0.5\" ucs=\"{}\"/>\n</span>\n",
        ctm, ucs
    )
}

/// Walk the fragment with an XML reader, checking well-formedness and
/// that every text node's entities decode.
fn assert_well_formed(fragment: &str) {
    let wrapped = format!("<root>{}</root>", fragment);
    let mut reader = Reader::from_str(&wrapped);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Text(e)) => {
                e.unescape().expect("undecodable entity in text node");
            }
            Ok(_) => {}
            Err(e) => panic!("emitted fragment is not well formed: {}", e),
        }
    }
}

#[test]
fn test_fragment_is_well_formed() {
    let input = format!(
        "<page>\n{}{}</page>\n",
        span_block("Hello <&> 'quoted' \"text\"-", 0.0, 0.0),
        span_block("caf\u{e9} na\u{ef}ve", 0.0, 12.0)
    );
    let content = reflow(&input, &ReflowConfig::new());
    assert_well_formed(&content);
}

#[test]
fn test_rotated_fragment_is_well_formed() {
    let input = format!(
        "<page>\n{}{}</page>\n",
        span_block("plain", 0.0, 0.0),
        rotated_span_block("0 1 1 0 100 200", 'R' as u32)
    );
    let content = reflow(&input, &ReflowConfig::new().with_rotation(true));
    assert_well_formed(&content);
}

#[test]
fn test_rotated_paragraph_emits_drawing() {
    // One paragraph at the identity, one rotated a quarter turn. The
    // rotated one is wrapped in an anchored text box at 90 * 60000.
    let input = format!(
        "<page>\n{}{}</page>\n",
        span_block("plain", 0.0, 0.0),
        rotated_span_block("0 1 1 0 100 200", 'R' as u32)
    );
    let content = reflow(&input, &ReflowConfig::new().with_rotation(true));

    assert!(content.contains("<w:drawing>"));
    assert!(content.contains("rot=\"5400000\""));
    assert!(content.contains(">plain</w:t>"));
    assert!(content.contains(">R</w:t>"));
}

#[test]
fn test_rotated_box_offsets_in_emu() {
    let input = format!(
        "<page>\n{}</page>\n",
        rotated_span_block("0 1 1 0 100 200", 'R' as u32)
    );
    let content = reflow(&input, &ReflowConfig::new().with_rotation(true));

    // The glyph advance (5pt along the rotated baseline) gives the box
    // extent: 5pt = 63500 EMU. A single line has no perpendicular
    // extent.
    assert!(content.contains("<wp:extent cx=\"63500\" cy=\"0\"/>"));
    // Anchor (100pt, 200pt) in EMU, corrected for centre rotation by
    // half the box width.
    assert!(content.contains("<wp:posOffset>1238250</wp:posOffset>"));
    assert!(content.contains("<wp:posOffset>2571750</wp:posOffset>"));
}

#[test]
fn test_rotated_box_has_vml_fallback() {
    let input = format!(
        "<page>\n{}</page>\n",
        rotated_span_block("0 1 1 0 100 200", 'R' as u32)
    );
    let content = reflow(&input, &ReflowConfig::new().with_rotation(true));

    assert!(content.contains("<mc:Choice Requires=\"wps\">"));
    assert!(content.contains("<mc:Fallback>"));
    assert!(content.contains("<v:textbox>"));
    // The body is emitted twice: once per representation.
    assert_eq!(content.matches(">R</w:t>").count(), 2);
}

#[test]
fn test_rotation_off_flattens_rotated_text() {
    let input = format!(
        "<page>\n{}</page>\n",
        rotated_span_block("0 1 1 0 100 200", 'R' as u32)
    );
    let content = reflow(&input, &ReflowConfig::new());
    assert!(!content.contains("<w:drawing>"));
    assert!(content.contains(">R</w:t>"));
}

#[test]
fn test_spacing_adds_empty_paragraphs() {
    let input = format!(
        "<page>\n{}{}</page>\n",
        span_block("first", 0.0, 0.0),
        span_block("second", 0.0, 40.0)
    );
    let plain = reflow(&input, &ReflowConfig::new());
    let spaced = reflow(&input, &ReflowConfig::new().with_spacing(true));

    assert_eq!(plain.matches("<w:p>").count(), 2);
    // One extra empty paragraph before each body paragraph.
    assert_eq!(spaced.matches("<w:p>").count(), 4);
}

#[test]
fn test_run_styling_from_font_name() {
    let input = "<page>\n\
        <span ctm=\"1 0 0 1 0 0\" trm=\"10 0 0 10 0 0\" font_name=\"ABCDEF+Helvetica-Bold\" wmode=\"0\">\n\
        <char x=\"0\" y=\"0\" adv=\"0.5\" ucs=\"97\"/>\n\
        </span>\n</page>\n";
    let content = reflow(input, &ReflowConfig::new());

    assert!(content.contains("<w:rFonts w:ascii=\"Helvetica-Bold\" w:hAnsi=\"Helvetica-Bold\"/>"));
    assert!(content.contains("<w:b/>"));
    assert!(!content.contains("<w:i/>"));
}

#[test]
fn test_font_change_splits_runs() {
    let input = "<page>\n\
        <span ctm=\"1 0 0 1 0 0\" trm=\"10 0 0 10 0 0\" font_name=\"Times-Roman\" wmode=\"0\">\n\
        <char x=\"0\" y=\"0\" adv=\"0.5\" ucs=\"97\"/>\n\
        </span>\n\
        <span ctm=\"1 0 0 1 0 0\" trm=\"10 0 0 10 0 0\" font_name=\"Courier\" wmode=\"0\">\n\
        <char x=\"5\" y=\"0\" adv=\"0.5\" ucs=\"98\"/>\n\
        </span>\n</page>\n";
    let content = reflow(input, &ReflowConfig::new());

    assert_eq!(content.matches("<w:r>").count(), 2);
    assert!(content.contains("w:ascii=\"Times-Roman\""));
    assert!(content.contains("w:ascii=\"Courier\""));
}
