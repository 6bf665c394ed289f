//! OOXML content emission.
//!
//! Serialises joined paragraphs into a fragment of `<w:p>` elements
//! suitable for substitution into a `word/document.xml` template. The
//! fragment is not a complete document; wrapping it into a container is
//! the caller's concern.
//!
//! Emission is run-oriented: consecutive glyphs sharing font name, size,
//! bold and italic flags share one `<w:r>` element. With rotation enabled,
//! consecutive paragraphs sharing a non-zero CTM rotation are grouped into
//! an anchored text box (`<w:drawing>`) with a VML fallback for legacy
//! readers.

use std::fmt::Write;

use crate::config::ReflowConfig;
use crate::document::{Document, Page, Paragraph, Span};
use crate::geometry::{Matrix, Point};

pub mod buffer;

pub use buffer::ContentBuffer;

/// 1 point = 12700 EMU (English Metric Units).
const POINT_TO_EMU: f32 = 12700.0;

/// Rotation angles are expressed in 1/60000 of a degree.
const DEGREE_SCALE: f32 = 60000.0;

/// Run state carried across paragraphs within one page.
#[derive(Debug, Default)]
struct RunState<'a> {
    font_name: Option<&'a str>,
    font_size: f32,
    bold: bool,
    italic: bool,
    ctm_prev: Option<Matrix>,
}

/// Emit the joined document as an OOXML content fragment.
pub fn to_docx_content(document: &Document, config: &ReflowConfig) -> String {
    let mut content = ContentBuffer::new();
    for page in &document.pages {
        if config.rotation {
            emit_page_rotation(page, config.spacing, &mut content);
        } else {
            emit_page_norotation(page, config.spacing, &mut content);
        }
    }
    content.into_string()
}

/// Emit one page, discarding any rotation.
fn emit_page_norotation(page: &Page, spacing: bool, content: &mut ContentBuffer) {
    let mut state = RunState::default();
    for paragraph in &page.paragraphs {
        emit_spacing(&state, &page.spans, paragraph, spacing, content);
        emit_paragraph(&mut state, &page.spans, paragraph, content);
    }
}

/// Emit one page, putting rotated text into anchored text boxes.
fn emit_page_rotation(page: &Page, spacing: bool, content: &mut ContentBuffer) {
    let mut state = RunState::default();
    let mut text_box_id = 0;
    let mut p = 0;
    while p < page.paragraphs.len() {
        let paragraph = &page.paragraphs[p];
        emit_spacing(&state, &page.spans, paragraph, spacing, content);

        let ctm = paragraph_ctm(&page.spans, paragraph);
        let rotate = ctm.b.atan2(ctm.a);
        if rotate != 0.0 {
            log::debug!(
                "rotate={:.2}rad={:.1}deg ctm: ef=({} {}) abcd=({} {} {} {})",
                rotate,
                rotate.to_degrees(),
                ctm.e,
                ctm.f,
                ctm.a,
                ctm.b,
                ctm.c,
                ctm.d
            );
            text_box_id += 1;
            p = emit_rotated_group(
                page,
                p,
                rotate,
                &ctm,
                text_box_id,
                &mut state,
                content,
            );
        } else {
            emit_paragraph(&mut state, &page.spans, paragraph, content);
            p += 1;
        }
    }
}

/// Empty spacing paragraphs, when enabled: one on a CTM change, plus one
/// unconditionally.
fn emit_spacing(
    state: &RunState<'_>,
    spans: &[Span],
    paragraph: &Paragraph,
    spacing: bool,
    content: &mut ContentBuffer,
) {
    if !spacing {
        return;
    }
    if let Some(ctm_prev) = &state.ctm_prev {
        // Extra vertical space between paragraphs that were at different
        // angles in the original document.
        if ctm_prev.cmp4(&paragraph_ctm(spans, paragraph)).is_ne() {
            emit_paragraph_empty(content);
        }
    }
    emit_paragraph_empty(content);
}

/// CTM of a paragraph's first span.
fn paragraph_ctm(spans: &[Span], paragraph: &Paragraph) -> Matrix {
    spans[paragraph.first_line().first_span()].ctm
}

/// Emit the group of consecutive paragraphs starting at `p0` that share
/// `rotate`, wrapped in an anchored, rotated text box. Returns the index
/// of the first paragraph past the group.
fn emit_rotated_group<'a>(
    page: &'a Page,
    p0: usize,
    rotate: f32,
    ctm: &Matrix,
    text_box_id: i32,
    state: &mut RunState<'a>,
    content: &mut ContentBuffer,
) -> usize {
    // Find the extent of the group in units before application of the
    // CTM, i.e. before rotation. The first glyph is assumed to sit at the
    // origin of the text block (left-to-right text).
    let origin_glyph = page.spans[page.paragraphs[p0].first_line().first_span()].first_glyph();
    let origin = Point::new(origin_glyph.x, origin_glyph.y);
    let inverse = ctm.invert_linear();

    let mut extent = Point::default();
    let mut p1 = page.paragraphs.len();
    for (p, paragraph) in page.paragraphs.iter().enumerate().skip(p0) {
        let p_ctm = paragraph_ctm(&page.spans, paragraph);
        if p_ctm.b.atan2(p_ctm.a) != rotate {
            p1 = p;
            break;
        }
        for line in &paragraph.lines {
            let span = &page.spans[line.last_span()];
            let glyph = span.last_glyph();
            let adv = glyph.adv * span.trm.expansion();
            let x = glyph.x + adv * rotate.cos();
            let y = glyph.y + adv * rotate.sin();

            let dx = x - origin.x;
            let dy = y - origin.y;

            // Position relative to the origin, before box rotation.
            let xx = inverse.a * dx + inverse.b * dy;
            let yy = -(inverse.c * dx + inverse.d * dy);
            if xx > extent.x {
                extent.x = xx;
            }
            if yy > extent.y {
                extent.y = yy;
            }
        }
    }
    log::debug!(
        "rotate={} p0={} p1={} extent=({} {})",
        rotate,
        p0,
        p1,
        extent.x,
        extent.y
    );

    let rot = (rotate * 180.0 / std::f32::consts::PI * DEGREE_SCALE) as i32;

    let mut x = (ctm.e * POINT_TO_EMU) as i32;
    let mut y = (ctm.f * POINT_TO_EMU) as i32;
    let w = (extent.x * POINT_TO_EMU) as i32;
    let mut h = (extent.y * POINT_TO_EMU) as i32;

    // Word offers no way to auto-grow a text box to its content, so keep
    // the measured width but leave the text room to take extra vertical
    // space.
    h *= 2;

    // The box rotates about its centre but the text should stay anchored
    // at its top-left, so correct the position by the vector the top-left
    // moves under a centre rotation.
    let dx = (w as f32 / 2.0 * (1.0 - rotate.cos()) + h as f32 / 2.0 * rotate.sin()) as i32;
    let dy = (h as f32 / 2.0 * (rotate.cos() - 1.0) + w as f32 / 2.0 * rotate.sin()) as i32;
    x -= dx;
    y += dy;

    emit_box_choice_open(content, text_box_id, x, y, w, h, rot);
    for paragraph in &page.paragraphs[p0..p1] {
        emit_paragraph(state, &page.spans, paragraph, content);
    }
    emit_box_choice_close(content);

    emit_box_fallback_open(content, text_box_id);
    for paragraph in &page.paragraphs[p0..p1] {
        emit_paragraph(state, &page.spans, paragraph, content);
    }
    emit_box_fallback_close(content);

    p1
}

/// Emit one paragraph: its lines as a sequence of styled runs.
fn emit_paragraph<'a>(
    state: &mut RunState<'a>,
    spans: &'a [Span],
    paragraph: &Paragraph,
    content: &mut ContentBuffer,
) {
    emit_paragraph_start(content);

    for line in &paragraph.lines {
        for &span_ix in &line.spans {
            let span = &spans[span_ix];
            state.ctm_prev = Some(span.ctm);
            let font_size = span.styled_font_size();
            if state.font_name != Some(span.font_name.as_str())
                || span.bold != state.bold
                || span.italic != state.italic
                || font_size != state.font_size
            {
                if state.font_name.is_some() {
                    emit_run_finish(content);
                }
                state.font_name = Some(span.font_name.as_str());
                state.bold = span.bold;
                state.italic = span.italic;
                state.font_size = font_size;
                emit_run_start(content, &span.font_name, font_size, span.bold, span.italic);
            }

            for glyph in &span.glyphs {
                emit_glyph(content, glyph.ucs);
            }
        }
        // Remove any trailing '-' at the end of the line.
        content.truncate_if('-');
    }

    if state.font_name.take().is_some() {
        emit_run_finish(content);
    }
    emit_paragraph_finish(content);
}

fn emit_paragraph_start(content: &mut ContentBuffer) {
    content.push_str("\n\n<w:p>");
}

fn emit_paragraph_finish(content: &mut ContentBuffer) {
    content.push_str("\n</w:p>");
}

/// An empty paragraph, used for extra vertical spacing.
fn emit_paragraph_empty(content: &mut ContentBuffer) {
    emit_paragraph_start(content);
    emit_paragraph_finish(content);
}

fn emit_run_start(
    content: &mut ContentBuffer,
    font_name: &str,
    font_size: f32,
    bold: bool,
    italic: bool,
) {
    content.push_str("\n<w:r><w:rPr><w:rFonts w:ascii=\"");
    content.push_str(font_name);
    content.push_str("\" w:hAnsi=\"");
    content.push_str(font_name);
    content.push_str("\"/>");
    if bold {
        content.push_str("<w:b/>");
    }
    if italic {
        content.push_str("<w:i/>");
    }
    // Run sizes are expressed in half-points.
    let _ = write!(
        content,
        "<w:sz w:val=\"{}\"/><w:szCs w:val=\"{}\"/>",
        font_size * 2.0,
        font_size * 2.0
    );
    content.push_str("</w:rPr><w:t xml:space=\"preserve\">");
}

fn emit_run_finish(content: &mut ContentBuffer) {
    content.push_str("</w:t></w:r>");
}

/// Append one glyph's codepoint in its emitted form.
///
/// XML-critical characters become named entities, the Latin f-ligatures
/// are expanded, printable ASCII passes through verbatim and everything
/// else is emitted as a numeric character reference.
fn emit_glyph(content: &mut ContentBuffer, ucs: u32) {
    match char::from_u32(ucs) {
        Some('<') => content.push_str("&lt;"),
        Some('>') => content.push_str("&gt;"),
        Some('&') => content.push_str("&amp;"),
        Some('"') => content.push_str("&quot;"),
        Some('\'') => content.push_str("&apos;"),
        Some('\u{fb00}') => content.push_str("ff"),
        Some('\u{fb01}') => content.push_str("fi"),
        Some('\u{fb02}') => content.push_str("fl"),
        Some('\u{fb03}') => content.push_str("ffi"),
        Some('\u{fb04}') => content.push_str("ffl"),
        Some(c @ ' '..='\u{7f}') => content.push_char(c),
        _ => {
            let _ = write!(content, "&#x{:x};", ucs);
        }
    }
}

/// Open the `<mc:Choice>` subtree: an anchored WordprocessingShape text
/// box rotated by `rot` (1/60000 degree), positioned in EMU.
fn emit_box_choice_open(
    content: &mut ContentBuffer,
    text_box_id: i32,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    rot: i32,
) {
    content.push_str("\n\n<w:p>\n  <w:r>\n    <mc:AlternateContent>\n");
    content.push_str("      <mc:Choice Requires=\"wps\">\n");
    content.push_str("        <w:drawing>\n");
    content.push_str("          <wp:anchor distT=\"0\" distB=\"0\" distL=\"0\" distR=\"0\" simplePos=\"0\" relativeHeight=\"0\" behindDoc=\"0\" locked=\"0\" layoutInCell=\"1\" allowOverlap=\"1\">\n");
    content.push_str("            <wp:simplePos x=\"0\" y=\"0\"/>\n");
    content.push_str("            <wp:positionH relativeFrom=\"page\">\n");
    let _ = write!(content, "              <wp:posOffset>{}</wp:posOffset>\n", x);
    content.push_str("            </wp:positionH>\n");
    content.push_str("            <wp:positionV relativeFrom=\"page\">\n");
    let _ = write!(content, "              <wp:posOffset>{}</wp:posOffset>\n", y);
    content.push_str("            </wp:positionV>\n");
    let _ = write!(content, "            <wp:extent cx=\"{}\" cy=\"{}\"/>\n", w, h);
    content.push_str("            <wp:effectExtent l=\"381000\" t=\"723900\" r=\"371475\" b=\"723900\"/>\n");
    content.push_str("            <wp:wrapNone/>\n");
    let _ = write!(
        content,
        "            <wp:docPr id=\"{}\" name=\"Text Box {}\"/>\n",
        text_box_id, text_box_id
    );
    content.push_str("            <wp:cNvGraphicFramePr/>\n");
    content.push_str("            <a:graphic xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\">\n");
    content.push_str("              <a:graphicData uri=\"http://schemas.microsoft.com/office/word/2010/wordprocessingShape\">\n");
    content.push_str("                <wps:wsp>\n");
    content.push_str("                  <wps:cNvSpPr txBox=\"1\"/>\n");
    content.push_str("                  <wps:spPr>\n");
    let _ = write!(content, "                    <a:xfrm rot=\"{}\">\n", rot);
    content.push_str("                      <a:off x=\"0\" y=\"0\"/>\n");
    content.push_str("                      <a:ext cx=\"3228975\" cy=\"2286000\"/>\n");
    content.push_str("                    </a:xfrm>\n");
    content.push_str("                    <a:prstGeom prst=\"rect\">\n");
    content.push_str("                      <a:avLst/>\n");
    content.push_str("                    </a:prstGeom>\n");
    content.push_str("                  </wps:spPr>\n");
    content.push_str("                  <wps:txbx>\n");
    content.push_str("                    <w:txbxContent>");
}

/// Close the `<mc:Choice>` subtree opened by [`emit_box_choice_open`].
fn emit_box_choice_close(content: &mut ContentBuffer) {
    content.push_str("\n");
    content.push_str("                    </w:txbxContent>\n");
    content.push_str("                  </wps:txbx>\n");
    content.push_str("                  <wps:bodyPr rot=\"0\" spcFirstLastPara=\"0\" vertOverflow=\"overflow\" horzOverflow=\"overflow\" vert=\"horz\" wrap=\"square\" lIns=\"91440\" tIns=\"45720\" rIns=\"91440\" bIns=\"45720\" numCol=\"1\" spcCol=\"0\" rtlCol=\"0\" fromWordArt=\"0\" anchor=\"t\" anchorCtr=\"0\" forceAA=\"0\" compatLnSpc=\"1\">\n");
    content.push_str("                    <a:prstTxWarp prst=\"textNoShape\">\n");
    content.push_str("                      <a:avLst/>\n");
    content.push_str("                    </a:prstTxWarp>\n");
    content.push_str("                    <a:noAutofit/>\n");
    content.push_str("                  </wps:bodyPr>\n");
    content.push_str("                </wps:wsp>\n");
    content.push_str("              </a:graphicData>\n");
    content.push_str("            </a:graphic>\n");
    content.push_str("          </wp:anchor>\n");
    content.push_str("        </w:drawing>\n");
    content.push_str("      </mc:Choice>\n");
}

/// Open the VML `<mc:Fallback>` duplicate for readers without
/// WordprocessingShape support.
fn emit_box_fallback_open(content: &mut ContentBuffer, text_box_id: i32) {
    content.push_str("      <mc:Fallback>\n");
    content.push_str("        <w:pict>\n");
    content.push_str("          <v:shapetype id=\"_x0000_t202\" coordsize=\"21600,21600\" o:spt=\"202\" path=\"m,l,21600r21600,l21600,xe\">\n");
    content.push_str("            <v:stroke joinstyle=\"miter\"/>\n");
    content.push_str("            <v:path gradientshapeok=\"t\" o:connecttype=\"rect\"/>\n");
    content.push_str("          </v:shapetype>\n");
    let _ = write!(
        content,
        "          <v:shape id=\"Text Box {}\" type=\"#_x0000_t202\" style=\"position:absolute;mso-wrap-style:square;v-text-anchor:top\" fillcolor=\"white [3201]\" strokeweight=\".5pt\">\n",
        text_box_id
    );
    content.push_str("            <v:textbox>\n");
    content.push_str("              <w:txbxContent>");
}

/// Close the `<mc:Fallback>` subtree and the carrying paragraph.
fn emit_box_fallback_close(content: &mut ContentBuffer) {
    content.push_str("\n\n");
    content.push_str("              </w:txbxContent>\n");
    content.push_str("            </v:textbox>\n");
    content.push_str("          </v:shape>\n");
    content.push_str("        </w:pict>\n");
    content.push_str("      </mc:Fallback>\n");
    content.push_str("    </mc:AlternateContent>\n");
    content.push_str("  </w:r>\n");
    content.push_str("</w:p>");
}
