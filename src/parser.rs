//! Loader: intermediate tag events → pages of glyph spans.
//!
//! Reads the tag stream produced by [`crate::lexer::Lexer`] and builds a
//! [`Document`] of pages, spans and glyphs. While loading it performs two
//! pieces of within-span processing after every appended glyph:
//! spurious-space removal and gap splitting (see [`span_end_clean`]), and
//! optionally fragments spans on y-position changes (autosplit).
//!
//! Malformed input aborts the whole parse; no partial document is
//! returned.

use crate::config::ReflowConfig;
use crate::document::{Document, Glyph, Page, Span, WritingMode};
use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::lexer::{Lexer, Tag};

const SPACE: u32 = b' ' as u32;

/// Counters reported at debug level once the whole stream is loaded.
#[derive(Debug, Default)]
struct LoadStats {
    spans: usize,
    spans_split: usize,
    spans_autosplit: usize,
}

/// Parse intermediate glyph-stream text into a [`Document`].
///
/// The expected shape is a sequence of `<page>` blocks, each holding
/// `<span>` blocks of `<char>` records, with `<image>` blocks skipped
/// structurally. A leading `<?xml ...?>` declaration is ignored wherever
/// it appears; some producers emit one and some do not.
pub fn parse_intermediate(input: &str, config: &ReflowConfig) -> Result<Document> {
    let mut lexer = Lexer::new(input);
    let mut document = Document::default();
    let mut stats = LoadStats::default();

    while let Some(tag) = lexer.next_tag()? {
        if tag.name == "?xml" {
            continue;
        }
        if tag.name != "page" {
            return Err(Error::UnexpectedTag {
                expected: "page".to_string(),
                found: tag.name,
            });
        }
        let page = load_page(&mut lexer, config, &mut stats)?;
        log::debug!(
            "page={} num_spans={}",
            document.pages.len(),
            page.spans.len()
        );
        stats.spans += page.spans.len();
        document.pages.push(page);
    }

    log::debug!(
        "num_spans={} num_spans_split={} num_spans_autosplit={}",
        stats.spans,
        stats.spans_split,
        stats.spans_autosplit
    );

    Ok(document)
}

/// Load one `<page>` block. The opening tag has already been consumed.
fn load_page(lexer: &mut Lexer<'_>, config: &ReflowConfig, stats: &mut LoadStats) -> Result<Page> {
    let mut page = Page::default();
    loop {
        let tag = next_in(lexer, "page")?;
        match tag.name.as_str() {
            "/page" => return Ok(page),
            "image" => skip_image(lexer, &tag)?,
            "span" => load_span(lexer, &mut page, config, &tag, stats)?,
            _ => {
                return Err(Error::UnexpectedTag {
                    expected: "span".to_string(),
                    found: tag.name,
                })
            }
        }
    }
}

/// Load one `<span>` block into the page's span arena.
fn load_span(
    lexer: &mut Lexer<'_>,
    page: &mut Page,
    config: &ReflowConfig,
    tag: &Tag,
    stats: &mut LoadStats,
) -> Result<()> {
    let ctm = tag.matrix_attribute("ctm")?;
    let trm = tag.matrix_attribute("trm")?;

    let raw_font_name = tag.require("font_name")?;
    // Subsetted fonts arrive as "ABCDEF+Name"; only the suffix matters.
    let font_name = match raw_font_name.split_once('+') {
        Some((_, suffix)) => suffix,
        None => raw_font_name,
    }
    .to_string();
    let bold = font_name.contains("-Bold");
    let italic = font_name.contains("-Oblique");

    let wmode = match tag.int_attribute("wmode")? {
        0 => WritingMode::Horizontal,
        1 => WritingMode::Vertical,
        other => {
            return Err(Error::InvalidAttribute {
                tag: tag.name.clone(),
                attribute: "wmode".to_string(),
                value: other.to_string(),
            })
        }
    };

    page.spans.push(Span {
        ctm,
        trm,
        font_name,
        bold,
        italic,
        wmode,
        glyphs: Vec::new(),
    });

    let mut offset_x = 0.0f32;
    let mut offset_y = 0.0f32;

    loop {
        let tag = next_in(lexer, "span")?;
        if tag.name == "/span" {
            return Ok(());
        }
        if tag.name != "char" {
            return Err(Error::UnexpectedTag {
                expected: "char".to_string(),
                found: tag.name,
            });
        }

        let char_pre_x = tag.float_attribute("x")?;
        let char_pre_y = tag.float_attribute("y")?;

        if config.autosplit && char_pre_y - offset_y != 0.0 {
            // The glyph has moved vertically within the span. Shift the
            // CTM translation to the new origin, fragmenting the span so
            // the downstream joiner has to reassemble it.
            let span = last_span(page);
            let e = span.ctm.e
                + span.ctm.a * (char_pre_x - offset_x)
                + span.ctm.b * (char_pre_y - offset_y);
            let f = span.ctm.f
                + span.ctm.c * (char_pre_x - offset_x)
                + span.ctm.d * (char_pre_y - offset_y);
            offset_x = char_pre_x;
            offset_y = char_pre_y;
            if !span.glyphs.is_empty() {
                stats.spans_autosplit += 1;
                let fragment = Span {
                    glyphs: Vec::new(),
                    font_name: span.font_name.clone(),
                    ..*span
                };
                page.spans.push(fragment);
            }
            let span = last_span(page);
            span.ctm.e = e;
            span.ctm.f = f;
        }

        let span = last_span(page);
        let pre_x = char_pre_x - offset_x;
        let pre_y = char_pre_y - offset_y;
        let glyph = Glyph {
            pre_x,
            pre_y,
            x: span.ctm.a * pre_x + span.ctm.b * pre_y + span.ctm.e,
            y: span.ctm.c * pre_x + span.ctm.d * pre_y + span.ctm.f,
            gid: match tag.attribute("gid") {
                Some(_) => tag.int_attribute("gid")?,
                None => 0,
            },
            ucs: tag.uint_attribute("ucs")?,
            adv: tag.float_attribute("adv")?,
        };
        span.glyphs.push(glyph);

        let spans_before = page.spans.len();
        span_end_clean(page);
        if page.spans.len() != spans_before {
            stats.spans_split += 1;
        }
    }
}

/// Preliminary processing of the end of the page's last span, applied as
/// each glyph is loaded.
///
/// Looks at the two trailing glyphs and either leaves the span unchanged,
/// removes a spurious space in the last-but-one position, or moves the
/// trailing glyph into a new span. Applying this twice to the same buffer
/// is equivalent to applying it once.
fn span_end_clean(page: &mut Page) {
    let span = last_span(page);
    let n = span.glyphs.len();
    if n == 1 {
        return;
    }

    let font_size = span.trm.expansion() * span.ctm.expansion();

    let dir = match span.wmode {
        WritingMode::Horizontal => Point::new(1.0, 0.0),
        WritingMode::Vertical => Point::new(0.0, 1.0),
    };
    let dir = span.trm.transform_direction(dir);

    let prev = span.glyphs[n - 2];
    let cur = span.glyphs[n - 1];

    let expected_x = prev.pre_x + prev.adv * dir.x;
    let expected_y = prev.pre_y + prev.adv * dir.y;
    let err_x = (cur.pre_x - expected_x) / font_size;
    let err_y = (cur.pre_y - expected_y) / font_size;

    if prev.ucs == SPACE {
        // A space that the following glyph overlaps is not a real space;
        // these sometimes appear in the middle of words.
        let mut remove_penultimate_space =
            err_x < -prev.adv / 2.0 && err_x > -prev.adv;
        if (cur.pre_x - prev.pre_x) / font_size < cur.adv / 10.0 {
            log::trace!(
                "removing penultimate space because space very narrow: \
                 dx={} font_size={} adv={}",
                cur.pre_x - prev.pre_x,
                font_size,
                cur.adv
            );
            remove_penultimate_space = true;
        }
        if remove_penultimate_space {
            span.glyphs[n - 2] = cur;
            span.glyphs.truncate(n - 1);
        }
    } else if err_x.abs() > 0.01 || err_y.abs() > 0.01 {
        // The glyph is not a continuation of its predecessors: split it
        // off into a new span. This often splits too eagerly, which the
        // line joiner corrects later.
        log::trace!(
            "splitting last glyph into new span: err=({}, {}) span={}",
            err_x,
            err_y,
            span
        );
        span.glyphs.truncate(n - 1);
        let split = Span {
            glyphs: vec![cur],
            font_name: span.font_name.clone(),
            ..*span
        };
        page.spans.push(split);
    }
}

/// Skip an `<image>` block, discarding its content.
///
/// Pixmap images carry `h` rows of `<line y=i>`/`</line>` pairs; any other
/// subtype carries `datasize` hex bytes in the tag text.
fn skip_image(lexer: &mut Lexer<'_>, tag: &Tag) -> Result<()> {
    let image_type = tag.require("type")?;
    if image_type == "pixmap" {
        let _w = tag.int_attribute("w")?;
        let h = tag.int_attribute("h")?;
        for y in 0..h {
            let line = next_in(lexer, "image")?;
            if line.name != "line" {
                return Err(Error::UnexpectedTag {
                    expected: "line".to_string(),
                    found: line.name,
                });
            }
            let yy = line.int_attribute("y")?;
            if yy != y {
                return Err(Error::ImageLineOutOfOrder {
                    expected: y,
                    found: yy,
                });
            }
            let close = next_in(lexer, "line")?;
            if close.name != "/line" {
                return Err(Error::UnexpectedTag {
                    expected: "/line".to_string(),
                    found: close.name,
                });
            }
        }
    } else {
        let datasize = tag.size_attribute("datasize")?;
        skip_hex_data(&tag.text, datasize)?;
    }
    let close = next_in(lexer, "image")?;
    if close.name != "/image" {
        return Err(Error::UnexpectedTag {
            expected: "/image".to_string(),
            found: close.name,
        });
    }
    Ok(())
}

/// Consume `datasize` bytes of two-digit lowercase hex from image text.
fn skip_hex_data(text: &str, datasize: usize) -> Result<()> {
    let mut chars = text.char_indices();
    let mut bytes_read = 0;
    while bytes_read < datasize {
        let (offset, c) = chars.next().ok_or_else(|| Error::UnexpectedEof {
            context: "image".to_string(),
        })?;
        if c == ' ' || c == '\n' {
            continue;
        }
        if !is_hex_digit(c) {
            return Err(Error::BadImageData { found: c, offset });
        }
        let (offset, c) = chars.next().ok_or_else(|| Error::UnexpectedEof {
            context: "image".to_string(),
        })?;
        if !is_hex_digit(c) {
            return Err(Error::BadImageData { found: c, offset });
        }
        bytes_read += 1;
    }
    Ok(())
}

fn is_hex_digit(c: char) -> bool {
    c.is_ascii_digit() || ('a'..='f').contains(&c)
}

/// Next tag, or a structured error naming the enclosing context at EOF.
/// `?xml` declarations are ignored wherever they appear.
fn next_in(lexer: &mut Lexer<'_>, context: &str) -> Result<Tag> {
    loop {
        let tag = lexer.next_tag()?.ok_or_else(|| Error::UnexpectedEof {
            context: context.to_string(),
        })?;
        if tag.name != "?xml" {
            return Ok(tag);
        }
    }
}

/// The page's current (last) span.
fn last_span(page: &mut Page) -> &mut Span {
    page.spans.last_mut().expect("page has no spans")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Document {
        parse_intermediate(input, &ReflowConfig::new()).unwrap()
    }

    fn parse_autosplit(input: &str) -> Document {
        parse_intermediate(input, &ReflowConfig::new().with_autosplit(true)).unwrap()
    }

    const SIMPLE_SPAN: &str = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="Times-Roman" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>
<char x="5" y="0" adv="0.5" ucs="98"/>
<char x="10" y="0" adv="0.5" ucs="99"/>
</span>
</page>
"#;

    #[test]
    fn test_single_span_three_glyphs() {
        let doc = parse(SIMPLE_SPAN);
        assert_eq!(doc.pages.len(), 1);
        let page = &doc.pages[0];
        assert_eq!(page.spans.len(), 1);
        let ucs: Vec<u32> = page.spans[0].glyphs.iter().map(|g| g.ucs).collect();
        assert_eq!(ucs, vec![97, 98, 99]);
    }

    #[test]
    fn test_xml_declaration_skipped() {
        let input = format!("<?xml version=\"1.0\"?>\n{}", SIMPLE_SPAN);
        let doc = parse(&input);
        assert_eq!(doc.pages.len(), 1);
    }

    #[test]
    fn test_glyph_transform_applies_ctm() {
        let input = r#"<page>
<span ctm="2 0 0 2 100 200" trm="10 0 0 10 0 0" font_name="F" wmode="0">
<char x="3" y="4" adv="0.5" ucs="97"/>
</span>
</page>"#;
        let doc = parse(input);
        let glyph = &doc.pages[0].spans[0].glyphs[0];
        assert_eq!(glyph.pre_x, 3.0);
        assert_eq!(glyph.pre_y, 4.0);
        assert_eq!(glyph.x, 106.0);
        assert_eq!(glyph.y, 208.0);
    }

    #[test]
    fn test_font_subset_prefix_stripped() {
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="ABCDEF+Times-Bold" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>
</span>
</page>"#;
        let doc = parse(input);
        let span = &doc.pages[0].spans[0];
        assert_eq!(span.font_name, "Times-Bold");
        assert!(span.bold);
        assert!(!span.italic);
    }

    #[test]
    fn test_oblique_font_is_italic() {
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="Courier-Oblique" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>
</span>
</page>"#;
        let doc = parse(input);
        assert!(doc.pages[0].spans[0].italic);
    }

    #[test]
    fn test_bad_wmode_rejected() {
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="F" wmode="2">
</span>
</page>"#;
        assert!(parse_intermediate(input, &ReflowConfig::new()).is_err());
    }

    #[test]
    fn test_missing_required_attribute() {
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" wmode="0">
</span>
</page>"#;
        let err = parse_intermediate(input, &ReflowConfig::new()).unwrap_err();
        assert!(format!("{}", err).contains("font_name"));
    }

    #[test]
    fn test_unexpected_top_level_tag() {
        assert!(parse_intermediate("<span>", &ReflowConfig::new()).is_err());
    }

    #[test]
    fn test_gap_splits_span() {
        // Second glyph sits far beyond the expected continuation point, so
        // the cleanup moves it into its own span.
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="F" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>
<char x="50" y="0" adv="0.5" ucs="98"/>
</span>
</page>"#;
        let doc = parse(input);
        let page = &doc.pages[0];
        assert_eq!(page.spans.len(), 2);
        assert_eq!(page.spans[0].glyphs.len(), 1);
        assert_eq!(page.spans[0].glyphs[0].ucs, 97);
        assert_eq!(page.spans[1].glyphs.len(), 1);
        assert_eq!(page.spans[1].glyphs[0].ucs, 98);
    }

    #[test]
    fn test_exact_continuation_not_split() {
        // adv 0.5 at font size 10 means the next glyph belongs at x=5.
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="F" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>
<char x="5" y="0" adv="0.5" ucs="98"/>
</span>
</page>"#;
        let doc = parse(input);
        assert_eq!(doc.pages[0].spans.len(), 1);
        assert_eq!(doc.pages[0].spans[0].glyphs.len(), 2);
    }

    #[test]
    fn test_overlapping_space_removed() {
        // The 'b' at x=6 lands on top of the space that starts at x=5:
        // err_x = (6 - (5 + 0.4*10)) / 10 = -0.3, inside (-0.4, -0.2).
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="F" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>
<char x="5" y="0" adv="0.4" ucs="32"/>
<char x="6" y="0" adv="0.5" ucs="98"/>
</span>
</page>"#;
        let doc = parse(input);
        let span = &doc.pages[0].spans[0];
        let ucs: Vec<u32> = span.glyphs.iter().map(|g| g.ucs).collect();
        assert_eq!(ucs, vec![97, 98]);
    }

    #[test]
    fn test_narrow_space_removed() {
        // The space and its follower are almost coincident, so the
        // narrow-space rule fires regardless of the error band.
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="F" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>
<char x="5" y="0" adv="0.01" ucs="32"/>
<char x="5.05" y="0" adv="0.5" ucs="98"/>
</span>
</page>"#;
        let doc = parse(input);
        let span = &doc.pages[0].spans[0];
        let ucs: Vec<u32> = span.glyphs.iter().map(|g| g.ucs).collect();
        assert_eq!(ucs, vec![97, 98]);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        // The follower lands exactly where the removed space began, so the
        // cleaned buffer is a fixed point of the cleanup.
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="F" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>
<char x="5" y="0" adv="0.4" ucs="32"/>
<char x="5" y="0" adv="0.5" ucs="98"/>
</span>
</page>"#;
        let mut doc = parse(input);
        let ucs: Vec<u32> = doc.pages[0].spans[0].glyphs.iter().map(|g| g.ucs).collect();
        assert_eq!(ucs, vec![97, 98]);
        let before = doc.pages[0].clone();
        span_end_clean(&mut doc.pages[0]);
        assert_eq!(doc.pages[0].spans, before.spans);
    }

    #[test]
    fn test_autosplit_fragments_on_y_change() {
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="F" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>
<char x="0" y="12" adv="0.5" ucs="98"/>
</span>
</page>"#;
        let doc = parse_autosplit(input);
        let page = &doc.pages[0];
        assert_eq!(page.spans.len(), 2);
        // The fragment's CTM translation moved to the new baseline, and
        // the glyph is stored relative to it.
        assert_eq!(page.spans[1].ctm.f, 12.0);
        assert_eq!(page.spans[1].glyphs[0].pre_y, 0.0);
        assert_eq!(page.spans[1].glyphs[0].y, 12.0);
    }

    #[test]
    fn test_autosplit_off_keeps_one_span_when_aligned() {
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="F" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>
<char x="5" y="0" adv="0.5" ucs="98"/>
</span>
</page>"#;
        let doc = parse(input);
        assert_eq!(doc.pages[0].spans.len(), 1);
    }

    #[test]
    fn test_pixmap_image_skipped() {
        let input = r#"<page>
<image type="pixmap" w="2" h="2">
<line y="0"></line>
<line y="1"></line>
</image>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="F" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>
</span>
</page>"#;
        let doc = parse(input);
        assert_eq!(doc.pages[0].spans.len(), 1);
    }

    #[test]
    fn test_pixmap_rows_out_of_order_rejected() {
        let input = r#"<page>
<image type="pixmap" w="2" h="2">
<line y="1"></line>
<line y="0"></line>
</image>
</page>"#;
        assert!(parse_intermediate(input, &ReflowConfig::new()).is_err());
    }

    #[test]
    fn test_compressed_image_skipped() {
        let input = r#"<page>
<image type="jpeg" datasize="4">
0a1b 2c3d
</image>
</page>"#;
        let doc = parse(input);
        assert!(doc.pages[0].spans.is_empty());
    }

    #[test]
    fn test_bad_hex_in_image_rejected() {
        let input = r#"<page>
<image type="jpeg" datasize="2">
0aZZ
</image>
</page>"#;
        let err = parse_intermediate(input, &ReflowConfig::new()).unwrap_err();
        assert!(matches!(err, Error::BadImageData { .. }));
    }

    #[test]
    fn test_truncated_input_rejected() {
        let input = r#"<page>
<span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="F" wmode="0">
<char x="0" y="0" adv="0.5" ucs="97"/>"#;
        assert!(parse_intermediate(input, &ReflowConfig::new()).is_err());
    }
}
