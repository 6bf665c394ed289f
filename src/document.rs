//! Core data model: glyphs, spans, lines, paragraphs, pages.
//!
//! A [`Page`] owns its spans; [`Line`]s refer to spans by index into the
//! page's span arena and [`Paragraph`]s own their lines. Nothing holds a
//! back reference, so the whole document is a strict ownership tree.

use std::fmt;

use crate::config::ReflowConfig;
use crate::error::Result;
use crate::geometry::Matrix;

/// Direction in which glyphs advance within a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritingMode {
    /// Glyphs advance along +x.
    #[default]
    Horizontal,
    /// Glyphs advance along +y.
    Vertical,
}

/// A single glyph within a span.
///
/// Immutable once written by the loader, apart from the in-span cleanup
/// which may drop or move trailing glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Glyph {
    /// X coordinate before transformation by the span's CTM.
    pub pre_x: f32,
    /// Y coordinate before transformation by the span's CTM.
    pub pre_y: f32,
    /// X coordinate after transformation.
    pub x: f32,
    /// Y coordinate after transformation.
    pub y: f32,
    /// Opaque glyph id from the producing font engine (0 when absent).
    pub gid: i32,
    /// Unicode codepoint.
    pub ucs: u32,
    /// Advance to the next glyph's nominal origin, in font units.
    pub adv: f32,
}

impl Glyph {
    /// A glyph with `ucs` set and every other field zeroed.
    pub fn from_ucs(ucs: u32) -> Self {
        Glyph {
            ucs,
            ..Default::default()
        }
    }
}

/// An ordered run of glyphs sharing transform, font and writing mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    /// Current transformation matrix (text space to page space).
    pub ctm: Matrix,
    /// Text rendering matrix (glyph-local shape transform).
    pub trm: Matrix,
    /// Font name with any subset prefix removed.
    pub font_name: String,
    /// Whether the font name marks the span as bold.
    pub bold: bool,
    /// Whether the font name marks the span as italic.
    pub italic: bool,
    /// Glyph advance direction.
    pub wmode: WritingMode,
    /// The glyphs. Non-empty throughout the line and paragraph stages.
    pub glyphs: Vec<Glyph>,
}

impl Span {
    /// First glyph. Panics if the span is empty.
    pub fn first_glyph(&self) -> &Glyph {
        &self.glyphs[0]
    }

    /// Last glyph. Panics if the span is empty.
    pub fn last_glyph(&self) -> &Glyph {
        &self.glyphs[self.glyphs.len() - 1]
    }

    /// Angle of the span in radians, derived from the CTM alone.
    ///
    /// Inclined text is produced by the CTM; the TRM is treated as a
    /// glyph-local transform and deliberately ignored here.
    pub fn angle(&self) -> f32 {
        (-self.ctm.c).atan2(self.ctm.a)
    }

    /// Total advance of the span: the 2D distance between its endpoint
    /// glyphs plus the trailing glyph's advance.
    ///
    /// Including the trailing advance avoids returning zero for a
    /// single-glyph span, and the Euclidean distance keeps vertical-mode
    /// spans honest.
    pub fn advance_total(&self) -> f32 {
        let first = self.first_glyph();
        let last = self.last_glyph();
        let dx = last.x - first.x;
        let dy = last.y - first.y;
        (dx * dx + dy * dy).sqrt() + last.adv * self.trm.expansion()
    }

    /// Font size used for styling comparisons:
    /// `expansion(trm) · expansion(ctm)`, rounded to two decimals.
    pub fn styled_font_size(&self) -> f32 {
        let size = self.trm.expansion() * self.ctm.expansion();
        ((size * 100.0 + 0.5) as i32) as f32 / 100.0
    }
}

impl fmt::Display for Span {
    /// Brief diagnostic form: the span's text in double quotes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for glyph in &self.glyphs {
            match char::from_u32(glyph.ucs) {
                Some(c) => write!(f, "{}", c)?,
                None => write!(f, "\\u{{{:x}}}", glyph.ucs)?,
            }
        }
        write!(f, "\"")
    }
}

/// Spans aligned on the same baseline, stored as indices into the owning
/// page's span arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Indices into [`Page::spans`], in reading order.
    pub spans: Vec<usize>,
}

impl Line {
    /// Index of the first span. Panics if the line is empty.
    pub fn first_span(&self) -> usize {
        self.spans[0]
    }

    /// Index of the last span. Panics if the line is empty.
    pub fn last_span(&self) -> usize {
        self.spans[self.spans.len() - 1]
    }
}

/// Lines stacked vertically to form a paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    /// The paragraph's lines, in reading order.
    pub lines: Vec<Line>,
}

impl Paragraph {
    /// First line. Panics if the paragraph is empty.
    pub fn first_line(&self) -> &Line {
        &self.lines[0]
    }

    /// Last line. Panics if the paragraph is empty.
    pub fn last_line(&self) -> &Line {
        &self.lines[self.lines.len() - 1]
    }
}

/// One page: the span arena plus the paragraph structure built over it.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// All spans on the page, owned exclusively here.
    pub spans: Vec<Span>,
    /// Paragraphs built by [`Document::join`]; empty until then.
    pub paragraphs: Vec<Paragraph>,
}

/// An ordered sequence of pages.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// The document's pages.
    pub pages: Vec<Page>,
}

impl Document {
    /// Parse intermediate glyph-stream text into a document of pages and
    /// spans. See [`crate::parser::parse_intermediate`].
    ///
    /// # Examples
    ///
    /// ```
    /// use reflow_oxide::{Document, ReflowConfig};
    ///
    /// let input = r#"<page>
    /// <span ctm="1 0 0 1 0 0" trm="10 0 0 10 0 0" font_name="Times" wmode="0">
    /// <char x="0" y="0" adv="0.5" ucs="72"/>
    /// </span>
    /// </page>"#;
    /// let doc = Document::from_intermediate(input, &ReflowConfig::new()).unwrap();
    /// assert_eq!(doc.pages.len(), 1);
    /// ```
    pub fn from_intermediate(input: &str, config: &ReflowConfig) -> Result<Document> {
        crate::parser::parse_intermediate(input, config)
    }

    /// Join each page's spans into lines and each page's lines into
    /// paragraphs. Pages are independent of each other.
    pub fn join(&mut self) {
        for (index, page) in self.pages.iter_mut().enumerate() {
            log::debug!("processing page {}: num_spans={}", index, page.spans.len());
            let lines = crate::layout::build_lines(&mut page.spans);
            page.paragraphs = crate::layout::build_paragraphs(&mut page.spans, lines);
        }
    }

    /// Emit the joined document as an OOXML content fragment.
    /// See [`crate::docx::to_docx_content`].
    pub fn to_docx_content(&self, config: &ReflowConfig) -> String {
        crate::docx::to_docx_content(self, config)
    }
}
