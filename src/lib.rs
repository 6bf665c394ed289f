// Exact float comparison is load-bearing in the joining passes; see the
// layout module docs.
#![allow(clippy::float_cmp)]
#![allow(clippy::too_many_arguments)]

//! # Reflow Oxide
//!
//! Layout reconstruction engine: rebuilds reading-order paragraphs from a
//! stream of glyph-level text records (as produced by a PDF text
//! extractor) and emits the result as an Office Open XML content
//! fragment.
//!
//! ## Pipeline
//!
//! 1. **Load**: parse the intermediate per-page glyph stream into spans
//!    with transformed coordinates, cleaning spurious spaces and
//!    splitting spans across gaps as glyphs arrive.
//! 2. **Join**: greedily pair spans sharing a baseline into lines, then
//!    stack compatible lines into paragraphs and sort them into reading
//!    order.
//! 3. **Emit**: serialise the paragraphs as `<w:p>` elements, preserving
//!    font and rotation; rotated text goes into anchored text boxes.
//!
//! The engine owns no file I/O: it consumes a token stream and produces a
//! character buffer. Wrapping the fragment into a document container is
//! the caller's concern.
//!
//! ## Quick Start
//!
//! ```
//! use reflow_oxide::{Document, ReflowConfig};
//!
//! # fn main() -> reflow_oxide::Result<()> {
//! let input = r#"<page>
//! <span ctm="1 0 0 1 0 0" trm="12 0 0 12 0 0" font_name="Times-Roman" wmode="0">
//! <char x="0" y="0" adv="0.5" ucs="72"/>
//! <char x="6" y="0" adv="0.5" ucs="105"/>
//! </span>
//! </page>"#;
//!
//! let config = ReflowConfig::new();
//! let mut doc = Document::from_intermediate(input, &config)?;
//! doc.join();
//! let content = doc.to_docx_content(&config);
//! assert!(content.contains(">Hi</w:t>"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Geometry primitives
pub mod geometry;

// Intermediate-format tokenizing and loading
pub mod lexer;
pub mod parser;

// Data model
pub mod document;

// Line and paragraph reconstruction
pub mod layout;

// OOXML content emission
pub mod docx;

// Re-exports
pub use config::ReflowConfig;
pub use document::{Document, Glyph, Line, Page, Paragraph, Span, WritingMode};
pub use error::{Error, ErrorCategory, Result};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with("0."));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "reflow_oxide");
    }
}
