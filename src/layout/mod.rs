//! Layout reconstruction algorithms.
//!
//! This module rebuilds reading structure from loose spans:
//! - greedy pairing of spans into baseline-aligned lines
//! - greedy vertical stacking of lines into paragraphs, plus the final
//!   paragraph ordering
//!
//! Both passes share the same compatibility test: two lines can only ever
//! be considered together when they have the same writing mode, equal CTM
//! linear parts and exactly equal angles. Angle equality is exact on
//! purpose: producers report identical CTMs for text that belongs
//! together, and an approximate comparison here would destabilise the
//! greedy joiners.

use crate::document::{Line, Span};

pub mod lines;
pub mod paragraphs;

pub use lines::build_lines;
pub use paragraphs::build_paragraphs;

/// Shared compatibility test for the joining passes.
///
/// `a_first` and `b_first` are the first span of each line; `angle_a` is
/// the angle the caller derived for line `a`.
fn lines_compatible(spans: &[Span], a_first: usize, b_first: usize, angle_a: f32) -> bool {
    let a_span = &spans[a_first];
    let b_span = &spans[b_first];
    if a_span.wmode != b_span.wmode {
        return false;
    }
    if a_span.ctm.cmp4(&b_span.ctm).is_ne() {
        log::trace!("ctm's differ: {:?} vs {:?}", a_span.ctm, b_span.ctm);
        return false;
    }
    b_span.angle() == angle_a
}

/// Largest `expansion(trm)` over the line's spans.
fn line_font_size_max(spans: &[Span], line: &Line) -> f32 {
    let mut size_max = 0.0f32;
    for &span_ix in &line.spans {
        let size = spans[span_ix].trm.expansion();
        if size > size_max {
            size_max = size;
        }
    }
    size_max
}

/// Perpendicular distance between two parallel lines of text at `angle`,
/// measured from point `a` on the first to point `b` on the second along
/// the line normal.
fn line_distance(ax: f32, ay: f32, bx: f32, by: f32, angle: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    dx * angle.sin() + dy * angle.cos()
}
