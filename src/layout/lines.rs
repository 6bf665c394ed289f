//! Greedy pairing of spans into baseline-aligned lines.

use crate::document::{Glyph, Line, Span};

use super::lines_compatible;

/// Spans whose join gap exceeds this fraction of the average glyph
/// advance get a synthetic space inserted between them.
const SPACE_GAP_FRACTION: f32 = 0.25;

/// Tolerance, in degrees, for the angle between the end of one line and
/// the start of the next. This is alignment tolerance, distinct from the
/// exact angle equality required for compatibility.
const ANGLE_TOLERANCE_DEG: f32 = 1.0;

const SPACE: u32 = b' ' as u32;

/// Build lines from a page's spans.
///
/// Starts with one singleton line per span, then repeatedly appends to
/// each line the nearest compatible, aligned line. Absorbed lines are
/// emptied in place; a grown line is re-examined before the pass moves
/// on. The result is compacted with order preserved.
///
/// Spans are only mutated to receive synthetic space glyphs; all line
/// records hold indices into `spans`.
pub fn build_lines(spans: &mut [Span]) -> Vec<Line> {
    let spans_num = spans.len();
    let mut lines: Vec<Option<Line>> = (0..spans_num)
        .map(|i| Some(Line { spans: vec![i] }))
        .collect();

    let mut num_compatible = 0usize;
    let mut num_joins = 0usize;

    let mut a = 0;
    while a < lines.len() {
        if lines[a].is_none() {
            a += 1;
            continue;
        }

        let a_last = lines[a].as_ref().expect("line emptied").last_span();
        let angle_a = spans[a_last].angle();

        // Nearest compatible line that continues line a, by advance
        // distance from a's last glyph to the candidate's first glyph.
        let mut nearest: Option<(usize, f32)> = None;

        for b in 0..lines.len() {
            if b == a {
                continue;
            }
            let Some(line_b) = lines[b].as_ref() else {
                continue;
            };
            let a_first = lines[a].as_ref().expect("line emptied").first_span();
            if !lines_compatible(spans, a_first, line_b.first_span(), angle_a) {
                continue;
            }
            num_compatible += 1;

            // The angle from a's last glyph to b's first glyph tells us
            // whether the lines line up with each other, as opposed to
            // merely being at the same angle on different baselines.
            let b_first = line_b.first_span();
            let last_a = *spans[a_last].last_glyph();
            let first_b = *spans[b_first].first_glyph();
            let dx = first_b.x - last_a.x;
            let dy = first_b.y - last_a.y;
            let angle_a_b = (-dy).atan2(dx);
            if (angle_a_b - angle_a).abs().to_degrees() <= ANGLE_TOLERANCE_DEG {
                let adv = (dx * dx + dy * dy).sqrt()
                    - last_a.adv * spans[a_last].trm.expansion();
                let closer = match nearest {
                    None => true,
                    Some((_, nearest_adv)) => adv < nearest_adv,
                };
                if closer {
                    nearest = Some((b, adv));
                }
            }
        }

        if let Some((b, nearest_adv)) = nearest {
            // The lines are aligned, so move b's spans onto the end of a.
            let b_first = lines[b].as_ref().expect("line emptied").first_span();

            if spans[a_last].last_glyph().ucs != SPACE
                && spans[b_first].first_glyph().ucs != SPACE
            {
                // Average advance of the two adjacent spans decides
                // whether the gap is wide enough to merit a space.
                let average_adv = (spans[a_last].advance_total()
                    + spans[b_first].advance_total())
                    / (spans[a_last].glyphs.len() + spans[b_first].glyphs.len()) as f32;
                if nearest_adv > SPACE_GAP_FRACTION * average_adv {
                    log::trace!(
                        "inserting space: nearest_adv={} average_adv={} a={} b={}",
                        nearest_adv,
                        average_adv,
                        spans[a_last],
                        spans[b_first]
                    );
                    let mut space = Glyph::from_ucs(SPACE);
                    space.adv = nearest_adv;
                    spans[a_last].glyphs.push(space);
                }
            }

            // We may end up with two adjacent spaces here, but removing
            // one could leave an empty span, which breaks assumptions
            // elsewhere.
            let absorbed = lines[b].take().expect("line emptied");
            lines[a]
                .as_mut()
                .expect("line emptied")
                .spans
                .extend(absorbed.spans);
            num_joins += 1;

            if b < a {
                a += 1;
            }
            // b > a: nothing has been appended to b yet, so the grown
            // line a needs checking again.
        } else {
            a += 1;
        }
    }

    let lines: Vec<Line> = lines.into_iter().flatten().collect();
    log::debug!(
        "Turned {} spans into {} lines. num_compatible={} num_joins={}",
        spans_num,
        lines.len(),
        num_compatible,
        num_joins
    );
    lines
}
