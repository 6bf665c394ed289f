//! Greedy vertical stacking of lines into paragraphs, plus the final
//! paragraph ordering.

use std::cmp::Ordering;

use crate::document::{Glyph, Line, Paragraph, Span};

use super::{line_distance, line_font_size_max, lines_compatible};

/// A candidate line joins a paragraph only when its perpendicular
/// distance is below this multiple of the candidate's largest font size.
const JOIN_DISTANCE_FACTOR: f32 = 1.5;

const SPACE: u32 = b' ' as u32;
const HYPHEN: u32 = b'-' as u32;

/// Build paragraphs from a page's lines.
///
/// Starts with one singleton paragraph per line, then repeatedly appends
/// to each paragraph the nearest compatible line that lies below it
/// (positive perpendicular distance), provided it is close enough
/// relative to its font size. Joining removes a trailing hyphen from the
/// upper line or inserts a space in its place. The surviving paragraphs
/// are sorted into reading order.
pub fn build_paragraphs(spans: &mut [Span], lines: Vec<Line>) -> Vec<Paragraph> {
    let lines_num = lines.len();
    let mut paragraphs: Vec<Option<Paragraph>> = lines
        .into_iter()
        .map(|line| Some(Paragraph { lines: vec![line] }))
        .collect();

    let mut num_joins = 0usize;

    let mut a = 0;
    while a < paragraphs.len() {
        if paragraphs[a].is_none() {
            a += 1;
            continue;
        }

        let line_a = paragraphs[a]
            .as_ref()
            .expect("paragraph emptied")
            .last_line()
            .clone();
        let angle_a = spans[line_a.first_span()].angle();

        // Nearest paragraph that could continue paragraph a, by positive
        // perpendicular distance from a's last line to the candidate's
        // first line.
        let mut nearest: Option<(usize, f32)> = None;

        for b in 0..paragraphs.len() {
            if b == a {
                continue;
            }
            let Some(paragraph_b) = paragraphs[b].as_ref() else {
                continue;
            };
            let line_b = paragraph_b.first_line();
            if !lines_compatible(spans, line_a.first_span(), line_b.first_span(), angle_a) {
                continue;
            }

            let last = spans[line_a.last_span()].last_glyph();
            let first = spans[line_b.first_span()].first_glyph();
            let distance = line_distance(last.x, last.y, first.x, first.y, angle_a);
            if distance > 0.0 {
                let closer = match nearest {
                    None => true,
                    Some((_, nearest_distance)) => distance < nearest_distance,
                };
                if closer {
                    nearest = Some((b, distance));
                }
            }
        }

        if let Some((b, distance)) = nearest {
            let first_line_b = paragraphs[b]
                .as_ref()
                .expect("paragraph emptied")
                .first_line();
            let line_b_size = line_font_size_max(spans, first_line_b);

            if distance < JOIN_DISTANCE_FACTOR * line_b_size {
                log::trace!(
                    "joining paragraphs: distance={} line_b_size={}",
                    distance,
                    line_b_size
                );
                let a_span = &mut spans[line_a.last_span()];
                if a_span.last_glyph().ucs == HYPHEN {
                    // The upper line was hyphenated across the break.
                    a_span.glyphs.pop();
                } else {
                    // Insert a space standing in for the line break,
                    // extrapolated past the previous glyph's advance.
                    let prev = *a_span.last_glyph();
                    let mut space = Glyph::from_ucs(SPACE);
                    space.x = prev.x + prev.adv * a_span.ctm.a;
                    space.y = prev.y + prev.adv * a_span.ctm.c;
                    a_span.glyphs.push(space);
                }

                let absorbed = paragraphs[b].take().expect("paragraph emptied");
                paragraphs[a]
                    .as_mut()
                    .expect("paragraph emptied")
                    .lines
                    .extend(absorbed.lines);
                num_joins += 1;

                if b < a {
                    a += 1;
                }
                // b > a: the grown paragraph needs checking again.
            } else {
                a += 1;
            }
        } else {
            a += 1;
        }
    }

    let mut paragraphs: Vec<Paragraph> = paragraphs.into_iter().flatten().collect();

    // Sort paragraphs into reading order.
    paragraphs.sort_by(|pa, pb| paragraphs_cmp(spans, pa, pb));

    log::debug!(
        "Turned {} lines into {} paragraphs. num_joins={}",
        lines_num,
        paragraphs.len(),
        num_joins
    );
    paragraphs
}

/// Reading-order comparator for paragraphs within a page.
///
/// Paragraphs under different CTM linear parts sort by the component-wise
/// sign of the difference. Paragraphs at wildly different angles are left
/// where they are. Otherwise the perpendicular distance at the mean angle
/// decides: positive means `a` reads first.
fn paragraphs_cmp(spans: &[Span], a: &Paragraph, b: &Paragraph) -> Ordering {
    let a_line = a.first_line();
    let b_line = b.first_line();
    let a_span = &spans[a_line.first_span()];
    let b_span = &spans[b_line.first_span()];

    let d = a_span.ctm.cmp4(&b_span.ctm);
    if d.is_ne() {
        return d;
    }

    let a_angle = a_span.angle();
    let b_angle = b_span.angle();
    if (a_angle - b_angle).abs() > std::f32::consts::FRAC_PI_2 {
        // Give up beyond a quarter turn.
        return Ordering::Equal;
    }
    let angle = (a_angle + b_angle) / 2.0;
    let a_glyph = a_span.first_glyph();
    let b_glyph = b_span.first_glyph();
    let distance = line_distance(a_glyph.x, a_glyph.y, b_glyph.x, b_glyph.y, angle);
    if distance > 0.0 {
        Ordering::Less
    } else if distance < 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}
