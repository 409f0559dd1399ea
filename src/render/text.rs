//! Text metrics and stroke fonts

use glam::{DVec2, dvec2};
use vector_text::{HersheyFont, VectorFont, render_text};

/// Proportional character widths, in hundredths of the average width.
#[rustfmt::skip]
pub const AW_CHAR: [u8; 95] = [
    45,  55,  62, 115,  90, 132, 125,  40,
    55,  55,  71, 115,  45,  48,  45,  50,
    91,  91,  91,  91,  91,  91,  91,  91,
    91,  91,  50,  50, 120, 120, 120,  78,
   142, 102, 105, 110, 115, 105,  98, 105,
   125,  58,  58, 107,  95, 145, 125, 115,
    95, 115, 107,  95,  97, 118, 102, 150,
   100,  93, 100,  58,  50,  58, 119,  72,
    72,  86,  92,  80,  92,  85,  52,  92,
    92,  47,  47,  88,  48, 135,  92,  86,
    92,  92,  69,  75,  58,  92,  80, 121,
    81,  80,  76,  91,  49,  91, 118,
];

/// Average character width relative to the font size.
const CHAR_WIDTH: f64 = 0.57;

/// Sum of proportional widths, non-ASCII characters counting as 100.
pub fn text_length(text: &str) -> u32 {
    text.chars()
        .map(|c| {
            if (' '..='~').contains(&c) {
                AW_CHAR[(c as usize) - 0x20] as u32
            } else {
                100
            }
        })
        .sum()
}

/// Estimated width of `text` drawn at height `size`.
pub fn text_width(text: &str, size: f64) -> f64 {
    text_length(text) as f64 * 0.01 * CHAR_WIDTH * size
}

/// Hershey units from cap top to baseline.
const HERSHEY_EM: f64 = 21.0;
/// Hershey y of the middle of a capital letter.
const HERSHEY_MIDDLE: f64 = -1.5;

/// Strokes for `text` in the Hershey simplex font, in drawing space (y-up).
///
/// The text is scaled so capitals are `size` tall and positioned with its
/// vertical middle on `at.y`. `anchor` is 0 for start, 0.5 for middle and 1
/// for end. Characters the font does not cover are skipped.
pub fn hershey_strokes(text: &str, at: DVec2, size: f64, anchor: f64) -> Vec<Vec<DVec2>> {
    let points = render_text(text, VectorFont::HersheyFont(HersheyFont::Romans));
    if points.is_empty() {
        return Vec::new();
    }
    let unit = size / HERSHEY_EM;
    let (min_x, max_x) = points
        .iter()
        .fold((i16::MAX, i16::MIN), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
    let width = f64::from(max_x - min_x) * unit;
    let origin = dvec2(at.x - width * anchor, at.y);

    let mut strokes: Vec<Vec<DVec2>> = Vec::new();
    for p in &points {
        let q = origin
            + dvec2(
                f64::from(p.x - min_x) * unit,
                -(f64::from(p.y) - HERSHEY_MIDDLE) * unit,
            );
        match strokes.last_mut() {
            Some(stroke) if p.pen => stroke.push(q),
            _ => strokes.push(vec![q]),
        }
    }
    strokes.retain(|s| s.len() > 1);
    strokes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_are_proportional() {
        assert_eq!(text_length("A"), 102);
        assert_eq!(text_length("i"), 47);
        assert_eq!(text_length("π"), 100);
        assert!(text_width("8 cm", 1.0) > text_width("8", 1.0));
    }

    #[test]
    fn hershey_text_is_centred() {
        let strokes = hershey_strokes("AB", dvec2(10.0, 5.0), 1.0, 0.5);
        assert!(!strokes.is_empty());
        let xs: Vec<f64> = strokes.iter().flatten().map(|p| p.x).collect();
        let lo = xs.iter().copied().fold(f64::MAX, f64::min);
        let hi = xs.iter().copied().fold(f64::MIN, f64::max);
        assert!(((lo + hi) / 2.0 - 10.0).abs() < 1e-9);
        for p in strokes.iter().flatten() {
            assert!((p.y - 5.0).abs() < 1.0);
        }
    }

    #[test]
    fn unsupported_characters_are_skipped() {
        assert!(hershey_strokes("≤", DVec2::ZERO, 1.0, 0.0).is_empty());
    }
}
