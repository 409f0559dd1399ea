//! Box layout for math nodes
//!
//! Every node is measured relative to its math axis (the height of a fraction
//! bar), then drawn left to right with the axis at a given y. Output is the
//! same primitive list figures use, so the vector exporter needs nothing
//! math-specific.

use glam::{DVec2, dvec2};

use super::parse::Node;
use crate::config::RenderOptions;
use crate::errors::MathError;
use crate::render::{Anchor, Label, Polyline, RenderedFigure, text::text_width};

/// Base glyph height, in drawing units.
pub const FONT_SIZE: f64 = 0.45;
const SCRIPT_SCALE: f64 = 0.7;
const FRAC_SCALE: f64 = 0.85;
const MIN_SIZE: f64 = 0.18;
/// Half the height of a text box relative to the glyph size.
const HALF_HEIGHT: f64 = 0.6;
/// Space on each side of an operator, in ems.
const OP_SPACE: f64 = 0.22;

/// Export settings for math SVG.
pub fn svg_options() -> RenderOptions {
    RenderOptions {
        padding: 0.08,
        stroke_width: 1.0,
        ..RenderOptions::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Metrics {
    width: f64,
    /// Extent above the axis
    above: f64,
    /// Extent below the axis
    below: f64,
}

fn scaled(size: f64, factor: f64) -> f64 {
    (size * factor).max(MIN_SIZE)
}

fn measure(node: &Node, size: f64) -> Metrics {
    match node {
        Node::Text(s) => Metrics {
            width: text_width(s, size),
            above: size * HALF_HEIGHT,
            below: size * HALF_HEIGHT,
        },
        Node::Op(s) => Metrics {
            width: text_width(s, size) + 2.0 * OP_SPACE * size,
            above: size * HALF_HEIGHT,
            below: size * HALF_HEIGHT,
        },
        Node::Space(em) => Metrics { width: em * size, ..Metrics::default() },
        Node::Row(nodes) => nodes.iter().fold(Metrics::default(), |acc, n| {
            let m = measure(n, size);
            Metrics {
                width: acc.width + m.width,
                above: acc.above.max(m.above),
                below: acc.below.max(m.below),
            }
        }),
        Node::Frac(num, den) => {
            let inner = scaled(size, FRAC_SCALE);
            let (n, d) = (measure(num, inner), measure(den, inner));
            let gap = frac_gap(size);
            Metrics {
                width: n.width.max(d.width) + 2.0 * frac_pad(size),
                above: gap + n.below + n.above,
                below: gap + d.above + d.below,
            }
        }
        Node::Sqrt { index, body } => {
            let b = measure(body, size);
            let lead = sqrt_lead(index.as_deref(), size);
            Metrics {
                width: lead + radical_width(size) + b.width + size * 0.1,
                above: b.above + rule_gap(size),
                below: b.below,
            }
        }
        Node::Overline(body) => {
            let b = measure(body, size);
            Metrics { above: b.above + rule_gap(size), ..b }
        }
        Node::Scripts { base, sup, sub } => {
            let m = measure(base, size);
            let small = scaled(size, SCRIPT_SCALE);
            let up = sup.as_deref().map(|s| measure(s, small));
            let down = sub.as_deref().map(|s| measure(s, small));
            let script_width = up.map_or(0.0, |u| u.width).max(down.map_or(0.0, |d| d.width));
            Metrics {
                width: m.width + script_width,
                above: up.map_or(m.above, |u| m.above.max(sup_shift(&m) + u.above)),
                below: down.map_or(m.below, |d| m.below.max(sub_shift(&m) + d.below)),
            }
        }
    }
}

fn frac_gap(size: f64) -> f64 {
    size * 0.15
}

fn frac_pad(size: f64) -> f64 {
    size * 0.1
}

fn rule_gap(size: f64) -> f64 {
    size * 0.12
}

fn radical_width(size: f64) -> f64 {
    size * 0.6
}

fn sup_shift(base: &Metrics) -> f64 {
    base.above * 0.75
}

fn sub_shift(base: &Metrics) -> f64 {
    base.below * 0.75
}

/// Horizontal room an index needs left of the radical.
fn sqrt_lead(index: Option<&Node>, size: f64) -> f64 {
    index.map_or(0.0, |i| {
        let w = measure(i, scaled(size, 0.5)).width;
        (w - radical_width(size) * 0.4).max(0.0)
    })
}

/// Draw `node` with its left edge at `at.x` and its axis at `at.y`.
fn draw(node: &Node, size: f64, at: DVec2, fig: &mut RenderedFigure) {
    match node {
        Node::Text(s) => fig.push(Label { position: at, text: s.clone(), anchor: Anchor::Start, size }),
        Node::Op(s) => fig.push(Label {
            position: at + dvec2(OP_SPACE * size, 0.0),
            text: s.clone(),
            anchor: Anchor::Start,
            size,
        }),
        Node::Space(_) => {}
        Node::Row(nodes) => {
            let mut x = at.x;
            for n in nodes {
                draw(n, size, dvec2(x, at.y), fig);
                x += measure(n, size).width;
            }
        }
        Node::Frac(num, den) => {
            let inner = scaled(size, FRAC_SCALE);
            let (n, d) = (measure(num, inner), measure(den, inner));
            let width = measure(node, size).width;
            let gap = frac_gap(size);
            fig.push(Polyline::solid(vec![at, at + dvec2(width, 0.0)]));
            draw(num, inner, at + dvec2((width - n.width) / 2.0, gap + n.below), fig);
            draw(den, inner, at + dvec2((width - d.width) / 2.0, -(gap + d.above)), fig);
        }
        Node::Sqrt { index, body } => {
            let b = measure(body, size);
            let lead = sqrt_lead(index.as_deref(), size);
            let rw = radical_width(size);
            let x = at.x + lead;
            let bottom = at.y - b.below;
            let top = at.y + b.above + rule_gap(size);
            let end = x + rw + b.width + size * 0.1;
            fig.push(Polyline::solid(vec![
                dvec2(x, at.y),
                dvec2(x + rw * 0.15, at.y + size * 0.08),
                dvec2(x + rw * 0.4, bottom),
                dvec2(x + rw, top),
                dvec2(end, top),
            ]));
            if let Some(index) = index.as_deref() {
                draw(index, scaled(size, 0.5), dvec2(at.x, at.y + b.above * 0.6), fig);
            }
            draw(body, size, dvec2(x + rw, at.y), fig);
        }
        Node::Overline(body) => {
            let b = measure(body, size);
            let top = at.y + b.above + rule_gap(size) * 0.5;
            fig.push(Polyline::solid(vec![dvec2(at.x, top), dvec2(at.x + b.width, top)]));
            draw(body, size, at, fig);
        }
        Node::Scripts { base, sup, sub } => {
            let m = measure(base, size);
            let small = scaled(size, SCRIPT_SCALE);
            draw(base, size, at, fig);
            let x = at.x + m.width;
            if let Some(sup) = sup.as_deref() {
                draw(sup, small, dvec2(x, at.y + sup_shift(&m)), fig);
            }
            if let Some(sub) = sub.as_deref() {
                draw(sub, small, dvec2(x, at.y - sub_shift(&m)), fig);
            }
        }
    }
}

/// Lay out a parsed expression with its axis on y = 0.
pub fn layout(node: &Node) -> Result<RenderedFigure, MathError> {
    let mut fig = RenderedFigure::new();
    draw(node, FONT_SIZE, DVec2::ZERO, &mut fig);
    if fig.is_empty() {
        return Err(MathError::Empty);
    }
    if !fig.bbox.is_finite() {
        return Err(MathError::Empty);
    }
    Ok(fig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::parse::parse;

    fn laid(src: &str) -> RenderedFigure {
        layout(&parse(src).unwrap()).unwrap()
    }

    #[test]
    fn text_sits_on_the_axis() {
        let fig = laid("AB");
        let labels: Vec<_> = fig.labels().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].position, DVec2::ZERO);
        assert_eq!(labels[0].text, "AB");
    }

    #[test]
    fn fraction_stacks_around_a_bar() {
        let fig = laid(r"\frac{1}{2}");
        let labels: Vec<_> = fig.labels().collect();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].position.y > 0.0, "numerator above the bar");
        assert!(labels[1].position.y < 0.0, "denominator below the bar");
        assert!(labels[0].size < FONT_SIZE);
        assert_eq!(fig.primitives.len(), 3);
    }

    #[test]
    fn superscript_is_raised_and_smaller() {
        let fig = laid("x^2");
        let labels: Vec<_> = fig.labels().collect();
        assert_eq!(labels[1].text, "2");
        assert!(labels[1].position.y > labels[0].position.y);
        assert!(labels[1].position.x > labels[0].position.x);
        assert!(labels[1].size < labels[0].size);
    }

    #[test]
    fn radical_covers_its_body() {
        let fig = laid(r"\sqrt{2}");
        let body = fig.labels().next().unwrap();
        let top = fig.bbox.max.y;
        assert!(top > body.position.y + body.size / 2.0);
    }

    #[test]
    fn operators_take_extra_width() {
        let plain = laid("ab").bbox.width();
        let spaced = laid("a+b").bbox.width();
        assert!(spaced > plain);
    }

    #[test]
    fn only_spaces_is_empty() {
        assert!(matches!(layout(&parse(r"\,\;").unwrap()), Err(MathError::Empty)));
    }
}
