//! SVG generation

use glam::{DVec2, dvec2};
use svg::Document;
use svg::node::element::{Circle as SvgCircle, Ellipse as SvgEllipse, Polygon, Polyline, Text};

use super::RenderedFigure;
use super::defaults;
use super::primitives::Mark;
use crate::config::RenderOptions;
use crate::types::{BBox, MIN_EXTENT, Scaler, fmt_num};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const INK: &str = "black";

/// The padded frame a figure is exported in, never empty.
pub fn frame(fig: &RenderedFigure, padding: f64) -> BBox {
    let mut bbox = fig.bbox;
    if bbox.is_empty() || !bbox.is_finite() {
        bbox = BBox::new();
        bbox.expand_point(DVec2::ZERO);
    }
    let padding = if padding.is_finite() { padding.max(0.0) } else { defaults::PADDING };
    let mut padded = bbox.padded(padding);
    // keep degenerate boxes exportable
    if padded.width() < MIN_EXTENT {
        padded.expand_rect(padded.center(), dvec2(MIN_EXTENT / 2.0, 0.0));
    }
    if padded.height() < MIN_EXTENT {
        padded.expand_rect(padded.center(), dvec2(0.0, MIN_EXTENT / 2.0));
    }
    padded
}

fn scaler_for(frame: &BBox, scale: f64) -> Scaler {
    Scaler::try_new(scale, frame)
        .or_else(|_| Scaler::try_new(defaults::SCALE, frame))
        .unwrap_or(Scaler { scale: defaults::SCALE, min_x: 0.0, max_y: 0.0 })
}

fn points_attr(scaler: &Scaler, points: &[DVec2]) -> String {
    points
        .iter()
        .map(|p| {
            let q = scaler.point(*p);
            format!("{},{}", fmt_num(q.x), fmt_num(q.y))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Export a figure as an SVG fragment (no XML declaration or doctype).
pub fn to_vector(fig: &RenderedFigure, opts: &RenderOptions) -> String {
    let frame = frame(fig, opts.padding);
    let scaler = scaler_for(&frame, opts.scale);
    let width = scaler.len(frame.width());
    let height = scaler.len(frame.height());
    let stroke = fmt_num(if opts.stroke_width > 0.0 { opts.stroke_width } else { defaults::STROKE_WIDTH });
    let dash = format!("{},{}", fmt_num(defaults::DASH), fmt_num(defaults::GAP));

    let mut doc = Document::new()
        .set("xmlns", SVG_NS)
        .set("viewBox", format!("0 0 {} {}", fmt_num(width), fmt_num(height)))
        .set("width", fmt_num(width))
        .set("height", fmt_num(height));

    for mark in fig.marks() {
        doc = match mark {
            Mark::Path { points, closed, dashed } => {
                let attr = points_attr(&scaler, &points);
                if closed {
                    let mut el = Polygon::new()
                        .set("points", attr)
                        .set("fill", "none")
                        .set("stroke", INK)
                        .set("stroke-width", stroke.as_str())
                        .set("stroke-linejoin", "round");
                    if dashed {
                        el = el.set("stroke-dasharray", dash.as_str());
                    }
                    doc.add(el)
                } else {
                    let mut el = Polyline::new()
                        .set("points", attr)
                        .set("fill", "none")
                        .set("stroke", INK)
                        .set("stroke-width", stroke.as_str())
                        .set("stroke-linejoin", "round")
                        .set("stroke-linecap", "round");
                    if dashed {
                        el = el.set("stroke-dasharray", dash.as_str());
                    }
                    doc.add(el)
                }
            }
            Mark::Ellipse { center, rx, ry, dashed } => {
                let c = scaler.point(center);
                let mut el = SvgEllipse::new()
                    .set("cx", fmt_num(c.x))
                    .set("cy", fmt_num(c.y))
                    .set("rx", fmt_num(scaler.len(rx)))
                    .set("ry", fmt_num(scaler.len(ry)))
                    .set("fill", "none")
                    .set("stroke", INK)
                    .set("stroke-width", stroke.as_str());
                if dashed {
                    el = el.set("stroke-dasharray", dash.as_str());
                }
                doc.add(el)
            }
            Mark::Dot { center, radius } => {
                let c = scaler.point(center);
                doc.add(
                    SvgCircle::new()
                        .set("cx", fmt_num(c.x))
                        .set("cy", fmt_num(c.y))
                        .set("r", fmt_num(scaler.len(radius)))
                        .set("fill", INK),
                )
            }
            Mark::Text { at, text, anchor, size } => {
                let c = scaler.point(at);
                doc.add(
                    Text::new(text)
                        .set("x", fmt_num(c.x))
                        .set("y", fmt_num(c.y))
                        .set("font-family", defaults::FONT_FAMILY)
                        .set("font-size", fmt_num(scaler.len(size)))
                        .set("text-anchor", anchor.svg_value())
                        .set("dominant-baseline", "central")
                        .set("fill", INK),
                )
            }
        };
    }

    crate::log::debug!(width, height, "vector export");
    strip_preamble(&doc.to_string()).trim_end().to_string()
}

/// Drop a leading `<?xml …?>` declaration and `<!DOCTYPE …>` so the output
/// embeds as a fragment.
pub fn strip_preamble(svg: &str) -> &str {
    let mut rest = svg.trim_start();
    loop {
        let skip = if rest.starts_with("<?xml") {
            rest.find("?>").map(|i| i + 2)
        } else if rest.starts_with("<!DOCTYPE") {
            rest.find('>').map(|i| i + 1)
        } else {
            None
        };
        match skip {
            Some(n) => rest = rest[n..].trim_start(),
            None => return rest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::primitives::{Label, Polygon as PolygonPrim};
    use insta::assert_snapshot;

    fn triangle() -> RenderedFigure {
        RenderedFigure::from_primitives([
            PolygonPrim { points: vec![dvec2(0.0, 0.0), dvec2(4.0, 0.0), dvec2(0.0, 3.0)] }.into(),
            Label::centered(dvec2(2.0, 1.0), "A & B", 0.5).into(),
        ])
    }

    #[test]
    fn fragment_has_no_preamble() {
        let svg = to_vector(&triangle(), &RenderOptions::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(!svg.contains("<?xml"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn viewbox_is_padded_bbox() {
        let opts = RenderOptions { padding: 1.0, scale: 10.0, ..RenderOptions::default() };
        let fig = RenderedFigure::from_primitives([PolygonPrim {
            points: vec![dvec2(0.0, 0.0), dvec2(4.0, 0.0), dvec2(0.0, 3.0)],
        }
        .into()]);
        let svg = to_vector(&fig, &opts);
        assert!(svg.contains(r#"viewBox="0 0 60 50""#), "{svg}");
        // (0, 0) lands at (10, 40) once padded and flipped
        assert!(svg.contains("10,40"), "{svg}");
    }

    #[test]
    fn text_is_escaped() {
        let svg = to_vector(&triangle(), &RenderOptions::default());
        assert!(svg.contains("A &amp; B"), "{svg}");
    }

    #[test]
    fn empty_figure_still_exports() {
        let svg = to_vector(&RenderedFigure::new(), &RenderOptions::default());
        assert!(svg.starts_with("<svg"));
    }

    #[test]
    fn preamble_is_stripped() {
        assert_snapshot!(
            strip_preamble("<?xml version=\"1.0\"?>\n<!DOCTYPE svg>\n<svg/>"),
            @"<svg/>"
        );
    }
}
