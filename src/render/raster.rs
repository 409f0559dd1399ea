//! PNG generation
//!
//! Marks are drawn straight onto a tiny-skia pixmap. Labels use the Hershey
//! stroke font so the bitmap never depends on installed fonts.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use glam::DVec2;
use tiny_skia::{
    Color, FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, Rect, Stroke,
    StrokeDash, Transform,
};

use super::RenderedFigure;
use super::defaults;
use super::primitives::Mark;
use super::svg::frame;
use super::text::hershey_strokes;
use crate::config::RenderOptions;
use crate::errors::RenderError;
use crate::types::Scaler;

/// Reference resolution stroke widths are expressed at.
const BASE_DPI: f64 = 96.0;
/// Largest side accepted for a bitmap.
const MAX_SIDE: u32 = 8192;

/// An encoded PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl RasterImage {
    /// Standard base64 of the PNG bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png)
    }

    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", self.to_base64())
    }
}

/// Rasterize with default render options.
pub fn to_raster(
    fig: &RenderedFigure,
    width: u32,
    height: u32,
    dpi: u32,
) -> Result<RasterImage, RenderError> {
    to_raster_with(fig, &RenderOptions::default(), width, height, dpi)
}

/// Rasterize into at most `width × height` pixels, keeping the figure's aspect
/// ratio.
pub fn to_raster_with(
    fig: &RenderedFigure,
    opts: &RenderOptions,
    width: u32,
    height: u32,
    dpi: u32,
) -> Result<RasterImage, RenderError> {
    if width == 0 || height == 0 || width > MAX_SIDE || height > MAX_SIDE {
        return Err(RenderError::InvalidRasterSize { width, height });
    }
    if fig.is_empty() {
        return Err(RenderError::EmptyFigure);
    }
    if !fig.bbox.is_finite() {
        return Err(RenderError::InvalidBounds);
    }

    let frame = frame(fig, opts.padding);
    let (pw, ph) = fit(frame.aspect_ratio(), width, height);
    let scaler = Scaler::try_new(f64::from(pw) / frame.width(), &frame)
        .map_err(|_| RenderError::InvalidBounds)?;

    let dpi = if dpi == 0 { BASE_DPI } else { f64::from(dpi) };
    let stroke_width =
        if opts.stroke_width > 0.0 { opts.stroke_width } else { defaults::STROKE_WIDTH };
    let painter = Painter {
        scaler,
        stroke_width: (stroke_width * dpi / BASE_DPI) as f32,
        dash: vec![
            (defaults::DASH * dpi / BASE_DPI) as f32,
            (defaults::GAP * dpi / BASE_DPI) as f32,
        ],
    };

    let mut pixmap = Pixmap::new(pw, ph).ok_or(RenderError::InvalidRasterSize { width, height })?;
    pixmap.fill(Color::WHITE);
    for mark in fig.marks() {
        painter.draw(&mut pixmap, &mark);
    }

    let png = pixmap.encode_png().map_err(|e| RenderError::Encode(e.to_string()))?;
    crate::log::debug!(width = pw, height = ph, bytes = png.len(), "raster export");
    Ok(RasterImage { width: pw, height: ph, png })
}

/// Largest size with the given aspect ratio inside `width × height`.
fn fit(aspect: f64, width: u32, height: u32) -> (u32, u32) {
    let box_aspect = f64::from(width) / f64::from(height);
    if aspect >= box_aspect {
        let h = (f64::from(width) / aspect).round().clamp(1.0, f64::from(height));
        (width, h as u32)
    } else {
        let w = (f64::from(height) * aspect).round().clamp(1.0, f64::from(width));
        (w as u32, height)
    }
}

struct Painter {
    scaler: Scaler,
    stroke_width: f32,
    dash: Vec<f32>,
}

impl Painter {
    fn ink() -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(0, 0, 0, 255);
        paint.anti_alias = true;
        paint
    }

    fn stroke(&self, dashed: bool, width: f32) -> Stroke {
        Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            dash: if dashed { StrokeDash::new(self.dash.clone(), 0.0) } else { None },
            ..Default::default()
        }
    }

    fn path(&self, points: &[DVec2], closed: bool) -> Option<Path> {
        let (first, rest) = points.split_first()?;
        let mut pb = PathBuilder::new();
        let p = self.scaler.point(*first);
        pb.move_to(p.x as f32, p.y as f32);
        for q in rest {
            let q = self.scaler.point(*q);
            pb.line_to(q.x as f32, q.y as f32);
        }
        if closed {
            pb.close();
        }
        pb.finish()
    }

    fn draw(&self, pixmap: &mut Pixmap, mark: &Mark) {
        let paint = Self::ink();
        match mark {
            Mark::Path { points, closed, dashed } => {
                if let Some(path) = self.path(points, *closed) {
                    let stroke = self.stroke(*dashed, self.stroke_width);
                    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
                }
            }
            Mark::Ellipse { center, rx, ry, dashed } => {
                let c = self.scaler.point(*center);
                let (rx, ry) = (self.scaler.len(*rx), self.scaler.len(*ry));
                let rect = Rect::from_xywh(
                    (c.x - rx) as f32,
                    (c.y - ry) as f32,
                    (2.0 * rx) as f32,
                    (2.0 * ry) as f32,
                );
                if let Some(path) = rect.and_then(PathBuilder::from_oval) {
                    let stroke = self.stroke(*dashed, self.stroke_width);
                    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
                }
            }
            Mark::Dot { center, radius } => {
                let c = self.scaler.point(*center);
                let r = self.scaler.len(*radius).max(1.0);
                if let Some(path) = PathBuilder::from_circle(c.x as f32, c.y as f32, r as f32) {
                    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                }
            }
            Mark::Text { at, text, anchor, size } => {
                let width = (self.stroke_width * 0.6).max(1.0);
                let stroke = self.stroke(false, width);
                for glyph in hershey_strokes(text, *at, *size, anchor.fraction()) {
                    if let Some(path) = self.path(&glyph, false) {
                        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::primitives::{Label, Polygon};
    use glam::dvec2;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn wide_figure() -> RenderedFigure {
        RenderedFigure::from_primitives([
            Polygon { points: vec![dvec2(0.0, 0.0), dvec2(8.4, 0.0), dvec2(8.4, 2.4)] }.into(),
            Label::centered(dvec2(4.0, 1.0), "8 cm", 0.45).into(),
        ])
    }

    #[test]
    fn encodes_png() {
        let img = to_raster(&wide_figure(), 400, 400, 96).unwrap();
        assert_eq!(&img.png[..8], &PNG_MAGIC);
        assert!(img.data_uri().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn keeps_aspect_ratio() {
        // padded frame is 10 × 4
        let img = to_raster(&wide_figure(), 400, 400, 96).unwrap();
        assert_eq!((img.width, img.height), (400, 160));
    }

    #[test]
    fn fit_prefers_the_limiting_side() {
        assert_eq!(fit(2.0, 400, 400), (400, 200));
        assert_eq!(fit(0.5, 400, 400), (200, 400));
        assert_eq!(fit(1000.0, 400, 400), (400, 1));
    }

    #[test]
    fn rejects_zero_size() {
        let err = to_raster(&wide_figure(), 0, 400, 96).unwrap_err();
        assert!(matches!(err, RenderError::InvalidRasterSize { width: 0, height: 400 }));
    }

    #[test]
    fn rejects_empty_figure() {
        let err = to_raster(&RenderedFigure::new(), 400, 400, 96).unwrap_err();
        assert!(matches!(err, RenderError::EmptyFigure));
    }

    #[test]
    fn zero_dpi_uses_base_resolution() {
        let a = to_raster(&wide_figure(), 200, 200, 0).unwrap();
        let b = to_raster(&wide_figure(), 200, 200, 96).unwrap();
        assert_eq!(a, b);
    }
}
