//! Engine configuration
//!
//! Plain structs with sensible defaults. Every field can be omitted when
//! loading from JSON.

use serde::Deserialize;

use crate::render::defaults;
use crate::sanitize::DEFAULT_MARKER;

/// Options for building and exporting a figure.
///
/// Lengths are in drawing units (centimetres) unless noted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Space around the figure's bounding box
    pub padding: f64,
    /// Output units (SVG user units) per drawing unit
    pub scale: f64,
    /// Stroke width in output units
    pub stroke_width: f64,
    /// Side of the right-angle marker square
    pub marker_size: f64,
    /// Distance from a point to its label
    pub label_offset: f64,
    /// Distance from a segment to its length annotation
    pub distance_offset: f64,
    /// Label height
    pub font_size: f64,
    /// Radius of the dot drawn on each named point
    pub point_radius: f64,
    /// Draw the figure name above the figure
    pub show_title: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            padding: defaults::PADDING,
            scale: defaults::SCALE,
            stroke_width: defaults::STROKE_WIDTH,
            marker_size: defaults::MARKER_SIZE,
            label_offset: defaults::LABEL_OFFSET,
            distance_offset: defaults::DISTANCE_OFFSET,
            font_size: defaults::FONT_SIZE,
            point_radius: defaults::POINT_RADIUS,
            show_title: false,
        }
    }
}

/// Bitmap export settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    /// Maximum width in pixels
    pub width: u32,
    /// Maximum height in pixels
    pub height: u32,
    /// Stroke widths scale with `dpi / 96`
    pub dpi: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self { width: 400, height: 400, dpi: 96 }
    }
}

/// Everything an [`Engine`](crate::Engine) needs to know.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub render: RenderOptions,
    pub raster: RasterOptions,
    /// Number of math spans kept in the render cache
    pub math_cache_capacity: usize,
    /// Payloads declaring more points than this are not rendered
    pub max_points: usize,
    /// Payloads declaring more segments than this are not rendered
    pub max_segments: usize,
    /// `"type"` value identifying schema objects embedded in documents
    pub marker: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            render: RenderOptions::default(),
            raster: RasterOptions::default(),
            math_cache_capacity: 1024,
            max_points: 26,
            max_segments: 128,
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"raster": {"width": 800}, "max_points": 10}"#).unwrap();
        assert_eq!(config.raster.width, 800);
        assert_eq!(config.raster.height, 400);
        assert_eq!(config.max_points, 10);
        assert_eq!(config.render, RenderOptions::default());
        assert_eq!(config.marker, "schema_geometrique");
    }
}
