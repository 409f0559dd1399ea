//! Default sizes and settings (drawing units are centimetres)

pub const PADDING: f64 = 0.8;
/// Output units per centimetre
pub const SCALE: f64 = 40.0;
pub const STROKE_WIDTH: f64 = 2.0;
pub const MARKER_SIZE: f64 = 0.3;
pub const LABEL_OFFSET: f64 = 0.4;
pub const DISTANCE_OFFSET: f64 = 0.5;
pub const FONT_SIZE: f64 = 0.45;
pub const POINT_RADIUS: f64 = 0.06;
/// Half length of the end ticks on distance markers and parallel marks
pub const TICK: f64 = 0.12;
/// Dash and gap length, in output units at 96 dpi
pub const DASH: f64 = 6.0;
pub const GAP: f64 = 4.0;
pub const CIRCLE_RADIUS: f64 = 3.0;
pub const CYLINDER_RADIUS: f64 = 2.0;
pub const CYLINDER_HEIGHT: f64 = 4.0;
/// Vertical radius of cylinder ellipses relative to the radius
pub const CYLINDER_FLATTEN: f64 = 0.15;
pub const PYRAMID_SIDE: f64 = 4.0;
pub const PYRAMID_HEIGHT: f64 = 4.25;
/// Depth of the oblique projection relative to the side
pub const OBLIQUE_DEPTH: f64 = 0.375;
pub const FONT_FAMILY: &str = "Helvetica, Arial, sans-serif";
