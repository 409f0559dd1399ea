//! Numeric primitives shared by the layout and rendering stages.
//!
//! Drawing space is y-up with one unit per centimetre. Output space (SVG user
//! units, raster pixels) is y-down. The only way to cross between the two is a
//! [`Scaler`].

use std::fmt;

use glam::{DVec2, dvec2};

/// Error type for invalid numeric values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericError {
    /// Value is NaN
    NaN,
    /// Value is infinite
    Infinite,
    /// Value is zero when non-zero required
    Zero,
    /// Value is negative when positive required
    Negative,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericError::NaN => write!(f, "value is NaN"),
            NumericError::Infinite => write!(f, "value is infinite"),
            NumericError::Zero => write!(f, "value is zero"),
            NumericError::Negative => write!(f, "value is negative"),
        }
    }
}

impl std::error::Error for NumericError {}

/// Reject NaN and infinite values.
pub fn finite(val: f64) -> Result<f64, NumericError> {
    if val.is_nan() {
        Err(NumericError::NaN)
    } else if val.is_infinite() {
        Err(NumericError::Infinite)
    } else {
        Ok(val)
    }
}

/// Axis-aligned bounding box in drawing space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub min: DVec2,
    pub max: DVec2,
}

impl Default for BBox {
    fn default() -> Self {
        Self::new()
    }
}

impl BBox {
    /// Create an empty bounding box (will expand on first point)
    pub fn new() -> Self {
        BBox {
            min: dvec2(f64::MAX, f64::MAX),
            max: dvec2(f64::MIN, f64::MIN),
        }
    }

    /// Check if the bbox is empty (never expanded)
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Expand to include a point
    pub fn expand_point(&mut self, p: DVec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand to include a rectangle defined by center and half extents
    pub fn expand_rect(&mut self, center: DVec2, half: DVec2) {
        self.expand_point(center - half);
        self.expand_point(center + half);
    }

    /// Expand to include another box
    pub fn union(&mut self, other: &BBox) {
        if !other.is_empty() {
            self.expand_point(other.min);
            self.expand_point(other.max);
        }
    }

    /// Grow every side by `margin`
    pub fn padded(&self, margin: f64) -> BBox {
        BBox {
            min: self.min - DVec2::splat(margin),
            max: self.max + DVec2::splat(margin),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) / 2.0
    }

    /// Width / height, with degenerate boxes clamped to a minimal extent
    pub fn aspect_ratio(&self) -> f64 {
        self.width().max(MIN_EXTENT) / self.height().max(MIN_EXTENT)
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

/// Smallest extent a box is given on either axis when exported
pub const MIN_EXTENT: f64 = 0.01;

/// Maps drawing space (y-up) onto output space (y-down).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scaler {
    /// Output units per drawing unit
    pub scale: f64,
    /// Drawing-space x that maps to output x = 0
    pub min_x: f64,
    /// Drawing-space y that maps to output y = 0
    pub max_y: f64,
}

impl Scaler {
    /// Create a Scaler with validation (rejects NaN, infinite, zero, negative)
    pub fn try_new(scale: f64, frame: &BBox) -> Result<Self, NumericError> {
        let scale = finite(scale)?;
        if scale == 0.0 {
            return Err(NumericError::Zero);
        }
        if scale < 0.0 {
            return Err(NumericError::Negative);
        }
        Ok(Scaler {
            scale,
            min_x: finite(frame.min.x)?,
            max_y: finite(frame.max.y)?,
        })
    }

    /// Convert a drawing-space length to output units.
    #[inline]
    pub fn len(&self, l: f64) -> f64 {
        l * self.scale
    }

    /// Convert a drawing-space point to output coordinates (y flipped).
    #[inline]
    pub fn point(&self, p: DVec2) -> DVec2 {
        dvec2((p.x - self.min_x) * self.scale, (self.max_y - p.y) * self.scale)
    }
}

/// Format a number with 6 significant figures, trailing zeros trimmed.
pub fn fmt_num(value: f64) -> String {
    fmt_num_precision(value, 6)
}

/// Format a number with specified significant figures, trailing zeros trimmed.
fn fmt_num_precision(value: f64, sig_figs: i32) -> String {
    if value == 0.0 || !value.is_finite() {
        return "0".to_string();
    }

    let abs_val = value.abs();
    let magnitude = abs_val.log10().floor() as i32;
    let scale = 10_f64.powi(sig_figs - 1 - magnitude);
    let rounded = (value * scale).round() / scale;

    let decimals = (sig_figs - 1 - magnitude).max(0) as usize;
    let s = format!("{:.prec$}", rounded, prec = decimals);
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s.as_str()
    };
    if s == "-0" { "0".to_string() } else { s.to_string() }
}
