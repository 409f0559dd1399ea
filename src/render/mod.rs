//! Figure rendering
//!
//! This module is organized into submodules:
//! - `defaults`: Default sizes and settings
//! - `primitives`: Drawing primitives and the marks they lower to
//! - `figures`: Schema to primitives, one arm per figure type
//! - `text`: Text metrics and stroke fonts
//! - `svg`: Vector export
//! - `raster`: PNG export

pub mod defaults;
pub mod figures;
pub mod primitives;
pub mod raster;
pub mod svg;
pub mod text;

pub use figures::build_figure;
pub use primitives::*;
pub use raster::{RasterImage, to_raster, to_raster_with};
pub use svg::to_vector;

use crate::types::BBox;

/// An ordered list of primitives and their combined bounding box.
///
/// Both exporters read the same list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedFigure {
    pub primitives: Vec<Primitive>,
    pub bbox: BBox,
}

impl RenderedFigure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_primitives(primitives: impl IntoIterator<Item = Primitive>) -> Self {
        let mut fig = Self::new();
        for p in primitives {
            fig.push(p);
        }
        fig
    }

    pub fn push(&mut self, primitive: impl Into<Primitive>) {
        let primitive = primitive.into();
        self.bbox.union(&primitive.bounds());
        self.primitives.push(primitive);
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Every mark of every primitive, in drawing order.
    pub fn marks(&self) -> Vec<Mark> {
        self.primitives.iter().flat_map(|p| p.marks()).collect()
    }

    pub fn angle_markers(&self) -> impl Iterator<Item = &AngleMarker> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::AngleMarker(m) => Some(m),
            _ => None,
        })
    }

    pub fn distance_markers(&self) -> impl Iterator<Item = &DistanceMarker> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::DistanceMarker(m) => Some(m),
            _ => None,
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Label(l) => Some(l),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;

    #[test]
    fn bbox_grows_with_primitives() {
        let mut fig = RenderedFigure::new();
        assert!(fig.bbox.is_empty());
        fig.push(Polyline::solid(vec![dvec2(0.0, 0.0), dvec2(2.0, 1.0)]));
        fig.push(PointMarker { at: dvec2(-1.0, 0.0), radius: 0.5 });
        assert_eq!(fig.bbox.min, dvec2(-1.5, -0.5));
        assert_eq!(fig.bbox.max, dvec2(2.0, 1.0));
        assert_eq!(fig.marks().len(), 2);
    }
}
