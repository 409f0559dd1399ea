//! Drawing primitives
//!
//! Every primitive lowers to a handful of [`Mark`]s. The vector and raster
//! exporters only ever see marks, so both formats draw exactly the same thing.

use enum_dispatch::enum_dispatch;
use glam::{DVec2, dvec2};

use super::defaults;
use super::text::text_width;
use crate::types::BBox;

/// Horizontal text alignment relative to the label position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    Start,
    #[default]
    Middle,
    End,
}

impl Anchor {
    /// Fraction of the text width lying left of the anchor point.
    pub fn fraction(self) -> f64 {
        match self {
            Anchor::Start => 0.0,
            Anchor::Middle => 0.5,
            Anchor::End => 1.0,
        }
    }

    pub fn svg_value(self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        }
    }
}

/// The lowest-level drawing instruction, in drawing space.
#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    Path {
        points: Vec<DVec2>,
        closed: bool,
        dashed: bool,
    },
    Ellipse {
        center: DVec2,
        rx: f64,
        ry: f64,
        dashed: bool,
    },
    Dot {
        center: DVec2,
        radius: f64,
    },
    /// Text whose vertical middle sits on `at.y`
    Text {
        at: DVec2,
        text: String,
        anchor: Anchor,
        size: f64,
    },
}

impl Mark {
    fn solid(points: Vec<DVec2>) -> Self {
        Mark::Path { points, closed: false, dashed: false }
    }

    pub fn bounds(&self) -> BBox {
        let mut b = BBox::new();
        match self {
            Mark::Path { points, .. } => points.iter().for_each(|p| b.expand_point(*p)),
            Mark::Ellipse { center, rx, ry, .. } => b.expand_rect(*center, dvec2(*rx, *ry)),
            Mark::Dot { center, radius } => b.expand_rect(*center, DVec2::splat(*radius)),
            Mark::Text { at, text, anchor, size } => {
                let w = text_width(text, *size);
                let left = at.x - w * anchor.fraction();
                b.expand_point(dvec2(left, at.y - size / 2.0));
                b.expand_point(dvec2(left + w, at.y + size / 2.0));
            }
        }
        b
    }
}

/// Common behavior for all primitives
#[enum_dispatch]
pub trait Draw {
    /// Lower to marks
    fn marks(&self) -> Vec<Mark>;

    /// Extent in drawing space
    fn bounds(&self) -> BBox {
        let mut b = BBox::new();
        for m in self.marks() {
            b.union(&m.bounds());
        }
        b
    }
}

/// An open chain of segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub points: Vec<DVec2>,
    pub dashed: bool,
}

impl Polyline {
    pub fn solid(points: Vec<DVec2>) -> Self {
        Self { points, dashed: false }
    }

    pub fn dashed(points: Vec<DVec2>) -> Self {
        Self { points, dashed: true }
    }
}

impl Draw for Polyline {
    fn marks(&self) -> Vec<Mark> {
        vec![Mark::Path { points: self.points.clone(), closed: false, dashed: self.dashed }]
    }
}

/// A closed outline.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub points: Vec<DVec2>,
}

impl Draw for Polygon {
    fn marks(&self) -> Vec<Mark> {
        vec![Mark::Path { points: self.points.clone(), closed: true, dashed: false }]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub center: DVec2,
    pub radius: f64,
}

impl Draw for Circle {
    fn marks(&self) -> Vec<Mark> {
        vec![Mark::Ellipse {
            center: self.center,
            rx: self.radius,
            ry: self.radius,
            dashed: false,
        }]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ellipse {
    pub center: DVec2,
    pub rx: f64,
    pub ry: f64,
    pub dashed: bool,
}

impl Draw for Ellipse {
    fn marks(&self) -> Vec<Mark> {
        vec![Mark::Ellipse { center: self.center, rx: self.rx, ry: self.ry, dashed: self.dashed }]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub position: DVec2,
    pub text: String,
    pub anchor: Anchor,
    pub size: f64,
}

impl Label {
    pub fn centered(position: DVec2, text: impl Into<String>, size: f64) -> Self {
        Self { position, text: text.into(), anchor: Anchor::Middle, size }
    }
}

impl Draw for Label {
    fn marks(&self) -> Vec<Mark> {
        vec![Mark::Text {
            at: self.position,
            text: self.text.clone(),
            anchor: self.anchor,
            size: self.size,
        }]
    }
}

/// Angle annotation at `vertex` between unit directions `u1` and `u2`.
///
/// A right angle is the small square corner; any other angle is an arc.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleMarker {
    pub vertex: DVec2,
    pub u1: DVec2,
    pub u2: DVec2,
    pub size: f64,
    pub right: bool,
}

impl AngleMarker {
    /// Marker at `vertex` between the directions towards `p1` and `p2`.
    /// `None` if either neighbour coincides with the vertex.
    pub fn between(vertex: DVec2, p1: DVec2, p2: DVec2, size: f64, right: bool) -> Option<Self> {
        let u1 = (p1 - vertex).try_normalize()?;
        let u2 = (p2 - vertex).try_normalize()?;
        Some(Self { vertex, u1, u2, size, right })
    }
}

/// Number of segments in an angle arc.
const ARC_STEPS: usize = 12;

impl Draw for AngleMarker {
    fn marks(&self) -> Vec<Mark> {
        let a = self.vertex + self.u1 * self.size;
        let b = self.vertex + self.u2 * self.size;
        if self.right {
            let corner = self.vertex + (self.u1 + self.u2) * self.size;
            return vec![Mark::solid(vec![a, corner, b])];
        }
        let start = self.u1.y.atan2(self.u1.x);
        let mut sweep = self.u2.y.atan2(self.u2.x) - start;
        while sweep > std::f64::consts::PI {
            sweep -= std::f64::consts::TAU;
        }
        while sweep < -std::f64::consts::PI {
            sweep += std::f64::consts::TAU;
        }
        let radius = self.size * 1.5;
        let points = (0..=ARC_STEPS)
            .map(|i| {
                let t = start + sweep * i as f64 / ARC_STEPS as f64;
                self.vertex + dvec2(t.cos(), t.sin()) * radius
            })
            .collect();
        vec![Mark::solid(points)]
    }
}

/// Length annotation: a line parallel to `p1`→`p2` at `offset`, with end
/// ticks and a centred label.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMarker {
    pub p1: DVec2,
    pub p2: DVec2,
    pub label: String,
    /// Signed distance along the segment's left normal
    pub offset: f64,
    pub size: f64,
}

impl DistanceMarker {
    /// Unit normal on the side of the marker, or `None` for a degenerate
    /// segment.
    pub fn normal(&self) -> Option<DVec2> {
        let dir = (self.p2 - self.p1).try_normalize()?;
        Some(dir.perp() * self.offset.signum())
    }

    /// Where the label sits.
    pub fn label_position(&self) -> DVec2 {
        let mid = (self.p1 + self.p2) / 2.0;
        match self.normal() {
            Some(n) => mid + n * (self.offset.abs() + self.size * 0.8),
            None => mid,
        }
    }
}

impl Draw for DistanceMarker {
    fn marks(&self) -> Vec<Mark> {
        let Some(n) = self.normal() else {
            return Vec::new();
        };
        let shift = n * self.offset.abs();
        let a = self.p1 + shift;
        let b = self.p2 + shift;
        let tick = n * defaults::TICK;
        vec![
            Mark::solid(vec![a, b]),
            Mark::solid(vec![a - tick, a + tick]),
            Mark::solid(vec![b - tick, b + tick]),
            Mark::Text {
                at: self.label_position(),
                text: self.label.clone(),
                anchor: Anchor::Middle,
                size: self.size,
            },
        ]
    }
}

/// The dot drawn on a named point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointMarker {
    pub at: DVec2,
    pub radius: f64,
}

impl Draw for PointMarker {
    fn marks(&self) -> Vec<Mark> {
        vec![Mark::Dot { center: self.at, radius: self.radius }]
    }
}

/// Any drawing primitive.
#[enum_dispatch(Draw)]
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Polyline,
    Polygon,
    Circle,
    Ellipse,
    Label,
    AngleMarker,
    DistanceMarker,
    PointMarker,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_angle_is_a_square_corner() {
        let m = AngleMarker::between(
            DVec2::ZERO,
            dvec2(0.0, 4.0),
            dvec2(3.0, 0.0),
            0.3,
            true,
        )
        .unwrap();
        let marks = m.marks();
        let Mark::Path { points, .. } = &marks[0] else {
            panic!("expected a path");
        };
        assert_eq!(points, &vec![dvec2(0.0, 0.3), dvec2(0.3, 0.3), dvec2(0.3, 0.0)]);
    }

    #[test]
    fn degenerate_angle_is_rejected() {
        assert!(AngleMarker::between(DVec2::ZERO, DVec2::ZERO, DVec2::X, 0.3, true).is_none());
    }

    #[test]
    fn distance_marker_is_offset_along_normal() {
        let d = DistanceMarker {
            p1: DVec2::ZERO,
            p2: dvec2(4.0, 0.0),
            label: "4 cm".into(),
            offset: 0.5,
            size: 0.4,
        };
        let marks = d.marks();
        assert_eq!(marks.len(), 4);
        assert_eq!(
            marks[0],
            Mark::Path {
                points: vec![dvec2(0.0, 0.5), dvec2(4.0, 0.5)],
                closed: false,
                dashed: false
            }
        );
        assert!(d.label_position().y > 0.5);
    }

    #[test]
    fn flipped_offset_goes_the_other_way() {
        let d = DistanceMarker {
            p1: DVec2::ZERO,
            p2: dvec2(4.0, 0.0),
            label: "4 cm".into(),
            offset: -0.5,
            size: 0.4,
        };
        assert!(d.label_position().y < -0.5);
    }

    #[test]
    fn bounds_through_dispatch() {
        let p: Primitive = Circle { center: dvec2(1.0, 1.0), radius: 2.0 }.into();
        let b = p.bounds();
        assert_eq!(b.min, dvec2(-1.0, -1.0));
        assert_eq!(b.max, dvec2(3.0, 3.0));
    }

    #[test]
    fn label_bounds_follow_anchor() {
        let start = Label {
            position: DVec2::ZERO,
            text: "AB".into(),
            anchor: Anchor::Start,
            size: 1.0,
        };
        let b = start.bounds();
        assert_eq!(b.min.x, 0.0);
        assert!(b.max.x > 0.0);
    }
}
