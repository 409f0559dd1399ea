//! Schema to primitives
//!
//! [`build_figure`] is the single place that knows how each figure type is
//! drawn; both exporters consume what it produces.

use glam::{DVec2, dvec2};

use super::defaults;
use super::primitives::{
    Anchor, AngleMarker, Circle, DistanceMarker, Ellipse, Label, PointMarker, Polygon, Polyline,
};
use super::RenderedFigure;
use crate::config::RenderOptions;
use crate::errors::RenderError;
use crate::schema::{FigureType, PointLabel, Schema, SegmentRef};
use crate::types::fmt_num;

/// Minimum number of coordinated points for an outline.
const MIN_OUTLINE_POINTS: usize = 3;

/// Largest `|cos|` between a corner's two edges that still counts as square.
const SQUARE_CORNER_COS: f64 = 0.05;

/// Build the primitive list for a fully coordinated schema.
pub fn build_figure(schema: &Schema, opts: &RenderOptions) -> Result<RenderedFigure, RenderError> {
    if let Some(label) = schema.uncovered().first() {
        return Err(RenderError::MissingCoordinate(*label));
    }

    let mut b = Builder::new(schema, opts);
    match schema.figure_type {
        FigureType::Triangle
        | FigureType::RightTriangle
        | FigureType::Square
        | FigureType::Rectangle
        | FigureType::Parallelogram
        | FigureType::GenericPolygon => b.polygon()?,
        FigureType::Circle => b.circle(),
        FigureType::Cylinder => b.cylinder(),
        FigureType::Pyramid => b.pyramid()?,
    }
    b.free_segments();
    b.angle_marks();
    b.distances();
    b.relations();
    b.points();
    b.title();

    if b.fig.is_empty() {
        return Err(RenderError::EmptyFigure);
    }
    if !b.fig.bbox.is_finite() {
        return Err(RenderError::InvalidBounds);
    }
    crate::log::debug!(
        figure = ?schema.figure_type,
        primitives = b.fig.primitives.len(),
        "figure built"
    );
    Ok(b.fig)
}

struct Builder<'a> {
    schema: &'a Schema,
    opts: &'a RenderOptions,
    fig: RenderedFigure,
    /// Closed outline in drawing order, when the figure has one
    outline: Vec<PointLabel>,
    /// Segments already drawn by the figure itself
    edges: Vec<SegmentRef>,
    /// Vertices that already carry a right-angle marker
    marked: Vec<PointLabel>,
}

impl<'a> Builder<'a> {
    fn new(schema: &'a Schema, opts: &'a RenderOptions) -> Self {
        Self {
            schema,
            opts,
            fig: RenderedFigure::new(),
            outline: Vec::new(),
            edges: Vec::new(),
            marked: Vec::new(),
        }
    }

    fn at(&self, label: PointLabel) -> DVec2 {
        self.schema.coord(label).unwrap_or(DVec2::ZERO)
    }

    /// Centroid of every coordinated point, used to push annotations outwards.
    fn centroid(&self) -> DVec2 {
        let coords = &self.schema.coordinates;
        if coords.is_empty() {
            return DVec2::ZERO;
        }
        coords.values().copied().sum::<DVec2>() / coords.len() as f64
    }

    fn cm(value: f64) -> String {
        format!("{} cm", fmt_num(value))
    }

    fn close_outline(&mut self, labels: Vec<PointLabel>) {
        for (i, a) in labels.iter().enumerate() {
            let b = labels[(i + 1) % labels.len()];
            self.edges.push(SegmentRef(*a, b));
        }
        self.outline = labels;
    }

    // ---------------------------------------------------------------------
    // Figure bodies
    // ---------------------------------------------------------------------

    fn polygon(&mut self) -> Result<(), RenderError> {
        let vertices = self.schema.vertices();
        if vertices.len() < MIN_OUTLINE_POINTS {
            return Err(RenderError::NotRenderable {
                figure: self.schema.figure_type,
                needed: MIN_OUTLINE_POINTS,
                got: vertices.len(),
            });
        }
        self.fig.push(Polygon { points: vertices.iter().map(|(_, c)| *c).collect() });
        self.close_outline(vertices.into_iter().map(|(l, _)| l).collect());

        match self.schema.figure_type {
            FigureType::RightTriangle => {
                let schema = self.schema;
                if !schema.angle_marks.iter().any(|m| m.right) {
                    if let Some(&corner) = schema.points.get(1) {
                        self.right_angle(corner);
                    }
                }
            }
            FigureType::Rectangle | FigureType::Square => {
                for corner in self.outline.clone() {
                    if self.is_square_corner(corner) {
                        self.right_angle(corner);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn circle(&mut self) {
        let center = self.schema.vertices().first().map_or(DVec2::ZERO, |(_, c)| *c);
        let radius = positive(self.schema.params.radius).unwrap_or(defaults::CIRCLE_RADIUS);
        self.fig.push(Circle { center, radius });

        let edge = center + DVec2::X * radius;
        self.fig.push(Polyline::dashed(vec![center, edge]));
        let text = match self.schema.params.radius {
            Some(r) => format!("r = {}", Self::cm(r)),
            None => "r".to_string(),
        };
        self.fig.push(Label::centered(
            (center + edge) / 2.0 + DVec2::Y * self.opts.font_size,
            text,
            self.opts.font_size,
        ));
    }

    fn cylinder(&mut self) {
        let base = self.schema.vertices().first().map_or(DVec2::ZERO, |(_, c)| *c);
        let radius = positive(self.schema.params.radius).unwrap_or(defaults::CYLINDER_RADIUS);
        let height = positive(self.schema.params.height).unwrap_or(defaults::CYLINDER_HEIGHT);
        let ry = radius * defaults::CYLINDER_FLATTEN;
        let top = base + DVec2::Y * height;

        self.fig.push(Ellipse { center: base, rx: radius, ry, dashed: false });
        self.fig.push(Ellipse { center: top, rx: radius, ry, dashed: false });
        let left = DVec2::X * -radius;
        let right = DVec2::X * radius;
        self.fig.push(Polyline::solid(vec![base + left, top + left]));
        self.fig.push(Polyline::solid(vec![base + right, top + right]));

        let size = self.opts.font_size;
        if let Some(h) = self.schema.params.height {
            self.fig.push(Label {
                position: (base + top) / 2.0 + right + DVec2::X * self.opts.label_offset,
                text: format!("h = {}", Self::cm(h)),
                anchor: Anchor::Start,
                size,
            });
        }
        if let Some(r) = self.schema.params.radius {
            self.fig.push(Polyline::dashed(vec![top, top + right]));
            self.fig.push(Label::centered(
                top + right / 2.0 + DVec2::Y * (ry + size),
                format!("r = {}", Self::cm(r)),
                size,
            ));
        }
    }

    fn pyramid(&mut self) -> Result<(), RenderError> {
        let vertices = self.schema.vertices();
        let (corners, apex) = if vertices.len() >= 5 {
            let corners: Vec<DVec2> = vertices[..4].iter().map(|(_, c)| *c).collect();
            let labels: Vec<PointLabel> = vertices[..5].iter().map(|(l, _)| *l).collect();
            for i in 0..4 {
                self.edges.push(SegmentRef(labels[i], labels[(i + 1) % 4]));
                self.edges.push(SegmentRef(labels[i], labels[4]));
            }
            (corners, vertices[4].1)
        } else if vertices.is_empty() {
            synthesized_pyramid(
                positive(self.schema.params.side).unwrap_or(defaults::PYRAMID_SIDE),
                positive(self.schema.params.height).unwrap_or(defaults::PYRAMID_HEIGHT),
            )
        } else {
            return Err(RenderError::NotRenderable {
                figure: FigureType::Pyramid,
                needed: 5,
                got: vertices.len(),
            });
        };

        // The fourth corner is at the back: its edges are hidden.
        let [a, b, c, d] = [corners[0], corners[1], corners[2], corners[3]];
        self.fig.push(Polyline::solid(vec![a, b, c]));
        self.fig.push(Polyline::dashed(vec![c, d, a]));
        for corner in [a, b, c] {
            self.fig.push(Polyline::solid(vec![corner, apex]));
        }
        self.fig.push(Polyline::dashed(vec![d, apex]));

        if let Some(h) = self.schema.params.height {
            let foot = (a + b + c + d) / 4.0;
            self.fig.push(Polyline::dashed(vec![apex, foot]));
            self.fig.push(Label {
                position: (apex + foot) / 2.0 + DVec2::X * self.opts.label_offset,
                text: format!("h = {}", Self::cm(h)),
                anchor: Anchor::Start,
                size: self.opts.font_size,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Annotations
    // ---------------------------------------------------------------------

    /// Two neighbours of `vertex`: its outline neighbours, or else the first
    /// two other coordinated points.
    fn neighbours(&self, vertex: PointLabel) -> Option<(DVec2, DVec2)> {
        if let Some(i) = self.outline.iter().position(|l| *l == vertex) {
            let n = self.outline.len();
            let prev = self.outline[(i + n - 1) % n];
            let next = self.outline[(i + 1) % n];
            return Some((self.at(prev), self.at(next)));
        }
        let v = self.at(vertex);
        let mut others = self
            .schema
            .points
            .iter()
            .chain(self.schema.coordinates.keys())
            .filter(|l| **l != vertex)
            .map(|l| self.at(*l))
            .filter(|p| p.distance(v) > f64::EPSILON);
        let first = others.next()?;
        let second = others.find(|p| p.distance(first) > f64::EPSILON)?;
        Some((first, second))
    }

    fn is_square_corner(&self, vertex: PointLabel) -> bool {
        let Some((p1, p2)) = self.neighbours(vertex) else {
            return false;
        };
        let v = self.at(vertex);
        match ((p1 - v).try_normalize(), (p2 - v).try_normalize()) {
            (Some(u1), Some(u2)) => u1.dot(u2).abs() <= SQUARE_CORNER_COS,
            _ => false,
        }
    }

    fn right_angle(&mut self, vertex: PointLabel) {
        if self.marked.contains(&vertex) {
            return;
        }
        let Some((p1, p2)) = self.neighbours(vertex) else {
            return;
        };
        if let Some(m) = AngleMarker::between(self.at(vertex), p1, p2, self.opts.marker_size, true) {
            self.fig.push(m);
            self.marked.push(vertex);
        }
    }

    fn angle_marks(&mut self) {
        let schema = self.schema;
        for mark in &schema.angle_marks {
            if mark.right {
                self.right_angle(mark.vertex);
            } else if let Some((p1, p2)) = self.neighbours(mark.vertex) {
                if let Some(m) =
                    AngleMarker::between(self.at(mark.vertex), p1, p2, self.opts.marker_size, false)
                {
                    self.fig.push(m);
                }
            }
        }
    }

    /// Segments the figure body has not drawn already.
    fn free_segments(&mut self) {
        let mut drawn = self.edges.clone();
        let schema = self.schema;
        let pairs = schema
            .segments
            .iter()
            .map(|s| s.as_ref())
            .chain(schema.parallels.iter().flat_map(|p| [p.0, p.1]))
            .chain(schema.perpendiculars.iter().flat_map(|p| [p.0, p.1]));
        for seg in pairs {
            if drawn.contains(&seg) {
                continue;
            }
            self.fig.push(Polyline::solid(vec![self.at(seg.0), self.at(seg.1)]));
            drawn.push(seg);
        }
    }

    fn distances(&mut self) {
        let centroid = self.centroid();
        for seg in &self.schema.segments {
            let Some(length) = seg.length else {
                continue;
            };
            let (p1, p2) = (self.at(seg.a), self.at(seg.b));
            let Some(dir) = (p2 - p1).try_normalize() else {
                continue;
            };
            let mid = (p1 + p2) / 2.0;
            let outward = if (mid - centroid).dot(dir.perp()) < 0.0 { -1.0 } else { 1.0 };
            self.fig.push(DistanceMarker {
                p1,
                p2,
                label: Self::cm(length),
                offset: outward * self.opts.distance_offset,
                size: self.opts.font_size,
            });
        }
    }

    fn relations(&mut self) {
        let tick = defaults::TICK;
        for (i, pair) in self.schema.parallels.iter().enumerate() {
            for seg in [pair.0, pair.1] {
                let (p1, p2) = (self.at(seg.0), self.at(seg.1));
                let Some(dir) = (p2 - p1).try_normalize() else {
                    continue;
                };
                let mid = (p1 + p2) / 2.0;
                let n = dir.perp();
                // one slanted tick per relation index so pairs can be told apart
                let count = i + 1;
                for k in 0..count {
                    let shift = dir * tick * (k as f64 - (count as f64 - 1.0) / 2.0);
                    let c = mid + shift;
                    self.fig.push(Polyline::solid(vec![
                        c - n * tick - dir * tick / 2.0,
                        c + n * tick + dir * tick / 2.0,
                    ]));
                }
            }
        }
        for pair in &self.schema.perpendiculars {
            let (p1, p2) = (self.at(pair.0.0), self.at(pair.0.1));
            let Some(dir) = (p2 - p1).try_normalize() else {
                continue;
            };
            let mid = (p1 + p2) / 2.0;
            let other = (self.at(pair.1.0) + self.at(pair.1.1)) / 2.0;
            let n = if (other - mid).dot(dir.perp()) < 0.0 { -dir.perp() } else { dir.perp() };
            self.fig.push(AngleMarker {
                vertex: mid,
                u1: dir,
                u2: n,
                size: self.opts.marker_size,
                right: true,
            });
        }
    }

    fn points(&mut self) {
        let centroid = self.centroid();
        for label in &self.schema.points {
            let Some(at) = self.schema.coord(*label) else {
                continue;
            };
            self.fig.push(PointMarker { at, radius: self.opts.point_radius });
            let away = (at - centroid)
                .try_normalize()
                .unwrap_or(dvec2(-1.0, 1.0).normalize());
            self.fig.push(Label::centered(
                at + away * self.opts.label_offset,
                label.to_string(),
                self.opts.font_size,
            ));
        }
    }

    fn title(&mut self) {
        if !self.opts.show_title || self.fig.bbox.is_empty() {
            return;
        }
        let bbox = self.fig.bbox;
        let text = if FigureType::from_name(&self.schema.figure_name).is_some() {
            self.schema.figure_type.title().to_string()
        } else {
            self.schema.figure_name.clone()
        };
        self.fig.push(Label::centered(
            dvec2(bbox.center().x, bbox.max.y + self.opts.font_size * 1.5),
            text,
            self.opts.font_size * 1.2,
        ));
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Oblique square-based pyramid with its base's front-left corner at the
/// origin.
fn synthesized_pyramid(side: f64, height: f64) -> (Vec<DVec2>, DVec2) {
    let depth = DVec2::splat(side * defaults::OBLIQUE_DEPTH);
    let a = DVec2::ZERO;
    let b = dvec2(side, 0.0);
    let c = b + depth;
    let d = a + depth;
    let apex = (a + b + c + d) / 4.0 + DVec2::Y * height;
    (vec![a, b, c, d], apex)
}
