//! Canonical schema model
//!
//! Every stage of the pipeline reads and writes this one representation; the
//! sanitizer is the only place that knows about the wire format.

use std::fmt;

use glam::DVec2;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A coordinate in drawing space (y-up, one unit per centimetre).
pub type Coordinate = DVec2;

/// A single uppercase letter naming a point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PointLabel(u8);

impl PointLabel {
    /// Returns `None` unless `c` is an ASCII uppercase letter.
    pub fn new(c: char) -> Option<Self> {
        c.is_ascii_uppercase().then_some(PointLabel(c as u8))
    }

    /// Parse a label from a string holding exactly one uppercase letter
    /// (surrounding whitespace is ignored).
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.trim().chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::new(c)
    }

    pub fn as_char(self) -> char {
        self.0 as char
    }
}

impl fmt::Display for PointLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl TryFrom<String> for PointLabel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        PointLabel::parse(&s).ok_or_else(|| format!("invalid point label `{s}`"))
    }
}

impl From<PointLabel> for String {
    fn from(label: PointLabel) -> Self {
        label.to_string()
    }
}

/// Closed set of figure kinds the renderer knows how to draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FigureType {
    Triangle,
    RightTriangle,
    Square,
    Rectangle,
    Circle,
    Parallelogram,
    Cylinder,
    Pyramid,
    GenericPolygon,
}

impl FigureType {
    /// Map a payload figure name (French or English) to a figure type.
    ///
    /// Returns `None` for names with no dedicated rule; callers fall back to
    /// [`FigureType::GenericPolygon`].
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'é' | 'è' | 'ê' => 'e',
                'à' | 'â' => 'a',
                ' ' | '-' => '_',
                other => other,
            })
            .collect();
        let ty = match normalized.as_str() {
            "triangle" | "triangle_quelconque" => FigureType::Triangle,
            "triangle_rectangle" | "right_triangle" | "righttriangle" => FigureType::RightTriangle,
            "carre" | "square" => FigureType::Square,
            "rectangle" => FigureType::Rectangle,
            "cercle" | "circle" => FigureType::Circle,
            "parallelogramme" | "parallelogram" => FigureType::Parallelogram,
            "cylindre" | "cylinder" => FigureType::Cylinder,
            "pyramide" | "pyramid" => FigureType::Pyramid,
            "polygone" | "polygon" | "generic_polygon" | "genericpolygon" => {
                FigureType::GenericPolygon
            }
            _ => return None,
        };
        Some(ty)
    }

    /// Figures drawn as a closed outline through the declared points.
    pub fn is_polygonal(self) -> bool {
        matches!(
            self,
            FigureType::Triangle
                | FigureType::RightTriangle
                | FigureType::Square
                | FigureType::Rectangle
                | FigureType::Parallelogram
                | FigureType::GenericPolygon
        )
    }

    pub fn is_triangle(self) -> bool {
        matches!(self, FigureType::Triangle | FigureType::RightTriangle)
    }

    pub fn is_quadrilateral(self) -> bool {
        matches!(
            self,
            FigureType::Square | FigureType::Rectangle | FigureType::Parallelogram
        )
    }

    /// Human-readable title used by the renderer.
    pub fn title(self) -> &'static str {
        match self {
            FigureType::Triangle => "Triangle",
            FigureType::RightTriangle => "Triangle rectangle",
            FigureType::Square => "Carré",
            FigureType::Rectangle => "Rectangle",
            FigureType::Circle => "Cercle",
            FigureType::Parallelogram => "Parallélogramme",
            FigureType::Cylinder => "Cylindre",
            FigureType::Pyramid => "Pyramide",
            FigureType::GenericPolygon => "Polygone",
        }
    }
}

impl fmt::Display for FigureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FigureType::Triangle => "triangle",
            FigureType::RightTriangle => "right triangle",
            FigureType::Square => "square",
            FigureType::Rectangle => "rectangle",
            FigureType::Circle => "circle",
            FigureType::Parallelogram => "parallelogram",
            FigureType::Cylinder => "cylinder",
            FigureType::Pyramid => "pyramid",
            FigureType::GenericPolygon => "generic polygon",
        };
        f.write_str(name)
    }
}

/// An unordered reference to the segment between two points.
#[derive(Clone, Copy, Debug, Eq, Serialize, Deserialize)]
pub struct SegmentRef(pub PointLabel, pub PointLabel);

impl SegmentRef {
    /// Endpoints in sorted order, for order-insensitive comparison.
    pub fn canonical(self) -> (PointLabel, PointLabel) {
        if self.0 <= self.1 {
            (self.0, self.1)
        } else {
            (self.1, self.0)
        }
    }

    /// Parse `"AB"` (or `"A B"`, `"(AB)"`, `"[AB]"`).
    pub fn parse(s: &str) -> Option<Self> {
        let letters: Vec<char> = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '(' | ')' | '[' | ']'))
            .collect();
        match letters.as_slice() {
            [a, b] => Some(SegmentRef(PointLabel::new(*a)?, PointLabel::new(*b)?)),
            _ => None,
        }
    }
}

impl PartialEq for SegmentRef {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl fmt::Display for SegmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0, self.1)
    }
}

/// A drawn segment, optionally annotated with its length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub a: PointLabel,
    pub b: PointLabel,
    pub length: Option<f64>,
}

impl Segment {
    pub fn new(a: PointLabel, b: PointLabel, length: Option<f64>) -> Self {
        Self { a, b, length }
    }

    pub fn as_ref(&self) -> SegmentRef {
        SegmentRef(self.a, self.b)
    }

    pub fn joins(&self, a: PointLabel, b: PointLabel) -> bool {
        self.as_ref() == SegmentRef(a, b)
    }
}

/// An angle annotation at a vertex.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AngleMark {
    pub vertex: PointLabel,
    pub right: bool,
}

/// A relation between two segments (parallel or perpendicular).
#[derive(Clone, Copy, Debug, Eq, Serialize, Deserialize)]
pub struct SegmentPair(pub SegmentRef, pub SegmentRef);

impl PartialEq for SegmentPair {
    fn eq(&self, other: &Self) -> bool {
        (self.0 == other.0 && self.1 == other.1) || (self.0 == other.1 && self.1 == other.0)
    }
}

/// Figure-specific scalar parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FigureParams {
    pub radius: Option<f64>,
    pub side: Option<f64>,
    pub height: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub base_shape: Option<String>,
}

/// Structured description of one figure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub figure_type: FigureType,
    /// The figure name as written in the payload, kept for titles and logs
    pub figure_name: String,
    pub points: Vec<PointLabel>,
    pub coordinates: IndexMap<PointLabel, Coordinate>,
    /// Labels whose coordinate is a sanitizer placeholder, not real data
    #[serde(default)]
    pub placeholders: Vec<PointLabel>,
    pub segments: Vec<Segment>,
    pub angle_marks: Vec<AngleMark>,
    pub parallels: Vec<SegmentPair>,
    pub perpendiculars: Vec<SegmentPair>,
    pub params: FigureParams,
}

impl Schema {
    pub fn new(figure_type: FigureType) -> Self {
        Self {
            figure_type,
            figure_name: figure_type.to_string(),
            points: Vec::new(),
            coordinates: IndexMap::new(),
            placeholders: Vec::new(),
            segments: Vec::new(),
            angle_marks: Vec::new(),
            parallels: Vec::new(),
            perpendiculars: Vec::new(),
            params: FigureParams::default(),
        }
    }

    /// The schema produced when there is nothing to reconcile.
    pub fn empty() -> Self {
        Self::new(FigureType::GenericPolygon)
    }

    /// Append a point if it is not already declared. Returns true if added.
    pub fn add_point(&mut self, label: PointLabel) -> bool {
        if self.points.contains(&label) {
            false
        } else {
            self.points.push(label);
            true
        }
    }

    pub fn coord(&self, label: PointLabel) -> Option<Coordinate> {
        self.coordinates.get(&label).copied()
    }

    /// Set a real coordinate, clearing any placeholder flag.
    pub fn set_coord(&mut self, label: PointLabel, at: Coordinate) {
        self.coordinates.insert(label, at);
        self.placeholders.retain(|l| *l != label);
    }

    pub fn is_placeholder(&self, label: PointLabel) -> bool {
        self.placeholders.contains(&label)
    }

    /// Every label referenced anywhere, in first-seen order: declared points,
    /// then segment endpoints, angle vertices and relation endpoints.
    pub fn referenced_labels(&self) -> Vec<PointLabel> {
        let mut seen = Vec::with_capacity(self.points.len());
        let mut push = |l: PointLabel| {
            if !seen.contains(&l) {
                seen.push(l);
            }
        };
        self.points.iter().copied().for_each(&mut push);
        for s in &self.segments {
            push(s.a);
            push(s.b);
        }
        for m in &self.angle_marks {
            push(m.vertex);
        }
        for pair in self.parallels.iter().chain(&self.perpendiculars) {
            for seg in [pair.0, pair.1] {
                push(seg.0);
                push(seg.1);
            }
        }
        seen
    }

    /// Referenced labels that have no coordinate at all.
    pub fn uncovered(&self) -> Vec<PointLabel> {
        self.referenced_labels()
            .into_iter()
            .filter(|l| !self.coordinates.contains_key(l))
            .collect()
    }

    pub fn is_covered(&self) -> bool {
        self.uncovered().is_empty()
    }

    pub fn segment_mut(&mut self, a: PointLabel, b: PointLabel) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| s.joins(a, b))
    }

    pub fn has_right_angle(&self, vertex: PointLabel) -> bool {
        self.angle_marks.iter().any(|m| m.vertex == vertex && m.right)
    }

    /// Add a right-angle mark unless one exists. Returns true if added.
    pub fn add_right_angle(&mut self, vertex: PointLabel) -> bool {
        if let Some(mark) = self.angle_marks.iter_mut().find(|m| m.vertex == vertex) {
            if mark.right {
                return false;
            }
            mark.right = true;
            return true;
        }
        self.angle_marks.push(AngleMark { vertex, right: true });
        true
    }

    /// Add a parallel relation unless present (order-insensitive).
    pub fn add_parallel(&mut self, pair: SegmentPair) -> bool {
        push_unique(&mut self.parallels, pair)
    }

    /// Add a perpendicular relation unless present (order-insensitive).
    pub fn add_perpendicular(&mut self, pair: SegmentPair) -> bool {
        push_unique(&mut self.perpendiculars, pair)
    }

    /// Coordinates of the declared points, in declaration order, skipping any
    /// that are not coordinated.
    pub fn vertices(&self) -> Vec<(PointLabel, Coordinate)> {
        self.points
            .iter()
            .filter_map(|l| self.coord(*l).map(|c| (*l, c)))
            .collect()
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        false
    } else {
        items.push(item);
        true
    }
}
