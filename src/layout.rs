//! Coordinate allocation
//!
//! After [`allocate`] returns, every label the schema references has a
//! coordinate. Placement is driven by [`LAYOUT_TABLE`]; labels no template
//! covers go on a circle around the origin.

use std::f64::consts::{PI, TAU};

use glam::{DVec2, dvec2};

use crate::errors::Warning;
use crate::schema::{FigureType, PointLabel, Schema};

/// Radius of the fallback circle.
pub const RADIAL_RADIUS: f64 = 3.0;

/// Two points closer than this are considered to collide.
pub const MIN_SEPARATION: f64 = 0.25;

/// Fixed positions for a figure family. The first `slots.len()` missing
/// labels take them when at least that many are missing; the rest go radial.
#[derive(Debug)]
pub struct LayoutRule {
    pub figures: &'static [FigureType],
    pub slots: &'static [(f64, f64)],
}

/// Right angle at the second slot.
const TRIANGLE_SLOTS: &[(f64, f64)] = &[(0.0, 4.0), (0.0, 0.0), (3.0, 0.0)];
const RECTANGLE_SLOTS: &[(f64, f64)] = &[(0.0, 3.0), (0.0, 0.0), (4.0, 0.0), (4.0, 3.0)];
/// Base drawn in oblique projection, apex last.
const PYRAMID_SLOTS: &[(f64, f64)] = &[
    (0.0, 0.0),
    (4.0, 0.0),
    (5.5, 1.5),
    (1.5, 1.5),
    (2.75, 5.0),
];
const CENTER_SLOT: &[(f64, f64)] = &[(0.0, 0.0)];

pub static LAYOUT_TABLE: &[LayoutRule] = &[
    LayoutRule {
        figures: &[FigureType::Triangle, FigureType::RightTriangle],
        slots: TRIANGLE_SLOTS,
    },
    LayoutRule {
        figures: &[
            FigureType::Square,
            FigureType::Rectangle,
            FigureType::Parallelogram,
        ],
        slots: RECTANGLE_SLOTS,
    },
    LayoutRule {
        figures: &[FigureType::Pyramid],
        slots: PYRAMID_SLOTS,
    },
    LayoutRule {
        figures: &[FigureType::Circle, FigureType::Cylinder],
        slots: CENTER_SLOT,
    },
];

fn rule_for(figure: FigureType) -> Option<&'static LayoutRule> {
    LAYOUT_TABLE.iter().find(|r| r.figures.contains(&figure))
}

/// Referenced labels without a real coordinate, in first-seen order.
/// Sanitizer placeholders count as missing.
pub fn missing_labels(schema: &Schema) -> Vec<PointLabel> {
    schema
        .referenced_labels()
        .into_iter()
        .filter(|l| !schema.coordinates.contains_key(l) || schema.is_placeholder(*l))
        .collect()
}

/// Make `schema.coordinates` total. Returns one warning per allocated label.
pub fn allocate(schema: &mut Schema) -> Vec<Warning> {
    let missing = missing_labels(schema);
    if missing.is_empty() {
        return Vec::new();
    }

    // Positions that must not be reused: every real coordinate.
    let mut taken: Vec<DVec2> = schema
        .coordinates
        .iter()
        .filter(|(l, _)| !missing.contains(*l))
        .map(|(_, c)| *c)
        .collect();
    let mut placed: Vec<(PointLabel, DVec2)> = Vec::with_capacity(missing.len());

    let template = rule_for(schema.figure_type).filter(|r| {
        missing.len() >= r.slots.len()
            && r.slots.iter().all(|&(x, y)| {
                taken.iter().all(|t| t.distance(dvec2(x, y)) >= MIN_SEPARATION)
            })
    });
    let overflow: &[PointLabel] = match template {
        Some(rule) => {
            crate::log::debug!(
                figure = ?schema.figure_type,
                slots = rule.slots.len(),
                overflow = missing.len() - rule.slots.len(),
                "layout template applied"
            );
            for (label, &(x, y)) in missing.iter().zip(rule.slots) {
                let at = dvec2(x, y);
                taken.push(at);
                placed.push((*label, at));
            }
            &missing[rule.slots.len()..]
        }
        None => &missing,
    };

    let n = overflow.len();
    for (k, label) in overflow.iter().enumerate() {
        let at = radial_slot(k, n, &taken);
        taken.push(at);
        placed.push((*label, at));
    }

    let mut warnings = Vec::with_capacity(placed.len());
    for (label, at) in placed {
        schema.set_coord(label, at);
        warnings.push(Warning::MissingCoordinate { label, assigned: at.into() });
    }
    debug_assert!(schema.is_covered());
    warnings
}

/// Slot `k` of `n` on the fallback circle, rotated by half steps (and pushed
/// outwards once a full turn is exhausted) until it clears `taken`.
fn radial_slot(k: usize, n: usize, taken: &[DVec2]) -> DVec2 {
    let step = TAU / n as f64;
    let base = step * k as f64;
    let free = |p: DVec2| taken.iter().all(|t| t.distance(p) >= MIN_SEPARATION);

    // Each ring offers n distinct half-step rotations; with finitely many taken
    // positions some ring is always free.
    for ring in 0..=taken.len() {
        let radius = RADIAL_RADIUS * (1.0 + 0.5 * ring as f64);
        for half in 0..2 * n {
            let angle = base + half as f64 * PI / n as f64;
            let p = dvec2(radius * angle.cos(), radius * angle.sin());
            if free(p) {
                return p;
            }
        }
    }
    let radius = RADIAL_RADIUS * (2.0 + taken.len() as f64);
    dvec2(radius * base.cos(), radius * base.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Segment, SegmentPair, SegmentRef};

    fn l(c: char) -> PointLabel {
        PointLabel::new(c).unwrap()
    }

    fn schema(ty: FigureType, points: &str) -> Schema {
        let mut s = Schema::new(ty);
        s.points = points.chars().map(l).collect();
        s
    }

    #[test]
    fn covered_schema_is_unchanged() {
        let mut s = schema(FigureType::Triangle, "AB");
        s.set_coord(l('A'), dvec2(0.0, 0.0));
        s.set_coord(l('B'), dvec2(1.0, 0.0));
        let before = s.clone();
        assert!(allocate(&mut s).is_empty());
        assert_eq!(s, before);
    }

    #[test]
    fn triangle_template() {
        let mut s = schema(FigureType::RightTriangle, "ABC");
        let warnings = allocate(&mut s);
        assert_eq!(warnings.len(), 3);
        assert_eq!(s.coord(l('A')), Some(dvec2(0.0, 4.0)));
        assert_eq!(s.coord(l('B')), Some(dvec2(0.0, 0.0)));
        assert_eq!(s.coord(l('C')), Some(dvec2(3.0, 0.0)));
    }

    #[test]
    fn quadrilateral_template_needs_four_missing() {
        let mut s = schema(FigureType::Rectangle, "ABCD");
        allocate(&mut s);
        assert_eq!(s.coord(l('D')), Some(dvec2(4.0, 3.0)));

        let mut s = schema(FigureType::Rectangle, "ABC");
        allocate(&mut s);
        // three missing: no template, all radial
        assert_eq!(s.coord(l('A')), Some(dvec2(RADIAL_RADIUS, 0.0)));
    }

    #[test]
    fn extra_point_overflows_the_triangle_template() {
        let mut s = schema(FigureType::RightTriangle, "ABCH");
        let warnings = allocate(&mut s);
        assert_eq!(warnings.len(), 4);
        assert_eq!(s.coord(l('A')), Some(dvec2(0.0, 4.0)));
        assert_eq!(s.coord(l('B')), Some(dvec2(0.0, 0.0)));
        assert_eq!(s.coord(l('C')), Some(dvec2(3.0, 0.0)));
        let h = s.coord(l('H')).unwrap();
        for c in ['A', 'B', 'C'] {
            assert!(s.coord(l(c)).unwrap().distance(h) >= MIN_SEPARATION, "H collides with {c}");
        }
    }

    #[test]
    fn template_is_skipped_when_a_slot_is_taken() {
        let mut s = schema(FigureType::Triangle, "OABC");
        s.set_coord(l('O'), dvec2(0.0, 0.0));
        allocate(&mut s);
        // (0, 0) is the template's second slot
        assert_ne!(s.coord(l('B')), Some(dvec2(0.0, 0.0)));
        assert!(s.is_covered());
    }

    #[test]
    fn placeholders_are_relaid() {
        let mut s = schema(FigureType::Triangle, "ABC");
        for (i, c) in "ABC".chars().enumerate() {
            s.coordinates.insert(l(c), dvec2(2.0 * (i + 1) as f64, -2.0));
            s.placeholders.push(l(c));
        }
        allocate(&mut s);
        assert_eq!(s.coord(l('A')), Some(dvec2(0.0, 4.0)));
        assert!(s.placeholders.is_empty());
    }

    #[test]
    fn fourth_point_gets_distinct_coordinate() {
        let mut s = schema(FigureType::GenericPolygon, "ABCD");
        s.set_coord(l('A'), dvec2(3.0, 0.0));
        s.set_coord(l('B'), dvec2(0.0, 0.0));
        s.set_coord(l('C'), dvec2(-3.0, 0.0));
        let warnings = allocate(&mut s);
        let d = s.coord(l('D')).unwrap();
        for c in ['A', 'B', 'C'] {
            assert!(s.coord(l(c)).unwrap().distance(d) >= MIN_SEPARATION);
        }
        assert!(matches!(warnings[..], [Warning::MissingCoordinate { .. }]));
    }

    #[test]
    fn referenced_labels_outside_points_are_covered() {
        let mut s = schema(FigureType::Triangle, "AB");
        s.segments.push(Segment::new(l('B'), l('X'), Some(2.0)));
        s.perpendiculars.push(SegmentPair(
            SegmentRef(l('A'), l('B')),
            SegmentRef(l('Y'), l('Z')),
        ));
        allocate(&mut s);
        assert!(s.is_covered());
    }

    #[test]
    fn allocation_is_deterministic() {
        let base = schema(FigureType::Pyramid, "ABCDSEFG");
        let mut a = base.clone();
        let mut b = base;
        allocate(&mut a);
        allocate(&mut b);
        assert_eq!(a.coordinates, b.coordinates);
    }

    #[test]
    fn radial_slots_are_distinct() {
        let mut s = schema(FigureType::GenericPolygon, "ABCDEFGHIJKL");
        allocate(&mut s);
        let coords: Vec<DVec2> = s.coordinates.values().copied().collect();
        for (i, a) in coords.iter().enumerate() {
            for b in &coords[i + 1..] {
                assert!(a.distance(*b) >= MIN_SEPARATION);
            }
        }
    }
}
