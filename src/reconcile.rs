//! Merging statement facts into a schema.

use crate::errors::Warning;
use crate::facts::{Fact, FactKind};
use crate::schema::{Schema, Segment, SegmentPair};

/// Coordinates closer than this are considered equal.
const COORD_EPSILON: f64 = 1e-9;

/// An enriched schema and what was noticed while enriching it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub schema: Schema,
    pub warnings: Vec<Warning>,
}

/// Merge `facts` into `schema`.
///
/// The schema always wins over the statement: a coordinate the statement
/// contradicts is kept and reported. Without a schema there is nothing to
/// enrich and the result is [`Schema::empty`].
///
/// Reconciling the output again with the same facts yields the same schema.
pub fn reconcile(schema: Option<Schema>, facts: &[Fact]) -> Reconciled {
    let Some(mut schema) = schema else {
        return Reconciled { schema: Schema::empty(), warnings: Vec::new() };
    };
    let mut warnings = Vec::new();

    for fact in facts {
        match fact.kind {
            FactKind::PointMention(label) => {
                schema.add_point(label);
            }
            FactKind::CoordinateAssertion(label, at) => {
                match schema.coord(label) {
                    Some(existing)
                        if !schema.is_placeholder(label)
                            && existing.distance(at) > COORD_EPSILON =>
                    {
                        crate::log::warn!(%label, ?existing, statement = ?at, "contradiction, keeping schema");
                        warnings.push(Warning::Contradiction {
                            label,
                            schema: existing.into(),
                            statement: at.into(),
                        });
                    }
                    Some(_) if !schema.is_placeholder(label) => {}
                    _ => {
                        schema.add_point(label);
                        schema.set_coord(label, at);
                    }
                }
            }
            FactKind::LengthAssertion(a, b, length) => {
                match schema.segment_mut(a, b) {
                    Some(segment) => segment.length = Some(length),
                    None => schema.segments.push(Segment::new(a, b, Some(length))),
                }
                schema.add_point(a);
                schema.add_point(b);
            }
            FactKind::ParallelAssertion(first, second) => {
                schema.add_parallel(SegmentPair(first, second));
            }
            FactKind::PerpendicularAssertion(first, second) => {
                schema.add_perpendicular(SegmentPair(first, second));
            }
            FactKind::RightAngleAssertion(vertex) => {
                schema.add_right_angle(vertex);
            }
        }
    }

    crate::log::debug!(
        figure = ?schema.figure_type,
        points = schema.points.len(),
        segments = schema.segments.len(),
        "schema reconciled"
    );
    Reconciled { schema, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::extract_facts;
    use crate::schema::{AngleMark, FigureType, PointLabel, SegmentRef};
    use glam::dvec2;

    fn l(c: char) -> PointLabel {
        PointLabel::new(c).unwrap()
    }

    fn right_triangle() -> Schema {
        let mut s = Schema::new(FigureType::RightTriangle);
        s.points = vec![l('A'), l('B'), l('C')];
        s.angle_marks.push(AngleMark { vertex: l('B'), right: true });
        s
    }

    #[test]
    fn no_schema_is_empty() {
        let facts = extract_facts("AB = 3");
        let out = reconcile(None, &facts);
        assert_eq!(out.schema, Schema::empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn lengths_add_segments() {
        let facts = extract_facts("Calculer AC sachant que AB = 8 cm et BC = 6 cm");
        let out = reconcile(Some(right_triangle()), &facts);
        let s = out.schema;
        assert_eq!(
            s.segments,
            vec![
                Segment::new(l('A'), l('B'), Some(8.0)),
                Segment::new(l('B'), l('C'), Some(6.0)),
            ]
        );
        assert_eq!(s.points, vec![l('A'), l('B'), l('C')]);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn length_overrides_existing_segment() {
        let mut s = right_triangle();
        s.segments.push(Segment::new(l('B'), l('A'), Some(5.0)));
        let out = reconcile(Some(s), &extract_facts("AB = 8"));
        assert_eq!(out.schema.segments, vec![Segment::new(l('B'), l('A'), Some(8.0))]);
    }

    #[test]
    fn schema_wins_on_contradiction() {
        let mut s = right_triangle();
        s.set_coord(l('A'), dvec2(0.0, 3.0));
        let out = reconcile(Some(s), &extract_facts("On donne A(1, 1)."));
        assert_eq!(out.schema.coord(l('A')), Some(dvec2(0.0, 3.0)));
        assert_eq!(
            out.warnings,
            vec![Warning::Contradiction {
                label: l('A'),
                schema: (0.0, 3.0),
                statement: (1.0, 1.0),
            }]
        );
    }

    #[test]
    fn statement_replaces_placeholder() {
        let mut s = right_triangle();
        s.coordinates.insert(l('C'), dvec2(6.0, -2.0));
        s.placeholders.push(l('C'));
        let out = reconcile(Some(s), &extract_facts("C(4, 0)"));
        assert_eq!(out.schema.coord(l('C')), Some(dvec2(4.0, 0.0)));
        assert!(out.schema.placeholders.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn relations_and_right_angles() {
        let facts = extract_facts("AB // CD et ABCD rectangle en B");
        let out = reconcile(Some(Schema::new(FigureType::Rectangle)), &facts);
        let s = out.schema;
        assert_eq!(
            s.parallels,
            vec![SegmentPair(
                SegmentRef(l('A'), l('B')),
                SegmentRef(l('C'), l('D'))
            )]
        );
        assert!(s.has_right_angle(l('B')));
        assert_eq!(s.points, vec![l('A'), l('B'), l('C'), l('D')]);
    }

    #[test]
    fn reconciling_twice_changes_nothing() {
        let facts = extract_facts("A(0, 0), AB = 4, (AB) ⊥ (BC), E(2; 2) rectangle en B");
        let once = reconcile(Some(right_triangle()), &facts).schema;
        let twice = reconcile(Some(once.clone()), &facts).schema;
        assert_eq!(once, twice);
    }
}
