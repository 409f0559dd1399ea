//! Data-driven pipeline scenarios
//!
//! Each `tests/fixtures/*.json` file holds a raw payload, the statement that
//! goes with it, and what the pipeline must make of them.
//!
//! Run with: RUST_LOG=geofig=debug cargo test --test scenarios --features tracing -- --nocapture

use std::sync::Once;

use datatest_stable::Utf8Path;
use geofig::{
    Engine, FigureType, PointLabel, RenderOptions, SegmentRef, build_figure, prepare, sanitize,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Scenario {
    payload: String,
    #[serde(default)]
    statement: String,
    #[serde(default)]
    expect: Expect,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Expect {
    rendered: Option<bool>,
    figure: Option<FigureType>,
    points: Option<Vec<PointLabel>>,
    /// `["AB", 8.0]` pairs
    segments: Vec<(String, f64)>,
    segment_count: Option<usize>,
    distance_labels: Vec<String>,
    right_angles: Vec<PointLabel>,
    right_angle_markers: Option<usize>,
    /// Vertices that must carry a drawn right-angle marker
    markers_at: Vec<PointLabel>,
    parallels: Vec<(String, String)>,
    perpendiculars: Vec<(String, String)>,
    distinct_coordinates: bool,
    /// Exact coordinates some labels must end up with
    coordinates: Vec<(PointLabel, (f64, f64))>,
    /// A corrected payload that must sanitize to the same schema
    same_as: Option<String>,
    /// Substrings that must each appear in some warning
    warnings: Vec<String>,
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn segment(s: &str) -> SegmentRef {
    SegmentRef::parse(s).unwrap_or_else(|| panic!("bad segment `{s}` in fixture"))
}

fn run_scenario(path: &Utf8Path) -> datatest_stable::Result<()> {
    init_tracing();
    let scenario: Scenario = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let expect = &scenario.expect;

    let out = Engine::default().render_exercise(&scenario.payload, &scenario.statement);
    if let Some(rendered) = expect.rendered {
        assert_eq!(out.is_rendered(), rendered, "{path}: rendered, warnings {:?}", out.warnings);
        assert_eq!(out.png_base64.is_some(), rendered, "{path}: png");
    }
    for needle in &expect.warnings {
        assert!(
            out.warnings.iter().any(|w| w.to_string().contains(needle.as_str())),
            "{path}: no warning mentions `{needle}` in {:?}",
            out.warnings
        );
    }

    if let Some(corrected) = &expect.same_as {
        assert_eq!(
            sanitize(&scenario.payload).schema,
            sanitize(corrected).schema,
            "{path}: repaired payload differs from the corrected one"
        );
    }

    let (schema, _) = prepare(&scenario.payload, &scenario.statement);
    let Some(schema) = schema else {
        assert_eq!(expect.rendered, Some(false), "{path}: no schema");
        return Ok(());
    };
    assert!(schema.is_covered(), "{path}: uncovered {:?}", schema.uncovered());
    assert_eq!(out.schema.as_ref(), Some(&schema), "{path}: engine and prepare disagree");

    if let Some(figure) = expect.figure {
        assert_eq!(schema.figure_type, figure, "{path}: figure type");
    }
    if let Some(points) = &expect.points {
        assert_eq!(&schema.points, points, "{path}: points");
    }
    for (seg, length) in &expect.segments {
        let r = segment(seg);
        assert!(
            schema.segments.iter().any(|s| s.as_ref() == r && s.length == Some(*length)),
            "{path}: no segment {seg} = {length} in {:?}",
            schema.segments
        );
    }
    if let Some(n) = expect.segment_count {
        assert_eq!(schema.segments.len(), n, "{path}: segment count");
    }
    for (a, b) in &expect.parallels {
        let pair = geofig::schema::SegmentPair(segment(a), segment(b));
        assert!(schema.parallels.contains(&pair), "{path}: {a} // {b} missing");
    }
    for (a, b) in &expect.perpendiculars {
        let pair = geofig::schema::SegmentPair(segment(a), segment(b));
        assert!(schema.perpendiculars.contains(&pair), "{path}: {a} ⊥ {b} missing");
    }
    for vertex in &expect.right_angles {
        assert!(schema.has_right_angle(*vertex), "{path}: no right angle at {vertex}");
    }
    for (label, xy) in &expect.coordinates {
        let at = schema.coord(*label).map(|c| (c.x, c.y));
        assert_eq!(at, Some(*xy), "{path}: coordinate of {label}");
    }
    if expect.distinct_coordinates {
        let coords: Vec<_> = schema.coordinates.values().collect();
        for (i, a) in coords.iter().enumerate() {
            for b in &coords[i + 1..] {
                assert!(a.distance(**b) > 1e-6, "{path}: coincident coordinates {a} {b}");
            }
        }
    }

    if out.is_rendered() {
        let fig = build_figure(&schema, &RenderOptions::default())?;
        let labels: Vec<&str> = fig.distance_markers().map(|d| d.label.as_str()).collect();
        for label in &expect.distance_labels {
            assert!(labels.contains(&label.as_str()), "{path}: no `{label}` in {labels:?}");
        }
        if let Some(n) = expect.right_angle_markers {
            let right: Vec<_> = fig.angle_markers().filter(|m| m.right).collect();
            assert_eq!(right.len(), n, "{path}: right-angle markers");
        }
        for vertex in &expect.markers_at {
            let at = schema.coord(*vertex);
            assert!(
                fig.angle_markers().any(|m| m.right && Some(m.vertex) == at),
                "{path}: no right-angle marker drawn at {vertex}"
            );
        }
    }

    Ok(())
}

datatest_stable::harness! {
    { test = run_scenario, root = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"), pattern = r"\.json$" },
}
