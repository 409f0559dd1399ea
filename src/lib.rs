//! Geometry figure rendering for generated exercises.
//!
//! A figure arrives as a loosely structured, often malformed payload next to
//! the exercise statement that describes it. The pipeline repairs the payload
//! ([`sanitize`]), reads what the statement says about the figure
//! ([`facts`]), merges the two ([`reconcile`]), gives every point a coordinate
//! ([`layout`]) and draws the result to SVG and PNG ([`render`]). Math markup
//! in surrounding text is rendered separately ([`math`]).
//!
//! [`Engine`] runs all of it and never fails: anything that cannot be drawn
//! becomes a placeholder plus a [`Warning`].
//!
//! ```
//! use geofig::Engine;
//!
//! let engine = Engine::default();
//! let out = engine.render_exercise(
//!     r#"{"type": "triangle_rectangle", "points": ["A", "B", "C"]}"#,
//!     "Calculer AC sachant que AB = 8 cm et BC = 6 cm.",
//! );
//! assert!(out.svg.is_some());
//! assert!(out.png_base64.is_some());
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod facts;
pub mod layout;
mod log;
pub mod math;
pub mod reconcile;
pub mod render;
pub mod sanitize;
pub mod schema;
pub mod types;

pub use config::{EngineConfig, RasterOptions, RenderOptions};
pub use engine::{Engine, FIGURE_PLACEHOLDER, FigureOutput, OutputTarget};
pub use errors::{MathError, PayloadError, RenderError, Warning};
pub use facts::{Fact, FactKind, extract_facts};
pub use layout::allocate;
pub use math::{RenderCache, math_css, render_math};
pub use reconcile::{Reconciled, reconcile};
pub use render::{RasterImage, RenderedFigure, build_figure, to_raster, to_vector};
pub use sanitize::{Sanitized, sanitize};
pub use schema::{Coordinate, FigureType, PointLabel, Schema, Segment, SegmentRef};

/// Run the pipeline up to a fully coordinated schema without rendering.
///
/// Returns `None` when the payload holds no usable schema.
pub fn prepare(payload: impl AsRef<[u8]>, statement: &str) -> (Option<Schema>, Vec<Warning>) {
    let Sanitized { schema, mut warnings } = sanitize(payload);
    let Some(schema) = schema else {
        return (None, warnings);
    };
    let Reconciled { mut schema, warnings: merged } =
        reconcile(Some(schema), &extract_facts(statement));
    warnings.extend(merged);
    warnings.extend(allocate(&mut schema));
    (Some(schema), warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_covers_every_point() {
        let (schema, _) = prepare(
            r#"{"type": "carre", "points": ["A", "B", "C", "D"]}"#,
            "Le carré ABCD a pour côté AB = 4 cm.",
        );
        let schema = schema.unwrap();
        assert!(schema.is_covered());
        assert_eq!(schema.figure_type, FigureType::Square);
        assert_eq!(schema.segments.len(), 1);
    }

    #[test]
    fn prepare_without_schema() {
        let (schema, warnings) = prepare("", "AB = 3 cm");
        assert!(schema.is_none());
        assert!(!warnings.is_empty());
    }
}
