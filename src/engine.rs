//! The rendering service
//!
//! [`Engine`] runs the whole pipeline for one figure (sanitize, extract,
//! reconcile, allocate, render) and is the only place errors are turned into
//! warnings and placeholders. Nothing below it panics on bad input, but a
//! panic is still caught here so one broken figure never takes a document
//! down with it.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::errors::{RenderError, Warning};
use crate::facts::extract_facts;
use crate::layout::allocate;
use crate::math::{self, RenderCache, escape_html};
use crate::reconcile::{Reconciled, reconcile};
use crate::render::{RenderedFigure, build_figure, to_raster_with, to_vector};
use crate::sanitize::{Sanitized, extract_embedded, sanitize};
use crate::schema::Schema;

/// Fragment standing in for a figure that could not be drawn.
pub const FIGURE_PLACEHOLDER: &str =
    r#"<span class="figure-placeholder">[figure not renderable]</span>"#;

/// Which output a document is assembled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputTarget {
    /// Inline SVG
    #[default]
    Print,
    /// Inline PNG data URI
    Web,
}

/// Everything produced for one figure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FigureOutput {
    /// The fully coordinated schema that was drawn, or `None` when the payload
    /// held no usable schema
    pub schema: Option<Schema>,
    pub svg: Option<String>,
    pub png_base64: Option<String>,
    pub warnings: Vec<Warning>,
}

impl FigureOutput {
    pub fn is_rendered(&self) -> bool {
        self.svg.is_some()
    }

    /// The SVG, or the placeholder fragment.
    pub fn vector_or_placeholder(&self) -> String {
        self.svg.clone().unwrap_or_else(|| FIGURE_PLACEHOLDER.to_string())
    }

    pub fn png_data_uri(&self) -> Option<String> {
        self.png_base64.as_ref().map(|b| format!("data:image/png;base64,{b}"))
    }

    /// The `<div class="geometric-figure">` block embedded in documents.
    pub fn html(&self, target: OutputTarget) -> String {
        let inner = match (target, &self.png_base64, &self.svg) {
            (OutputTarget::Web, Some(png), _) => {
                let alt = self
                    .schema
                    .as_ref()
                    .map(|s| escape_html(&s.figure_name))
                    .unwrap_or_default();
                format!(r#"<img src="data:image/png;base64,{png}" alt="{alt}"/>"#)
            }
            (_, _, Some(svg)) => svg.clone(),
            _ => return FIGURE_PLACEHOLDER.to_string(),
        };
        format!(r#"<div class="geometric-figure">{inner}</div>"#)
    }
}

const FIGURE_CSS: &str = r#".geometric-figure {
    display: block;
    text-align: center;
    margin: 12px 0;
}
.geometric-figure svg, .geometric-figure img {
    max-width: 100%;
    height: auto;
}
.figure-placeholder {
    color: #888;
    font-style: italic;
}
"#;

/// The figure and math rendering service.
///
/// `Engine` is `Send + Sync`; share one behind an `Arc` and call it from any
/// number of threads. Its only mutable state is the math [`RenderCache`].
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    cache: Arc<RenderCache>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = Arc::new(RenderCache::new(config.math_cache_capacity));
        Self { config, cache }
    }

    /// Use an existing cache, e.g. one shared between engines.
    pub fn with_cache(config: EngineConfig, cache: Arc<RenderCache>) -> Self {
        Self { config, cache }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<RenderCache> {
        &self.cache
    }

    /// Render the figure described by `payload`, enriched with what
    /// `statement` says about it.
    pub fn render_exercise(&self, payload: impl AsRef<[u8]>, statement: &str) -> FigureOutput {
        let Sanitized { schema, warnings } = sanitize(payload);
        self.complete(schema, statement, warnings)
    }

    /// Render an already structured schema. Missing coordinates are still
    /// allocated.
    pub fn render_schema(&self, schema: &Schema) -> FigureOutput {
        self.complete(Some(schema.clone()), "", Vec::new())
    }

    fn complete(
        &self,
        schema: Option<Schema>,
        statement: &str,
        mut warnings: Vec<Warning>,
    ) -> FigureOutput {
        let Some(schema) = schema else {
            crate::log::info!(warnings = warnings.len(), "no schema, placeholder emitted");
            return FigureOutput { warnings, ..FigureOutput::default() };
        };

        if let Err(err) = self.check_size(&schema) {
            return self.failed(schema, err, warnings);
        }

        let facts = extract_facts(statement);
        let Reconciled { mut schema, warnings: merged } = reconcile(Some(schema), &facts);
        warnings.extend(merged);
        warnings.extend(allocate(&mut schema));

        if let Err(err) = self.check_size(&schema) {
            return self.failed(schema, err, warnings);
        }

        let fig = match guarded(|| build_figure(&schema, &self.config.render)) {
            Ok(fig) => fig,
            Err(err) => return self.failed(schema, err, warnings),
        };

        let svg = guarded(|| Ok(to_vector(&fig, &self.config.render)));
        let png = guarded(|| self.rasterize(&fig));

        let mut out = FigureOutput { schema: None, svg: None, png_base64: None, warnings };
        match svg {
            Ok(svg) => out.svg = Some(svg),
            Err(err) => out.warnings.push(failure(&schema, &err)),
        }
        match png {
            Ok(png) => out.png_base64 = Some(png),
            Err(err) => out.warnings.push(failure(&schema, &err)),
        }
        crate::log::debug!(
            figure = ?schema.figure_type,
            points = schema.points.len(),
            warnings = out.warnings.len(),
            "figure rendered"
        );
        out.schema = Some(schema);
        out
    }

    fn rasterize(&self, fig: &RenderedFigure) -> Result<String, RenderError> {
        let r = &self.config.raster;
        let image = to_raster_with(fig, &self.config.render, r.width, r.height, r.dpi)?;
        Ok(image.to_base64())
    }

    fn check_size(&self, schema: &Schema) -> Result<(), RenderError> {
        let points = schema.points.len();
        let segments = schema.segments.len();
        if points > self.config.max_points || segments > self.config.max_segments {
            return Err(RenderError::InputTooLarge { points, segments });
        }
        Ok(())
    }

    fn failed(&self, schema: Schema, err: RenderError, mut warnings: Vec<Warning>) -> FigureOutput {
        warnings.push(failure(&schema, &err));
        crate::log::warn!(
            figure = ?schema.figure_type,
            points = schema.points.len(),
            error = ?miette::Report::new(err),
            "figure not rendered"
        );
        FigureOutput { schema: Some(schema), svg: None, png_base64: None, warnings }
    }

    /// Replace every embedded schema object in `text` with its figure, and
    /// every math span with its rendering.
    ///
    /// The text preceding a figure, back to the previous figure, is used as
    /// its statement.
    pub fn process_document(&self, text: &str, target: OutputTarget) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for embedded in extract_embedded(text, &self.config.marker) {
            let statement = &text[last..embedded.range.start];
            out.push_str(&self.render_math(statement));
            let Sanitized { schema, warnings } = embedded.sanitized;
            let figure = self.complete(schema, statement, warnings);
            for w in &figure.warnings {
                crate::log::info!(warning = %w, "document figure");
            }
            out.push_str(&figure.html(target));
            last = embedded.range.end;
        }
        out.push_str(&self.render_math(&text[last..]));
        out
    }

    /// Replace every math span in `text` with its rendering.
    pub fn render_math(&self, text: &str) -> String {
        math::render_math(text, &self.cache)
    }

    /// Stylesheet for figure and math containers.
    pub fn stylesheet() -> String {
        format!("{FIGURE_CSS}{}", math::math_css())
    }
}

fn failure(schema: &Schema, err: &RenderError) -> Warning {
    Warning::RenderFailure {
        figure: schema.figure_type,
        points: schema.points.len(),
        reason: err.to_string(),
    }
}

/// Run `f`, turning a panic into [`RenderError::Panicked`].
fn guarded<T>(f: impl FnOnce() -> Result<T, RenderError>) -> Result<T, RenderError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(panicked(payload)))
}

fn panicked(payload: Box<dyn Any + Send>) -> RenderError {
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    RenderError::Panicked(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FigureType, PointLabel};
    use glam::dvec2;
    use insta::assert_snapshot;

    fn label(c: char) -> PointLabel {
        PointLabel::new(c).unwrap()
    }

    const TRIANGLE: &str = r#"{"type": "triangle", "points": ["A", "B", "C"],
        "coordinates": {"A": [0, 3], "B": [0, 0], "C": [4, 0]}}"#;

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }

    #[test]
    fn renders_both_formats() {
        let out = Engine::default().render_exercise(TRIANGLE, "");
        assert!(out.is_rendered());
        assert!(out.svg.as_deref().unwrap().starts_with("<svg"));
        assert!(out.png_base64.as_deref().unwrap().starts_with("iVBORw0KGgo"));
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    }

    #[test]
    fn malformed_payload_gives_placeholder() {
        let out = Engine::default().render_exercise("not a payload", "Soit ABC un triangle.");
        assert!(out.schema.is_none());
        assert!(out.svg.is_none());
        assert_snapshot!(
            out.vector_or_placeholder(),
            @r#"<span class="figure-placeholder">[figure not renderable]</span>"#
        );
    }

    #[test]
    fn too_few_points_is_a_render_failure() {
        let out = Engine::default()
            .render_exercise(r#"{"type": "polygone", "points": ["A", "B"]}"#, "");
        assert!(out.svg.is_none());
        assert!(out.schema.is_some());
        assert!(
            out.warnings.iter().any(|w| matches!(w, Warning::RenderFailure { points: 2, .. })),
            "{:?}",
            out.warnings
        );
    }

    #[test]
    fn size_guard_rejects_before_rendering() {
        let config = EngineConfig { max_points: 2, ..EngineConfig::default() };
        let out = Engine::new(config).render_exercise(TRIANGLE, "");
        assert!(out.svg.is_none());
        let Some(Warning::RenderFailure { reason, .. }) = out.warnings.last() else {
            panic!("expected a render failure");
        };
        assert!(reason.starts_with("input too large"), "{reason}");
    }

    #[test]
    fn render_schema_allocates_missing_points() {
        let mut schema = Schema::new(FigureType::Triangle);
        for c in ['A', 'B', 'C'] {
            schema.add_point(label(c));
        }
        schema.set_coord(label('A'), dvec2(0.0, 3.0));
        let out = Engine::default().render_schema(&schema);
        assert!(out.is_rendered());
        let drawn = out.schema.unwrap();
        assert!(drawn.is_covered());
        assert_eq!(drawn.coord(label('A')), Some(dvec2(0.0, 3.0)));
    }

    #[test]
    fn panics_become_errors() {
        let r: Result<(), _> = guarded(|| panic!("boom"));
        assert!(matches!(r, Err(RenderError::Panicked(ref m)) if m == "boom"));
    }

    #[test]
    fn document_figures_are_replaced() {
        let engine = Engine::default();
        let doc = format!(
            r#"Exercice 1. Soit $ABC$ un triangle. {{"type": "schema_geometrique", "schema": {TRIANGLE}}} Fin."#
        );
        let print = engine.process_document(&doc, OutputTarget::Print);
        assert!(print.starts_with(r#"Exercice 1. Soit <span class="math-inline"><svg"#), "{print}");
        assert!(print.contains(r#"<div class="geometric-figure"><svg"#), "{print}");
        assert!(print.ends_with("</div> Fin."), "{print}");

        let web = engine.process_document(&doc, OutputTarget::Web);
        assert!(web.contains(r#"<div class="geometric-figure"><img src="data:image/png;base64,"#));
    }

    #[test]
    fn broken_document_figure_is_a_placeholder() {
        let engine = Engine::default();
        let doc = r#"Avant {"type": "schema_geometrique", "schema": {"type": "pyramide", "points": ["A"]}} après"#;
        assert_snapshot!(
            engine.process_document(doc, OutputTarget::Print),
            @r#"Avant <span class="figure-placeholder">[figure not renderable]</span> après"#
        );
    }

    #[test]
    fn shared_cache() {
        let cache = Arc::new(RenderCache::new(8));
        let a = Engine::with_cache(EngineConfig::default(), Arc::clone(&cache));
        let b = Engine::with_cache(EngineConfig::default(), Arc::clone(&cache));
        a.render_math("$x$");
        b.render_math("$x$");
        assert_eq!(cache.stats().hits, 1);
    }
}
