//! Error types with rich diagnostics using miette
//!
//! None of these escape the [`Engine`](crate::Engine) boundary: the engine
//! turns every one of them into a [`Warning`] plus a placeholder. They exist so
//! the individual stages stay honest about what went wrong, and so a developer
//! running with `tracing` gets a source snippet instead of a bare message.

use std::fmt;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::schema::{FigureType, PointLabel};

// ============================================================================
// Payload Errors
// ============================================================================

/// Errors raised while turning a raw payload into a schema.
///
/// The sanitizer never returns these to its caller; it logs them and reports
/// "no schema".
#[derive(Error, Diagnostic, Debug)]
pub enum PayloadError {
    #[error("no object found in payload")]
    #[diagnostic(
        code(geofig::payload::no_object),
        help("the payload must contain a `{{ ... }}` object")
    )]
    NoObject,

    #[error("payload is not valid JSON after repair: {message}")]
    #[diagnostic(code(geofig::payload::invalid_json))]
    InvalidJson {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("parser stopped here")]
        span: SourceSpan,
    },

    #[error("payload root is not an object")]
    #[diagnostic(code(geofig::payload::not_an_object))]
    NotAnObject,
}

impl PayloadError {
    /// Build an [`PayloadError::InvalidJson`] pointing at the line/column
    /// reported by `serde_json`.
    pub fn invalid_json(repaired: &str, err: &serde_json::Error) -> Self {
        let offset = line_col_to_offset(repaired, err.line(), err.column());
        Self::InvalidJson {
            message: err.to_string(),
            src: NamedSource::new("<payload>", repaired.to_string()),
            span: (offset, 1).into(),
        }
    }
}

/// Convert a 1-based line and column into a byte offset, clamped to the text.
fn line_col_to_offset(text: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (idx, l) in text.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            let col = column.saturating_sub(1).min(l.len());
            return (offset + col).min(text.len().saturating_sub(1));
        }
        offset += l.len();
    }
    text.len().saturating_sub(1)
}

// ============================================================================
// Render Errors
// ============================================================================

/// Errors that occur while building or exporting a figure
#[derive(Error, Diagnostic, Debug)]
pub enum RenderError {
    #[error("{figure} needs at least {needed} coordinated points, got {got}")]
    #[diagnostic(code(geofig::render::not_renderable))]
    NotRenderable {
        figure: FigureType,
        needed: usize,
        got: usize,
    },

    #[error("point {0} has no coordinate")]
    #[diagnostic(
        code(geofig::render::missing_coordinate),
        help("run the coordinate allocator before rendering")
    )]
    MissingCoordinate(PointLabel),

    #[error("input too large: {points} points, {segments} segments")]
    #[diagnostic(code(geofig::render::input_too_large))]
    InputTooLarge { points: usize, segments: usize },

    #[error("empty figure")]
    #[diagnostic(code(geofig::render::empty_figure))]
    EmptyFigure,

    #[error("infinite or NaN in bounds")]
    #[diagnostic(code(geofig::render::invalid_bounds))]
    InvalidBounds,

    #[error("invalid raster size {width}x{height}")]
    #[diagnostic(code(geofig::render::invalid_raster_size))]
    InvalidRasterSize { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    #[diagnostic(code(geofig::render::encode))]
    Encode(String),

    #[error("renderer panicked: {0}")]
    #[diagnostic(code(geofig::render::panicked))]
    Panicked(String),
}

// ============================================================================
// Math Errors
// ============================================================================

/// Errors raised while parsing or laying out a math span
#[derive(Error, Diagnostic, Debug)]
pub enum MathError {
    #[error("cannot parse math markup")]
    #[diagnostic(code(geofig::math::parse))]
    Parse {
        #[source_code]
        src: NamedSource<String>,
        #[label("unexpected input")]
        span: SourceSpan,
    },

    #[error("unknown command \\{name}")]
    #[diagnostic(code(geofig::math::unknown_command))]
    UnknownCommand {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("not supported")]
        span: SourceSpan,
    },

    #[error("empty math span")]
    #[diagnostic(code(geofig::math::empty))]
    Empty,
}

impl MathError {
    pub fn parse(body: &str, span: impl Into<SourceSpan>) -> Self {
        Self::Parse {
            src: NamedSource::new("<math>", body.to_string()),
            span: span.into(),
        }
    }

    pub fn unknown_command(body: &str, name: &str, span: impl Into<SourceSpan>) -> Self {
        Self::UnknownCommand {
            name: name.to_string(),
            src: NamedSource::new("<math>", body.to_string()),
            span: span.into(),
        }
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// A non-fatal observation made while processing one request.
///
/// Warnings are returned to the caller alongside the output; they never stop
/// the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// The payload needed repair or had entries that had to be skipped
    DegradedInput(String),
    /// A referenced point had no coordinate and one was allocated
    MissingCoordinate { label: PointLabel, assigned: (f64, f64) },
    /// A statement fact disagrees with the schema; the schema value was kept
    Contradiction {
        label: PointLabel,
        schema: (f64, f64),
        statement: (f64, f64),
    },
    /// The figure type has no dedicated drawing rule
    UnsupportedFigureType(String),
    /// Building or exporting the figure failed; a placeholder was produced
    RenderFailure { figure: FigureType, points: usize, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DegradedInput(msg) => write!(f, "degraded input: {msg}"),
            Warning::MissingCoordinate { label, assigned } => write!(
                f,
                "missing coordinate for {label}, assigned ({}, {})",
                assigned.0, assigned.1
            ),
            Warning::Contradiction { label, schema, statement } => write!(
                f,
                "contradiction for {label}: schema says ({}, {}), statement says ({}, {}); keeping schema",
                schema.0, schema.1, statement.0, statement.1
            ),
            Warning::UnsupportedFigureType(name) => {
                write!(f, "unsupported figure type `{name}`, drawn as a generic polygon")
            }
            Warning::RenderFailure { figure, points, reason } => {
                write!(f, "could not render {figure} with {points} points: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_from_line_and_column() {
        let text = "{\n  \"a\": 1\n  \"b\": 2\n}";
        // line 3, column 3 is the quote before b
        let offset = line_col_to_offset(text, 3, 3);
        assert_eq!(&text[offset..offset + 1], "\"");
    }

    #[test]
    fn offset_is_clamped() {
        assert_eq!(line_col_to_offset("abc", 9, 9), 2);
        assert_eq!(line_col_to_offset("", 1, 1), 0);
    }

    #[test]
    fn warning_display() {
        let w = Warning::Contradiction {
            label: PointLabel::new('A').unwrap(),
            schema: (0.0, 3.0),
            statement: (1.0, 1.0),
        };
        assert_eq!(
            w.to_string(),
            "contradiction for A: schema says (0, 3), statement says (1, 1); keeping schema"
        );
    }
}
