//! Payload sanitizer
//!
//! Turns a raw, machine-generated, near-JSON payload into a [`Schema`]. The
//! sanitizer never fails: anything it cannot make sense of becomes "no schema"
//! plus a warning.

use std::ops::Range;
use std::sync::LazyLock;

use glam::dvec2;
use regex_lite::Regex;
use serde_json::{Map, Value};

use crate::errors::{PayloadError, Warning};
use crate::schema::{
    AngleMark, Coordinate, FigureType, PointLabel, Schema, Segment, SegmentPair, SegmentRef,
};

/// Distance between consecutive placeholder coordinates.
pub const PLACEHOLDER_SPACING: f64 = 2.0;

/// Value of `"type"` that marks an embedded schema object.
pub const DEFAULT_MARKER: &str = "schema_geometrique";

/// Result of sanitizing one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub schema: Option<Schema>,
    pub warnings: Vec<Warning>,
}

impl Sanitized {
    fn none(warnings: Vec<Warning>) -> Self {
        Self { schema: None, warnings }
    }
}

/// A schema object found inside a larger text.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedded {
    /// Byte range of the object in the scanned text
    pub range: Range<usize>,
    pub sanitized: Sanitized,
}

static RE_KEY_ALIAS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#""(?:schéma|schema_geometrique|schéma_géométrique|schema_géométrique)"(\s*):"#).ok()
});
static RE_BRACE_BRACE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\}(\s*)\{").ok());
static RE_CLOSE_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"([\]\}])(\s*)"([^"\n]*)"(\s*):"#).ok());
static RE_VALUE_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""([ \t]*\n\s*|[ \t]+)"([^"\n]*)"(\s*):"#).ok());
static RE_SCALAR_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(\d|true|false|null)(\s+)"([^"\n]*)"(\s*):"#).ok());
static RE_TRAILING_COMMA: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r",(\s*[\}\]])").ok());
static RE_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:[.,]\d+)?").ok());

fn rewrite(text: String, re: &LazyLock<Option<Regex>>, replacement: &str) -> String {
    match re.as_ref() {
        Some(re) => re.replace_all(&text, replacement).into_owned(),
        None => text,
    }
}

/// Sanitize a raw payload.
pub fn sanitize(raw: impl AsRef<[u8]>) -> Sanitized {
    let text = String::from_utf8_lossy(raw.as_ref());
    let mut warnings = Vec::new();

    let Some(object) = outer_object(&text) else {
        crate::log::debug!("no object in payload");
        warnings.push(Warning::DegradedInput(PayloadError::NoObject.to_string()));
        return Sanitized::none(warnings);
    };

    let repaired = repair(object);
    if repaired != object {
        crate::log::debug!(%repaired, "payload needed structural repair");
    }

    let root = match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => value,
        Err(e) => {
            let err = PayloadError::invalid_json(&repaired, &e);
            warnings.push(Warning::DegradedInput(err.to_string()));
            crate::log::debug!(error = ?miette::Report::new(err), "payload rejected");
            return Sanitized::none(warnings);
        }
    };

    let Value::Object(root) = root else {
        warnings.push(Warning::DegradedInput(PayloadError::NotAnObject.to_string()));
        return Sanitized::none(warnings);
    };

    let body = match root.get("schema") {
        Some(Value::Object(inner)) => inner,
        _ => &root,
    };

    let mut schema = convert(body, &mut warnings);
    cover_points(&mut schema, &mut warnings);
    Sanitized { schema: Some(schema), warnings }
}

/// The outermost `{`…`}` slice, from the first `{` to the last `}`.
fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Apply the structural repairs, in order, to the text of one object.
pub fn repair(object: &str) -> String {
    let text = normalize_quotes(object);
    let text = rewrite(text, &RE_KEY_ALIAS, "\"schema\"${1}:");
    let text = rewrite(text, &RE_BRACE_BRACE, "},${1}{");
    let text = rewrite(text, &RE_CLOSE_KEY, "${1},${2}\"${3}\"${4}:");
    let text = rewrite(text, &RE_VALUE_KEY, "\",${1}\"${2}\"${3}:");
    let text = rewrite(text, &RE_SCALAR_KEY, "${1},${2}\"${3}\"${4}:");
    rewrite(text, &RE_TRAILING_COMMA, "${1}")
}

/// Replace typographic quotes with `"` and single-quoted strings with
/// double-quoted ones. Apostrophes inside double-quoted strings are kept.
fn normalize_quotes(text: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Normal,
        Double,
        Single,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Normal;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        let c = match c {
            '“' | '”' | '«' | '»' => '"',
            other => other,
        };
        match state {
            State::Normal => {
                match c {
                    '"' => state = State::Double,
                    '\'' => {
                        state = State::Single;
                        out.push('"');
                        continue;
                    }
                    _ => {}
                }
                out.push(c);
            }
            State::Double => {
                out.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else if c == '"' {
                    state = State::Normal;
                }
            }
            State::Single => match c {
                '\'' => {
                    out.push('"');
                    state = State::Normal;
                }
                '"' => out.push_str("\\\""),
                '\\' => match chars.next() {
                    Some('\'') => out.push('\''),
                    Some(next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => out.push('\\'),
                },
                _ => out.push(c),
            },
        }
    }
    out
}

/// Find every `{"type": "<marker>", …}` object in `text` and sanitize it.
///
/// Objects are delimited by a brace-balancing scan that skips braces inside
/// strings. An object whose braces never balance extends to the end of the
/// text.
pub fn extract_embedded(text: &str, marker: &str) -> Vec<Embedded> {
    let pattern = format!(
        r#"\{{\s*["'“]type["'”]\s*:\s*["'“]{}["'”]"#,
        regex_lite::escape(marker)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    let mut resume = 0;
    for m in re.find_iter(text) {
        if m.start() < resume {
            continue;
        }
        let end = balanced_end(text, m.start());
        let range = m.start()..end;
        crate::log::debug!(?range, "embedded schema found");
        found.push(Embedded {
            sanitized: sanitize(&text[range.clone()]),
            range,
        });
        resume = end;
    }
    found
}

/// Byte offset one past the brace closing the object opened at `start`.
fn balanced_end(text: &str, start: usize) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' => quote = Some('"'),
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return start + i + 1;
                }
            }
            _ => {}
        }
    }
    text.len()
}

// ============================================================================
// Lenient conversion
// ============================================================================

fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// A number, or the first number inside a string (`"8,5 cm"` → 8.5).
pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let re = RE_NUMBER.as_ref()?;
    let m = re.find(s)?;
    m.as_str().replace(',', ".").parse::<f64>().ok()
}

/// Parse `"(x, y)"`, `"x; y"` or `"(1,5; 2)"`.
fn parse_pair(s: &str) -> Option<Coordinate> {
    let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
    let (x, y) = match inner.split_once(';') {
        Some(parts) => parts,
        None => inner.split_once(',')?,
    };
    let x = x.trim().replace(',', ".").parse::<f64>().ok()?;
    let y = y.trim().replace(',', ".").parse::<f64>().ok()?;
    (x.is_finite() && y.is_finite()).then(|| dvec2(x, y))
}

fn coordinate(value: &Value) -> Option<Coordinate> {
    match value {
        Value::Array(items) if items.len() == 2 => Some(dvec2(number(&items[0])?, number(&items[1])?)),
        Value::Object(obj) => Some(dvec2(number(obj.get("x")?)?, number(obj.get("y")?)?)),
        Value::String(s) => parse_pair(s),
        _ => None,
    }
}

fn label(value: &Value) -> Option<PointLabel> {
    value.as_str().and_then(PointLabel::parse)
}

/// Labels named by a value: `"A"`, `"ABC"` or `["A", "B"]`.
fn labels(value: &Value) -> Option<Vec<PointLabel>> {
    match value {
        Value::String(s) => s.trim().chars().map(PointLabel::new).collect(),
        Value::Array(items) => items.iter().map(label).collect(),
        _ => None,
    }
}

fn segment_ref(value: &Value) -> Option<SegmentRef> {
    match value {
        Value::String(s) => SegmentRef::parse(s),
        Value::Array(items) if items.len() == 2 => {
            Some(SegmentRef(label(&items[0])?, label(&items[1])?))
        }
        _ => None,
    }
}

fn segment_pair(value: &Value) -> Option<SegmentPair> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            Some(SegmentPair(segment_ref(&items[0])?, segment_ref(&items[1])?))
        }
        Value::String(s) => {
            let (a, b) = s
                .split_once("//")
                .or_else(|| s.split_once('∥'))
                .or_else(|| s.split_once('⊥'))
                .or_else(|| s.split_once(','))?;
            Some(SegmentPair(SegmentRef::parse(a)?, SegmentRef::parse(b)?))
        }
        _ => None,
    }
}

fn length_of(obj: &Map<String, Value>) -> Option<f64> {
    first(obj, &["longueur", "length", "valeur", "value", "mesure"]).and_then(number)
}

fn segment(value: &Value) -> Option<Segment> {
    match value {
        Value::String(s) => {
            let SegmentRef(a, b) = SegmentRef::parse(s)?;
            Some(Segment::new(a, b, None))
        }
        Value::Array(items) => {
            // ["A", "B", ...] or ["AB", ...]
            let (seg, rest) = match (items.first().and_then(label), items.get(1).and_then(label)) {
                (Some(a), Some(b)) => (SegmentRef(a, b), &items[2..]),
                _ => (segment_ref(items.first()?)?, &items[1..]),
            };
            let length = rest.first().and_then(|v| match v {
                Value::Object(obj) => length_of(obj),
                other => number(other),
            });
            Some(Segment::new(seg.0, seg.1, length))
        }
        Value::Object(obj) => {
            let seg = match (obj.get("a").and_then(label), obj.get("b").and_then(label)) {
                (Some(a), Some(b)) => SegmentRef(a, b),
                _ => segment_ref(first(obj, &["points", "segment", "nom", "name"])?)?,
            };
            Some(Segment::new(seg.0, seg.1, length_of(obj)))
        }
        _ => None,
    }
}

fn is_right(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Object(obj) => first(obj, &["angle_droit", "right", "droit", "is_right"])
            .and_then(Value::as_bool)
            .unwrap_or(false),
        _ => false,
    }
}

fn angle_mark(value: &Value) -> Option<AngleMark> {
    match value {
        Value::String(s) => Some(AngleMark { vertex: PointLabel::parse(s)?, right: false }),
        Value::Array(items) => Some(AngleMark {
            vertex: label(items.first()?)?,
            right: items.get(1).is_some_and(is_right),
        }),
        Value::Object(obj) => Some(AngleMark {
            vertex: label(first(obj, &["vertex", "sommet", "point"])?)?,
            right: is_right(value),
        }),
        _ => None,
    }
}

fn entries<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> &'a [Value] {
    match first(obj, keys) {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

fn figure_name(obj: &Map<String, Value>) -> Option<&str> {
    first(obj, &["figure", "figure_type", "figure_name", "forme"])
        .and_then(Value::as_str)
        .or_else(|| {
            obj.get("type")
                .and_then(Value::as_str)
                .filter(|t| *t != DEFAULT_MARKER)
        })
}

/// Convert a parsed object into a schema, skipping what does not fit.
fn convert(obj: &Map<String, Value>, warnings: &mut Vec<Warning>) -> Schema {
    let (figure_type, name) = match figure_name(obj) {
        Some(name) => match FigureType::from_name(name) {
            Some(ty) => (ty, name.to_string()),
            None => {
                warnings.push(Warning::UnsupportedFigureType(name.to_string()));
                (FigureType::GenericPolygon, name.to_string())
            }
        },
        None => (FigureType::GenericPolygon, FigureType::GenericPolygon.to_string()),
    };
    let mut schema = Schema::new(figure_type);
    schema.figure_name = name;

    if let Some(value) = obj.get("points") {
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for item in items {
            match labels(item) {
                Some(found) => {
                    for l in found {
                        if !schema.add_point(l) {
                            warnings.push(Warning::DegradedInput(format!(
                                "duplicate point {l} dropped"
                            )));
                        }
                    }
                }
                None => warnings.push(Warning::DegradedInput(format!("invalid point {item}"))),
            }
        }
    }

    if let Some(Value::Object(coords)) =
        first(obj, &["coordonnees", "coordonnées", "coordinates", "coords", "labels"])
    {
        let derive_points = schema.points.is_empty();
        for (key, value) in coords {
            match (PointLabel::parse(key), coordinate(value)) {
                (Some(l), Some(at)) => {
                    schema.set_coord(l, at);
                    if derive_points {
                        schema.add_point(l);
                    }
                }
                _ => warnings.push(Warning::DegradedInput(format!(
                    "invalid coordinate entry {key}: {value}"
                ))),
            }
        }
    }

    for item in entries(obj, &["segments"]) {
        match segment(item) {
            Some(seg) => match schema.segment_mut(seg.a, seg.b) {
                Some(existing) => {
                    if seg.length.is_some() {
                        existing.length = seg.length;
                    }
                }
                None => schema.segments.push(seg),
            },
            None => warnings.push(Warning::DegradedInput(format!("invalid segment {item}"))),
        }
    }

    for item in entries(obj, &["angles", "angle_marks"]) {
        match angle_mark(item) {
            Some(mark) => {
                if mark.right {
                    schema.add_right_angle(mark.vertex);
                } else if !schema.angle_marks.iter().any(|m| m.vertex == mark.vertex) {
                    schema.angle_marks.push(mark);
                }
            }
            None => warnings.push(Warning::DegradedInput(format!("invalid angle {item}"))),
        }
    }
    for item in entries(obj, &["angles_droits", "right_angles"]) {
        match label(item) {
            Some(vertex) => {
                schema.add_right_angle(vertex);
            }
            None => warnings.push(Warning::DegradedInput(format!("invalid right angle {item}"))),
        }
    }

    for item in entries(obj, &["paralleles", "parallèles", "parallels"]) {
        match segment_pair(item) {
            Some(pair) => {
                schema.add_parallel(pair);
            }
            None => warnings.push(Warning::DegradedInput(format!("invalid parallel pair {item}"))),
        }
    }
    for item in entries(obj, &["perpendiculaires", "perpendiculars"]) {
        match segment_pair(item) {
            Some(pair) => {
                schema.add_perpendicular(pair);
            }
            None => warnings.push(Warning::DegradedInput(format!(
                "invalid perpendicular pair {item}"
            ))),
        }
    }

    // dimensions may sit at the top level or in a nested object
    let nested = match first(obj, &["params", "parametres", "paramètres", "dimensions"]) {
        Some(Value::Object(inner)) => Some(inner),
        _ => None,
    };
    let param = |keys: &[&str]| nested.and_then(|p| first(p, keys)).or_else(|| first(obj, keys));
    let params = &mut schema.params;
    params.radius = param(&["rayon", "radius"]).and_then(number);
    params.side = param(&["cote", "côté", "side"]).and_then(number);
    params.height = param(&["hauteur", "height"]).and_then(number);
    params.length = param(&["longueur", "length"]).and_then(number);
    params.width = param(&["largeur", "width"]).and_then(number);
    params.base_shape = param(&["base", "base_shape", "forme_base"]).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        _ => None,
    });

    schema
}

/// Give every declared point without a coordinate a distinct placeholder.
fn cover_points(schema: &mut Schema, warnings: &mut Vec<Warning>) {
    for (i, l) in schema.points.clone().into_iter().enumerate() {
        if schema.coordinates.contains_key(&l) {
            continue;
        }
        let mut at = dvec2(PLACEHOLDER_SPACING * (i + 1) as f64, -PLACEHOLDER_SPACING);
        while schema.coordinates.values().any(|c| c.distance(at) < 1e-9) {
            at.y -= PLACEHOLDER_SPACING;
        }
        schema.coordinates.insert(l, at);
        schema.placeholders.push(l);
        warnings.push(Warning::DegradedInput(format!(
            "point {l} has no coordinate, placeholder ({}, {})",
            at.x, at.y
        )));
    }
}
