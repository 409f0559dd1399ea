//! Fact extraction from exercise statements
//!
//! Each extractor is an independent pattern scan over the statement and
//! returns zero or more [`Fact`]s tagged with their byte offset. Nothing here
//! looks at a schema; merging happens in [`crate::reconcile`].

use std::sync::LazyLock;

use glam::dvec2;
use regex_lite::{Captures, Regex};

use crate::sanitize::parse_number;
use crate::schema::{Coordinate, PointLabel, SegmentRef};

/// One atomic observation about the figure.
#[derive(Clone, Debug, PartialEq)]
pub enum FactKind {
    PointMention(PointLabel),
    CoordinateAssertion(PointLabel, Coordinate),
    LengthAssertion(PointLabel, PointLabel, f64),
    ParallelAssertion(SegmentRef, SegmentRef),
    PerpendicularAssertion(SegmentRef, SegmentRef),
    RightAngleAssertion(PointLabel),
}

/// A fact and where it was found.
#[derive(Clone, Debug, PartialEq)]
pub struct Fact {
    /// Byte offset of the match in the statement
    pub offset: usize,
    pub kind: FactKind,
}

impl Fact {
    fn new(offset: usize, kind: FactKind) -> Self {
        Self { offset, kind }
    }
}

const SEG: &str = r"\(?\s*\b([A-Z]) ?([A-Z])\b\s*\)?";
const NUM_DOT: &str = r"-?\d+(?:\.\d+)?";
const NUM_ANY: &str = r"-?\d+(?:[.,]\d+)?";
const UNIT: &str = r"(?:\s*(?:mm|cm|dm|km|m)\b)?";

static RE_UPPER_RUN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{1,4}\b").ok());
/// Phrases where a sentence-initial `A` is the preposition "à" written
/// without its accent.
static RE_ARTICLE_PHRASE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^\s+(?:partir|l['’]aide|l['’]inverse|cause|quel|quelle|quels|quelles|chaque|présent|nouveau|noter|propos|savoir|condition|moins|peu)\b",
    )
    .ok()
});
static RE_COORD_COMMA: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(r"\b([A-Z])\s*\(\s*({NUM_DOT})\s*,\s*({NUM_DOT})\s*\)")).ok()
});
static RE_COORD_SEMI: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(r"\b([A-Z])\s*\(\s*({NUM_ANY})\s*;\s*({NUM_ANY})\s*\)")).ok()
});
static RE_LENGTH_EQ: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(r"\[?\b([A-Z])([A-Z])\]?\s*=\s*({NUM_ANY}){UNIT}")).ok()
});
static RE_LENGTH_WORD: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\[?\b([A-Z])([A-Z])\]?\s+(?:mesure|vaut|fait|de|measures|is|of)\s+({NUM_ANY}){UNIT}"
    ))
    .ok()
});
static RE_PARALLEL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{SEG}\s*(?://|∥|est parallèle à|is parallel to)\s*{SEG}"
    ))
    .ok()
});
static RE_PERPENDICULAR: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{SEG}\s*(?:⊥|_\|_|est perpendiculaire à|is perpendicular to)\s*{SEG}"
    ))
    .ok()
});
static RE_RIGHT_ANGLE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i:rectangle en|angle droit en|droit en|perpendiculaires en|right[- ]angled? at)\s+([A-Z])\b",
    )
    .ok()
});

fn captures<'t>(re: &LazyLock<Option<Regex>>, text: &'t str) -> Vec<Captures<'t>> {
    match re.as_ref() {
        Some(re) => re.captures_iter(text).collect(),
        None => Vec::new(),
    }
}

fn letter(caps: &Captures<'_>, i: usize) -> Option<PointLabel> {
    caps.get(i)?.as_str().chars().next().and_then(PointLabel::new)
}

fn start(caps: &Captures<'_>) -> usize {
    caps.get(0).map_or(0, |m| m.start())
}

/// Is the single letter at `at` an unaccented "À" opening a sentence, as in
/// "A partir de"? A sentence-initial `A` followed by anything else is a point.
fn is_sentence_article(text: &str, at: usize) -> bool {
    if &text[at..at + 1] != "A" {
        return false;
    }
    let before = text[..at].trim_end();
    let sentence_start = before.is_empty() || before.ends_with(['.', '!', '?', ':', '\n']);
    let opens_phrase = RE_ARTICLE_PHRASE
        .as_ref()
        .is_some_and(|re| re.is_match(&text[at + 1..]));
    sentence_start && opens_phrase
}

/// Standalone uppercase letters and the letters of 2 to 4 letter uppercase
/// runs (`AB`, `ABC`, `ABCD`). Each label is reported once, at its first
/// occurrence.
pub fn point_mentions(text: &str) -> Vec<Fact> {
    let Some(re) = RE_UPPER_RUN.as_ref() else {
        return Vec::new();
    };
    let mut seen: Vec<PointLabel> = Vec::new();
    let mut facts = Vec::new();
    for m in re.find_iter(text) {
        if m.len() == 1 && is_sentence_article(text, m.start()) {
            continue;
        }
        for (i, c) in m.as_str().char_indices() {
            let Some(label) = PointLabel::new(c) else {
                continue;
            };
            if !seen.contains(&label) {
                seen.push(label);
                facts.push(Fact::new(m.start() + i, FactKind::PointMention(label)));
            }
        }
    }
    facts
}

/// `A(1, 2)`, `A(1.5, -2)` and `A(1,5 ; 2)`.
pub fn coordinate_assertions(text: &str) -> Vec<Fact> {
    let mut facts: Vec<Fact> = captures(&RE_COORD_COMMA, text)
        .iter()
        .chain(captures(&RE_COORD_SEMI, text).iter())
        .filter_map(|caps| {
            let label = letter(caps, 1)?;
            let x = parse_number(caps.get(2)?.as_str())?;
            let y = parse_number(caps.get(3)?.as_str())?;
            Some(Fact::new(
                start(caps),
                FactKind::CoordinateAssertion(label, dvec2(x, y)),
            ))
        })
        .collect();
    facts.sort_by_key(|f| f.offset);
    facts
}

/// `AB = 8 cm`, `AB = 8,5`, `[AB] = 3 m`, `AB mesure 8 cm`, `le segment AB de 8 cm`.
pub fn length_assertions(text: &str) -> Vec<Fact> {
    let mut facts: Vec<Fact> = captures(&RE_LENGTH_EQ, text)
        .iter()
        .chain(captures(&RE_LENGTH_WORD, text).iter())
        .filter_map(|caps| {
            let a = letter(caps, 1)?;
            let b = letter(caps, 2)?;
            if a == b {
                return None;
            }
            let length = parse_number(caps.get(3)?.as_str())?;
            Some(Fact::new(start(caps), FactKind::LengthAssertion(a, b, length)))
        })
        .collect();
    facts.sort_by_key(|f| f.offset);
    facts
}

fn segment_pairs(
    re: &LazyLock<Option<Regex>>,
    text: &str,
) -> Vec<(usize, SegmentRef, SegmentRef)> {
    captures(re, text)
        .iter()
        .filter_map(|caps| {
            let first = SegmentRef(letter(caps, 1)?, letter(caps, 2)?);
            let second = SegmentRef(letter(caps, 3)?, letter(caps, 4)?);
            Some((start(caps), first, second))
        })
        .collect()
}

/// `(AB) // (CD)`, `AB // CD`, `A B // C D`, `AB ∥ CD`.
pub fn parallel_assertions(text: &str) -> Vec<Fact> {
    segment_pairs(&RE_PARALLEL, text)
        .into_iter()
        .map(|(at, a, b)| Fact::new(at, FactKind::ParallelAssertion(a, b)))
        .collect()
}

/// `(AB) ⊥ (CD)`, `AB ⊥ CD`, `AB _|_ CD`.
pub fn perpendicular_assertions(text: &str) -> Vec<Fact> {
    segment_pairs(&RE_PERPENDICULAR, text)
        .into_iter()
        .map(|(at, a, b)| Fact::new(at, FactKind::PerpendicularAssertion(a, b)))
        .collect()
}

/// "rectangle en B", "angle droit en B", "right angle at B", ...
pub fn right_angle_assertions(text: &str) -> Vec<Fact> {
    captures(&RE_RIGHT_ANGLE, text)
        .iter()
        .filter_map(|caps| {
            let vertex = letter(caps, 1)?;
            Some(Fact::new(start(caps), FactKind::RightAngleAssertion(vertex)))
        })
        .collect()
}

/// Run every extractor and order the facts by position in the text.
pub fn extract_facts(text: &str) -> Vec<Fact> {
    let mut facts = point_mentions(text);
    facts.extend(coordinate_assertions(text));
    facts.extend(length_assertions(text));
    facts.extend(parallel_assertions(text));
    facts.extend(perpendicular_assertions(text));
    facts.extend(right_angle_assertions(text));
    facts.sort_by_key(|f| f.offset);
    crate::log::debug!(count = facts.len(), "facts extracted");
    facts
}
