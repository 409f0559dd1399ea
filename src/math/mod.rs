//! Math markup rendering
//!
//! Finds `$$…$$`, `\[…\]` (display) and `$…$`, `\(…\)` (inline) spans in
//! running text and replaces each with an SVG drawn from the same primitives
//! as figures. Everything outside a span is copied through unchanged.

pub mod cache;
pub mod layout;
pub mod parse;

use std::ops::Range;

pub use cache::{CacheStats, RenderCache, cache_key};

use crate::errors::MathError;
use crate::render::to_vector;

/// One math span found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathSpan {
    /// The whole span, delimiters included
    pub range: Range<usize>,
    /// The markup between the delimiters
    pub body: Range<usize>,
    pub display: bool,
}

/// Locate math spans, left to right, non-overlapping.
///
/// `\$` is a literal dollar. An inline `$…$` span may not cross a line break.
/// Unclosed or blank spans are left as text.
pub fn find_spans(text: &str) -> Vec<MathSpan> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    let mut closed = |start: usize, open: usize, close: &str, display: bool| -> Option<usize> {
        let body_start = start + open;
        let end = body_start + text[body_start..].find(close)?;
        if text[body_start..end].trim().is_empty() {
            return None;
        }
        let range_end = end + close.len();
        spans.push(MathSpan { range: start..range_end, body: body_start..end, display });
        Some(range_end)
    };

    while i < bytes.len() {
        let next = match (bytes[i], bytes.get(i + 1)) {
            (b'\\', Some(b'$')) => Some(i + 2),
            (b'\\', Some(b'(')) => closed(i, 2, "\\)", false),
            (b'\\', Some(b'[')) => closed(i, 2, "\\]", true),
            (b'$', Some(b'$')) => closed(i, 2, "$$", true).or(Some(i + 2)),
            (b'$', _) => {
                let rest = &text[i + 1..];
                match rest.find(['$', '\n']) {
                    Some(off) if rest.as_bytes()[off] == b'$' => closed(i, 1, "$", false),
                    _ => None,
                }
            }
            _ => None,
        };
        i = next.unwrap_or(i + 1);
    }
    spans
}

/// Render one span body to an SVG fragment.
pub fn render_formula(body: &str) -> Result<String, MathError> {
    let node = parse::parse(body)?;
    let fig = layout::layout(&node)?;
    Ok(to_vector(&fig, &layout::svg_options()))
}

/// Replace every math span in `text` with its rendered container.
///
/// A span that does not parse is kept, escaped, in a `math-unrendered`
/// container; the rest of the text is still processed.
pub fn render_math(text: &str, cache: &RenderCache) -> String {
    let spans = find_spans(text);
    if spans.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() * 2);
    let mut last = 0;
    for span in spans {
        out.push_str(&text[last..span.range.start]);
        let body = &text[span.body.clone()];
        match cache.get_or_try_insert_with(body, || render_formula(body)) {
            Ok(svg) if span.display => {
                out.push_str(r#"<div class="math-display">"#);
                out.push_str(&svg);
                out.push_str("</div>");
            }
            Ok(svg) => {
                out.push_str(r#"<span class="math-inline">"#);
                out.push_str(&svg);
                out.push_str("</span>");
            }
            Err(err) => {
                crate::log::warn!(error = ?miette::Report::new(err), "math span left unrendered");
                out.push_str(r#"<span class="math-unrendered">"#);
                out.push_str(&escape_html(&text[span.range.clone()]));
                out.push_str("</span>");
            }
        }
        last = span.range.end;
    }
    out.push_str(&text[last..]);
    out
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Stylesheet for the math containers.
pub fn math_css() -> &'static str {
    r#".math-inline {
    display: inline-block;
    vertical-align: middle;
    line-height: 0;
}
.math-inline svg {
    height: 1.4em;
    width: auto;
    vertical-align: middle;
}
.math-display {
    display: block;
    text-align: center;
    margin: 12px 0;
}
.math-unrendered {
    font-family: "Times New Roman", serif;
    font-style: italic;
}
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn bodies(text: &str) -> Vec<(&str, bool)> {
        find_spans(text)
            .into_iter()
            .map(|s| (&text[s.body], s.display))
            .collect()
    }

    #[test]
    fn finds_all_delimiters() {
        assert_eq!(
            bodies(r"a $x$ b $$y$$ c \(z\) d \[w\]"),
            vec![("x", false), ("y", true), ("z", false), ("w", true)]
        );
    }

    #[test]
    fn inline_dollar_does_not_cross_lines() {
        assert!(find_spans("costs 5$\nand 6$").is_empty());
    }

    #[test]
    fn escaped_dollar_is_literal() {
        assert!(find_spans(r"\$5 and \$6").is_empty());
    }

    #[test]
    fn unclosed_and_blank_spans_stay_text() {
        assert!(find_spans("$$ never closed").is_empty());
        assert!(find_spans("$ $").is_empty());
    }

    #[test]
    fn text_without_math_is_unchanged() {
        let cache = RenderCache::new(4);
        let text = "Soit ABC un triangle <rectangle> & co.";
        assert_eq!(render_math(text, &cache), text);
    }

    #[test]
    fn spans_become_containers() {
        let cache = RenderCache::new(4);
        let out = render_math(r"On a $AB = 8$ et $$\frac{1}{2}$$ fin", &cache);
        assert!(out.starts_with(r#"On a <span class="math-inline"><svg"#), "{out}");
        assert!(out.contains(r#"</svg></span> et <div class="math-display"><svg"#), "{out}");
        assert!(out.ends_with("</svg></div> fin"), "{out}");
    }

    #[test]
    fn failed_span_is_escaped() {
        let cache = RenderCache::new(4);
        assert_snapshot!(
            render_math(r"x $a < \foo$ y", &cache),
            @r#"x <span class="math-unrendered">$a &lt; \foo$</span> y"#
        );
    }

    #[test]
    fn repeated_bodies_hit_the_cache() {
        let cache = RenderCache::new(4);
        render_math("$x^2$ and $x^2$ and \\(x^2\\)", &cache);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.len, 1);
    }
}
