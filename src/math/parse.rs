//! Parse pest pairs into math nodes

use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::errors::MathError;

#[derive(Parser)]
#[grammar = "math.pest"]
pub struct MathParser;

/// A laid-out-able math expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A run of ordinary characters
    Text(String),
    /// A binary operator or relation, drawn with space on both sides
    Op(String),
    /// Horizontal space in ems
    Space(f64),
    Row(Vec<Node>),
    Frac(Box<Node>, Box<Node>),
    Sqrt {
        index: Option<Box<Node>>,
        body: Box<Node>,
    },
    Overline(Box<Node>),
    Scripts {
        base: Box<Node>,
        sup: Option<Box<Node>>,
        sub: Option<Box<Node>>,
    },
}

impl Node {
    /// Build a row, flattening nested rows, merging adjacent text runs and
    /// unwrapping singletons.
    pub fn row(nodes: Vec<Node>) -> Node {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            push_flat(&mut out, node);
        }
        if out.len() == 1 {
            if let Some(only) = out.pop() {
                return only;
            }
        }
        Node::Row(out)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Row(nodes) if nodes.is_empty())
    }
}

fn push_flat(out: &mut Vec<Node>, node: Node) {
    match node {
        Node::Row(inner) => {
            for n in inner {
                push_flat(out, n);
            }
        }
        Node::Text(next) => match out.last_mut() {
            Some(Node::Text(prev)) => prev.push_str(&next),
            _ => out.push(Node::Text(next)),
        },
        other => out.push(other),
    }
}

/// Symbol commands and what they draw. Operators get surrounding space.
const SYMBOLS: &[(&str, &str, bool)] = &[
    ("times", "×", true),
    ("div", "÷", true),
    ("pm", "±", true),
    ("mp", "∓", true),
    ("cdot", "·", true),
    ("le", "≤", true),
    ("leq", "≤", true),
    ("ge", "≥", true),
    ("geq", "≥", true),
    ("ne", "≠", true),
    ("neq", "≠", true),
    ("approx", "≈", true),
    ("equiv", "≡", true),
    ("sim", "∼", true),
    ("simeq", "≃", true),
    ("in", "∈", true),
    ("notin", "∉", true),
    ("parallel", "∥", true),
    ("perp", "⊥", true),
    ("to", "→", true),
    ("rightarrow", "→", true),
    ("Rightarrow", "⇒", true),
    ("iff", "⇔", true),
    ("Leftrightarrow", "⇔", true),
    ("infty", "∞", false),
    ("pi", "π", false),
    ("alpha", "α", false),
    ("beta", "β", false),
    ("gamma", "γ", false),
    ("delta", "δ", false),
    ("Delta", "Δ", false),
    ("theta", "θ", false),
    ("lambda", "λ", false),
    ("mu", "μ", false),
    ("sigma", "σ", false),
    ("omega", "ω", false),
    ("varphi", "φ", false),
    ("phi", "ϕ", false),
    ("circ", "°", false),
    ("degree", "°", false),
    ("angle", "∠", false),
    ("triangle", "△", false),
    ("ldots", "…", false),
    ("dots", "…", false),
    ("cdots", "⋯", false),
    ("%", "%", false),
    ("$", "$", false),
    ("&", "&", false),
    ("#", "#", false),
    ("_", "_", false),
    ("{", "{", false),
    ("}", "}", false),
];

/// Spacing commands, in ems.
const SPACES: &[(&str, f64)] = &[
    (",", 0.17),
    (":", 0.22),
    (";", 0.28),
    ("!", -0.17),
    (" ", 0.33),
    ("\\", 0.33),
    ("quad", 1.0),
    ("qquad", 2.0),
];

/// Characters drawn as binary operators when typed directly.
const OPERATORS: &str = "+=<>×÷±∓·≤≥≠≈∈⇒⇔→";

/// Parse the body of one math span.
pub fn parse(body: &str) -> Result<Node, MathError> {
    if body.trim().is_empty() {
        return Err(MathError::Empty);
    }
    let pairs = MathParser::parse(Rule::math, body).map_err(|e| {
        let span = match e.location {
            InputLocation::Pos(pos) => (pos, 0),
            InputLocation::Span((start, end)) => (start, end.saturating_sub(start)),
        };
        MathError::parse(body, span)
    })?;

    let mut root = Node::Row(Vec::new());
    for pair in pairs {
        if pair.as_rule() == Rule::math {
            for inner in pair.into_inner() {
                if inner.as_rule() == Rule::row {
                    root = parse_row(inner, body)?;
                }
            }
        }
    }
    Ok(root)
}

/// Parse a pair whose children are terms (`row`, `index`).
fn parse_row(pair: Pair<Rule>, src: &str) -> Result<Node, MathError> {
    let mut nodes = Vec::new();
    for term in pair.into_inner() {
        nodes.push(parse_term(term, src)?);
    }
    Ok(Node::row(nodes))
}

fn parse_term(pair: Pair<Rule>, src: &str) -> Result<Node, MathError> {
    let mut inner = pair.into_inner();
    let Some(first) = inner.next() else {
        return Ok(Node::Row(Vec::new()));
    };
    let base = parse_atom(first, src)?;

    let mut sup = None;
    let mut sub = None;
    for script in inner {
        let rule = script.as_rule();
        let arg = match script.into_inner().next() {
            Some(p) => parse_atom(p, src)?,
            None => Node::Row(Vec::new()),
        };
        match rule {
            Rule::sup => sup = Some(Box::new(arg)),
            Rule::sub => sub = Some(Box::new(arg)),
            _ => {}
        }
    }

    if sup.is_none() && sub.is_none() {
        Ok(base)
    } else {
        Ok(Node::Scripts { base: Box::new(base), sup, sub })
    }
}

fn parse_atom(pair: Pair<Rule>, src: &str) -> Result<Node, MathError> {
    match pair.as_rule() {
        Rule::group => match pair.into_inner().next() {
            Some(row) => parse_row(row, src),
            None => Ok(Node::Row(Vec::new())),
        },
        Rule::frac => {
            let mut args = Vec::with_capacity(2);
            for p in pair.into_inner().filter(|p| p.as_rule() != Rule::frac_kw) {
                args.push(parse_atom(p, src)?);
            }
            let den = args.pop().unwrap_or(Node::Row(Vec::new()));
            let num = args.pop().unwrap_or(Node::Row(Vec::new()));
            Ok(Node::Frac(Box::new(num), Box::new(den)))
        }
        Rule::sqrt => {
            let mut index = None;
            let mut body = Node::Row(Vec::new());
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::sqrt_kw => {}
                    Rule::index => {
                        let node = parse_row(p, src)?;
                        if !node.is_empty() {
                            index = Some(Box::new(node));
                        }
                    }
                    _ => body = parse_atom(p, src)?,
                }
            }
            Ok(Node::Sqrt { index, body: Box::new(body) })
        }
        Rule::overline => {
            let arg = pair.into_inner().find(|p| p.as_rule() != Rule::overline_kw);
            let body = match arg {
                Some(p) => parse_atom(p, src)?,
                None => Node::Row(Vec::new()),
            };
            Ok(Node::Overline(Box::new(body)))
        }
        Rule::text => {
            let body = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::text_body)
                .map(|p| p.as_str())
                .unwrap_or_default();
            Ok(text_run(body))
        }
        Rule::fence => {
            let delim = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::delimiter)
                .map(|p| p.as_str())
                .unwrap_or_default();
            Ok(delimiter(delim))
        }
        Rule::symbol => command(pair, src),
        Rule::number | Rule::digit => Ok(Node::Text(pair.as_str().to_string())),
        Rule::glyph => Ok(glyph(pair.as_str())),
        _ => Ok(Node::Row(Vec::new())),
    }
}

fn command(pair: Pair<Rule>, src: &str) -> Result<Node, MathError> {
    let name = pair.as_str().trim_start_matches('\\');
    // `\\` itself trims to nothing
    let name = if name.is_empty() { "\\" } else { name };
    if let Some((_, em)) = SPACES.iter().find(|(n, _)| *n == name) {
        return Ok(Node::Space(*em));
    }
    if let Some((_, glyph, op)) = SYMBOLS.iter().find(|(n, _, _)| *n == name) {
        return Ok(if *op { Node::Op(glyph.to_string()) } else { Node::Text(glyph.to_string()) });
    }
    let span = pair.as_span();
    Err(MathError::unknown_command(src, name, (span.start(), span.end() - span.start())))
}

fn glyph(s: &str) -> Node {
    match s {
        "-" => Node::Op("−".to_string()),
        "*" => Node::Op("×".to_string()),
        _ if OPERATORS.contains(s) => Node::Op(s.to_string()),
        _ => Node::Text(s.to_string()),
    }
}

fn delimiter(d: &str) -> Node {
    let s = match d {
        "." => return Node::Row(Vec::new()),
        "\\{" => "{",
        "\\}" => "}",
        "\\|" => "‖",
        "\\langle" => "⟨",
        "\\rangle" => "⟩",
        other => other,
    };
    Node::Text(s.to_string())
}

/// Upright text, keeping leading and trailing blanks as explicit space.
fn text_run(s: &str) -> Node {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return if s.is_empty() { Node::Row(Vec::new()) } else { Node::Space(0.33) };
    }
    let mut nodes = Vec::new();
    if s.starts_with(char::is_whitespace) {
        nodes.push(Node::Space(0.33));
    }
    nodes.push(Node::Text(trimmed.to_string()));
    if s.ends_with(char::is_whitespace) {
        nodes.push(Node::Space(0.33));
    }
    Node::row(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    #[test]
    fn grammar_accepts_common_markup() {
        for input in [
            r"\frac{a}{b}",
            r"\sqrt{x^2 + y^2}",
            r"x_{1}^{2}",
            r"\left( a + b \right)",
            r"AB = 8\text{ cm}",
            r"\sqrt[3]{27}",
            r"\overline{AB}",
            r"\frac12",
        ] {
            let result = MathParser::parse(Rule::math, input);
            assert!(result.is_ok(), "failed to parse: {input}");
        }
    }

    #[test]
    fn adjacent_text_is_merged() {
        assert_eq!(parse("AB").unwrap(), text("AB"));
    }

    #[test]
    fn operators_are_spaced() {
        assert_eq!(
            parse("AB = 8").unwrap(),
            Node::Row(vec![text("AB"), Node::Op("=".into()), text("8")])
        );
        assert_eq!(parse(r"a \times b").unwrap(), Node::Row(vec![
            text("a"),
            Node::Op("×".into()),
            text("b")
        ]));
    }

    #[test]
    fn fraction() {
        assert_eq!(
            parse(r"\frac{1}{2}").unwrap(),
            Node::Frac(Box::new(text("1")), Box::new(text("2")))
        );
    }

    #[test]
    fn scripts_attach_to_the_previous_atom() {
        assert_eq!(
            parse("x^2_i").unwrap(),
            Node::Scripts {
                base: Box::new(text("x")),
                sup: Some(Box::new(text("2"))),
                sub: Some(Box::new(text("i"))),
            }
        );
    }

    #[test]
    fn single_digit_superscript() {
        // x^23 is x² followed by 3
        let Node::Row(nodes) = parse("x^23").unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1], text("3"));
    }

    #[test]
    fn sqrt_with_index() {
        assert_eq!(
            parse(r"\sqrt[3]{27}").unwrap(),
            Node::Sqrt { index: Some(Box::new(text("3"))), body: Box::new(text("27")) }
        );
    }

    #[test]
    fn text_keeps_spacing() {
        assert_eq!(
            parse(r"8\text{ cm}").unwrap(),
            Node::Row(vec![text("8"), Node::Space(0.33), text("cm")])
        );
    }

    #[test]
    fn fences_draw_their_delimiter() {
        assert_eq!(parse(r"\left( x \right)").unwrap(), text("(x)"));
        assert_eq!(parse(r"\left. x \right|").unwrap(), text("x|"));
    }

    #[test]
    fn unknown_command_is_an_error() {
        let err = parse(r"a \foo b").unwrap_err();
        let MathError::UnknownCommand { name, span, .. } = &err else {
            panic!("expected unknown command, got {err:?}");
        };
        assert_eq!(name, "foo");
        assert_eq!(span.offset(), 2);
    }

    #[test]
    fn unbalanced_brace_is_a_parse_error() {
        assert!(matches!(parse(r"\frac{1}{2"), Err(MathError::Parse { .. })));
        assert!(matches!(parse("a}"), Err(MathError::Parse { .. })));
    }

    #[test]
    fn blank_body_is_empty() {
        assert!(matches!(parse("  "), Err(MathError::Empty)));
    }
}
