//! Reference expressions and their parser.
//!
//! A reference is written `{name}` or `{name.field[0].sub}`. Text that
//! embeds references, such as `"hello {user.name}"`, parses to a template.
//! Braced text that is not a well-formed reference stays literal, and a
//! backslash before a brace or another backslash makes that character literal.

use std::fmt;

/// One step of a reference path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A record field. Purely numeric keys also index sequences.
    Key(String),
    /// A zero-based sequence index, written `[n]`.
    Index(usize),
}

/// A parsed `{root.path}` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    root: String,
    segments: Vec<Segment>,
}

impl Reference {
    /// Parses the text between the braces of a reference.
    ///
    /// Returns `None` if the text is not a well-formed path.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut cursor = Cursor::new(text.trim());
        let root = cursor.ident()?;
        let mut segments = Vec::new();

        while let Some(c) = cursor.bump() {
            match c {
                '.' => {
                    let key = cursor.ident().or_else(|| cursor.digits())?;
                    segments.push(Segment::Key(key));
                }
                '[' => {
                    let index = cursor.digits()?.parse().ok()?;
                    if cursor.bump()? != ']' {
                        return None;
                    }
                    segments.push(Segment::Index(index));
                }
                _ => return None,
            }
        }

        Some(Self { root, segments })
    }

    /// Creates a reference to a bare name.
    #[must_use]
    pub fn name(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    /// Returns the binding name the path starts from.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the field/index path after the root.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Renders the path up to (and including) `count` segments.
    #[must_use]
    pub fn prefix(&self, count: usize) -> String {
        let mut out = self.root.clone();
        for segment in self.segments.iter().take(count) {
            match segment {
                Segment::Key(key) => {
                    out.push('.');
                    out.push_str(key);
                }
                Segment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix(self.segments.len()))
    }
}

/// A piece of an interpolated template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    /// Literal text.
    Text(String),
    /// A reference to substitute.
    Ref(Reference),
}

/// A parsed string expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Plain text with no references.
    Literal(String),
    /// A whole-string reference. Resolves to the raw value.
    Reference(Reference),
    /// Text with one or more embedded references. Resolves to a string.
    Template(Vec<TemplatePart>),
}

impl Expr {
    /// Parses a string into an expression.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let parts = parse_template(input);
        let has_refs = parts.iter().any(|p| matches!(p, TemplatePart::Ref(_)));

        match parts.as_slice() {
            [TemplatePart::Ref(reference)] => Self::Reference(reference.clone()),
            _ if has_refs => Self::Template(parts),
            [TemplatePart::Text(text)] => Self::Literal(text.clone()),
            _ => Self::Literal(String::new()),
        }
    }

    /// Parses a loop source, where the braces are optional.
    #[must_use]
    pub fn parse_path(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with('{') {
            return Self::parse(trimmed);
        }
        Reference::parse(trimmed).map_or_else(|| Self::parse(input), Self::Reference)
    }
}

/// Escapes text so it parses back to itself as a literal.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '{' | '}' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn parse_template(input: &str) -> Vec<TemplatePart> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut rest = input;

    while let Some(open) = rest.find(['{', '\\']) {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        if rest[open..].starts_with('\\') {
            match after.chars().next() {
                Some(c @ ('{' | '}' | '\\')) => {
                    text.push(c);
                    rest = &after[1..];
                }
                _ => {
                    text.push('\\');
                    rest = after;
                }
            }
            continue;
        }

        let reference = after
            .find('}')
            .and_then(|close| Reference::parse(&after[..close]).map(|r| (r, close)));

        match reference {
            Some((reference, close)) => {
                if !text.is_empty() {
                    parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                }
                parts.push(TemplatePart::Ref(reference));
                rest = &after[close + 1..];
            }
            None => {
                text.push('{');
                rest = after;
            }
        }
    }

    text.push_str(rest);
    if !text.is_empty() {
        parts.push(TemplatePart::Text(text));
    }
    parts
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.text[start..self.pos]
    }

    fn ident(&mut self) -> Option<String> {
        let first = self.peek()?;
        if !(first.is_alphabetic() || first == '_' || first == '$') {
            return None;
        }
        let ident = self.take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '$'));
        Some(ident.to_string())
    }

    fn digits(&mut self) -> Option<String> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        (!digits.is_empty()).then(|| digits.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_bare_name() {
        let r = Reference::parse("item").unwrap();
        assert_eq!(r.root(), "item");
        assert!(r.segments().is_empty());
    }

    #[test]
    fn test_parse_dotted_and_indexed_path() {
        let r = Reference::parse("fetch.rows[2].name").unwrap();
        assert_eq!(r.root(), "fetch");
        assert_eq!(
            r.segments(),
            &[
                Segment::Key("rows".to_string()),
                Segment::Index(2),
                Segment::Key("name".to_string()),
            ]
        );
        assert_eq!(r.to_string(), "fetch.rows[2].name");
        assert_eq!(r.prefix(1), "fetch.rows");
    }

    #[test]
    fn test_parse_numeric_key() {
        let r = Reference::parse("pairs.0").unwrap();
        assert_eq!(r.segments(), &[Segment::Key("0".to_string())]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Reference::parse("").is_none());
        assert!(Reference::parse("a..b").is_none());
        assert!(Reference::parse("a[x]").is_none());
        assert!(Reference::parse("a b").is_none());
        assert!(Reference::parse("\"key\": 1").is_none());
    }

    #[test]
    fn test_whole_string_reference() {
        assert_eq!(
            Expr::parse("{a.b}"),
            Expr::Reference(Reference::parse("a.b").unwrap())
        );
    }

    #[test]
    fn test_template_parts() {
        let expr = Expr::parse("Hello {user.name}!");
        assert_eq!(
            expr,
            Expr::Template(vec![
                TemplatePart::Text("Hello ".to_string()),
                TemplatePart::Ref(Reference::parse("user.name").unwrap()),
                TemplatePart::Text("!".to_string()),
            ])
        );
    }

    #[test]
    fn test_non_reference_braces_stay_literal() {
        let expr = Expr::parse("{\"json\": true}");
        assert_eq!(expr, Expr::Literal("{\"json\": true}".to_string()));
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        assert_eq!(Expr::parse("\\{user}"), Expr::Literal("{user}".to_string()));
        assert_eq!(Expr::parse("C:\\temp"), Expr::Literal("C:\\temp".to_string()));
        assert_eq!(
            Expr::parse("\\{a} {b}"),
            Expr::Template(vec![
                TemplatePart::Text("{a} ".to_string()),
                TemplatePart::Ref(Reference::parse("b").unwrap()),
            ])
        );
    }

    #[test]
    fn test_escape_parses_back_to_itself() {
        for text in ["hi {user}", "{a.b}", "dir\\{x}", "no braces", "trailing \\"] {
            assert_eq!(Expr::parse(&escape(text)), Expr::Literal(text.to_string()));
        }
    }

    #[test]
    fn test_loop_path_without_braces() {
        assert_eq!(
            Expr::parse_path("source.items"),
            Expr::Reference(Reference::parse("source.items").unwrap())
        );
        assert_eq!(
            Expr::parse_path("{source.items}"),
            Expr::Reference(Reference::parse("source.items").unwrap())
        );
    }
}
