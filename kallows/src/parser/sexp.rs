use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("Parse error at position {0}: {1}")]
    ParseError(usize, String),
}

/// A node of a KiCad S-expression document.
///
/// Quoted strings are kept apart from bare symbols so that a document
/// written back out quotes exactly what KiCad quoted.
#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    Atom(String),
    Str(String),
    List(Vec<SExp>),
}

impl SExp {
    pub fn atom(value: impl Into<String>) -> Self {
        SExp::Atom(value.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        SExp::Str(value.into())
    }

    pub fn number(value: f64) -> Self {
        SExp::Atom(format_number(value))
    }

    /// Build `(tag items...)`.
    pub fn node(tag: &str, items: Vec<SExp>) -> Self {
        let mut list = Vec::with_capacity(items.len() + 1);
        list.push(SExp::atom(tag));
        list.extend(items);
        SExp::List(list)
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExp::Atom(s) | SExp::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_atom().and_then(|s| s.parse().ok())
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<SExp>> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    /// The leading symbol of a list, e.g. `footprint` for `(footprint ...)`.
    pub fn tag(&self) -> Option<&str> {
        self.as_list()
            .and_then(|items| items.first())
            .and_then(|first| match first {
                SExp::Atom(s) => Some(s.as_str()),
                _ => None,
            })
    }

    pub fn get(&self, key: &str) -> Option<&SExp> {
        let item = self.child(key)?;
        let sublist = item.as_list()?;
        match sublist.len() {
            2 => Some(&sublist[1]),
            n if n > 2 => Some(item),
            _ => None,
        }
    }

    pub fn get_all(&self, key: &str) -> Vec<&SExp> {
        match self {
            SExp::List(items) => items.iter().filter(|item| item.tag() == Some(key)).collect(),
            _ => Vec::new(),
        }
    }

    /// First direct child list tagged `key`.
    pub fn child(&self, key: &str) -> Option<&SExp> {
        self.as_list()?.iter().find(|item| item.tag() == Some(key))
    }

    pub fn child_mut(&mut self, key: &str) -> Option<&mut SExp> {
        self.as_list_mut()?.iter_mut().find(|item| item.tag() == Some(key))
    }

    /// The first value of `(key value ...)` as text.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.child(key)?.as_list()?.get(1)?.as_atom()
    }

    pub fn value_f64(&self, key: &str) -> Option<f64> {
        self.value(key).and_then(|s| s.parse().ok())
    }

    /// Replace the values of `(key ...)`, appending the child when absent.
    pub fn set_child(&mut self, key: &str, values: Vec<SExp>) {
        let replacement = SExp::node(key, values);
        if let Some(existing) = self.child_mut(key) {
            *existing = replacement;
        } else if let Some(items) = self.as_list_mut() {
            items.push(replacement);
        }
    }

    pub fn remove_children(&mut self, key: &str) {
        if let Some(items) = self.as_list_mut() {
            items.retain(|item| item.tag() != Some(key));
        }
    }

    pub fn push(&mut self, item: SExp) {
        if let Some(items) = self.as_list_mut() {
            items.push(item);
        }
    }

    /// Render in the indented layout KiCad itself writes.
    pub fn to_pretty_string(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0);
        out.push('\n');
        out
    }

    fn write_pretty(&self, out: &mut String, depth: usize) {
        let items = match self {
            SExp::List(items) if !self.fits_inline() => items,
            _ => {
                out.push_str(&self.to_string());
                return;
            }
        };

        out.push('(');
        let mut seen_list = false;
        for (i, item) in items.iter().enumerate() {
            let breaks = seen_list || matches!(item, SExp::List(_));
            if breaks && i > 0 {
                out.push('\n');
                out.push_str(&"\t".repeat(depth + 1));
            } else if i > 0 {
                out.push(' ');
            }
            seen_list |= matches!(item, SExp::List(_));
            item.write_pretty(out, depth + 1);
        }
        out.push('\n');
        out.push_str(&"\t".repeat(depth));
        out.push(')');
    }

    fn fits_inline(&self) -> bool {
        match self {
            SExp::List(items) => {
                let shallow = items.iter().all(|item| match item {
                    SExp::List(inner) => inner.iter().all(|i| !matches!(i, SExp::List(_))),
                    _ => true,
                });
                shallow && self.to_string().len() <= 80
            }
            _ => true,
        }
    }
}

/// Format a millimetre value the way KiCad does: no exponent, no trailing zeros.
pub fn format_number(value: f64) -> String {
    let rounded = (value * 1_000_000.0).round() / 1_000_000.0;
    let mut s = format!("{:.6}", rounded);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.chars()
            .any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '"')
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    write!(f, "\"{}\"", escaped)
}

impl fmt::Display for SExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExp::Atom(s) if needs_quotes(s) => write_quoted(f, s),
            SExp::Atom(s) => write!(f, "{}", s),
            SExp::Str(s) => write_quoted(f, s),
            SExp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

pub struct SExpParser {
    input: Vec<char>,
    pos: usize,
}

impl SExpParser {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    pub fn parse(&mut self) -> Result<SExp, ParseError> {
        self.skip_whitespace();
        if self.is_eof() {
            return Err(ParseError::UnexpectedEof);
        }
        self.parse_sexp()
    }

    fn parse_sexp(&mut self) -> Result<SExp, ParseError> {
        self.skip_whitespace();

        if self.is_eof() {
            return Err(ParseError::UnexpectedEof);
        }

        match self.peek() {
            '(' => self.parse_list(),
            ')' => Err(ParseError::ParseError(
                self.pos,
                "unbalanced ')'".to_string(),
            )),
            _ => self.parse_atom(),
        }
    }

    fn parse_list(&mut self) -> Result<SExp, ParseError> {
        self.expect_char('(')?;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();

            if self.is_eof() {
                return Err(ParseError::UnexpectedEof);
            }

            if self.peek() == ')' {
                self.advance();
                break;
            }

            items.push(self.parse_sexp()?);
        }

        Ok(SExp::List(items))
    }

    fn parse_atom(&mut self) -> Result<SExp, ParseError> {
        self.skip_whitespace();

        if self.peek() == '"' {
            self.parse_string()
        } else {
            self.parse_symbol()
        }
    }

    fn parse_string(&mut self) -> Result<SExp, ParseError> {
        let start = self.pos;
        self.expect_char('"')?;
        let mut s = String::new();
        let mut escaped = false;

        while !self.is_eof() {
            let ch = self.peek();
            self.advance();

            if escaped {
                match ch {
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    'r' => s.push('\r'),
                    _ => s.push(ch),
                }
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                return Ok(SExp::Str(s));
            } else {
                s.push(ch);
            }
        }

        Err(ParseError::ParseError(
            start,
            "unterminated string".to_string(),
        ))
    }

    fn parse_symbol(&mut self) -> Result<SExp, ParseError> {
        let mut s = String::new();

        while !self.is_eof() {
            let ch = self.peek();
            if ch.is_whitespace() || ch == '(' || ch == ')' {
                break;
            }
            s.push(ch);
            self.advance();
        }

        if s.is_empty() {
            Err(ParseError::UnexpectedToken("empty symbol".to_string()))
        } else {
            Ok(SExp::Atom(s))
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.peek().is_whitespace() {
            self.advance();
        }
    }

    fn peek(&self) -> char {
        self.input.get(self.pos).copied().unwrap_or('\0')
    }

    fn advance(&mut self) {
        if self.pos < self.input.len() {
            self.pos += 1;
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        if self.is_eof() {
            return Err(ParseError::UnexpectedEof);
        }

        let ch = self.peek();
        if ch == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken(format!(
                "Expected '{}', found '{}'",
                expected, ch
            )))
        }
    }
}
