//! Just enough of a Python tokenizer to find string literal boundaries.
//!
//! The lexer tracks bracket depth and logical lines, skips comments, and
//! records the replacement-field structure of f-strings. It never interprets
//! expressions beyond what is needed to find where they end.

use std::ops::Range;

use crate::error::{MigrateError, MigrateResult};

const STRING_PREFIXES: &[&str] = &[
    "r", "u", "b", "f", "t", "br", "rb", "fr", "rf", "tr", "rt",
];

const OPERATORS_3: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const OPERATORS_2: &[&str] = &[
    "==", "!=", "<=", ">=", "->", ":=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=",
    "**", "//", "<<", ">>",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Name,
    Number,
    Op,
    String(Box<StringLiteral>),
    /// End of a logical line.
    Newline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Range<usize>,
    /// Bracket depth outside the token; matching brackets share a depth.
    pub(crate) depth: usize,
}

impl Token {
    pub(crate) fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span.clone()]
    }

    pub(crate) fn is_name(&self, source: &str, name: &str) -> bool {
        matches!(self.kind, TokenKind::Name) && self.text(source) == name
    }

    pub(crate) fn is_op(&self, source: &str, op: &str) -> bool {
        matches!(self.kind, TokenKind::Op) && self.text(source) == op
    }

    pub(crate) fn string(&self) -> Option<&StringLiteral> {
        match &self.kind {
            TokenKind::String(literal) => Some(literal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StringLiteral {
    pub(crate) prefix: String,
    pub(crate) quote: char,
    pub(crate) triple: bool,
    pub(crate) body: Range<usize>,
    /// Literal runs and replacement fields; empty unless the literal is an
    /// f-string or t-string.
    pub(crate) parts: Vec<FStringPart>,
}

impl StringLiteral {
    fn has_prefix(&self, flag: char) -> bool {
        self.prefix.chars().any(|c| c.eq_ignore_ascii_case(&flag))
    }

    pub(crate) fn is_fstring(&self) -> bool {
        self.has_prefix('f')
    }

    pub(crate) fn is_raw(&self) -> bool {
        self.has_prefix('r')
    }

    fn is_templated(&self) -> bool {
        self.has_prefix('f') || self.has_prefix('t')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FStringPart {
    Literal(Range<usize>),
    Field(FieldSpan),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldSpan {
    /// Expression text, up to the conversion or format spec.
    pub(crate) expression: Range<usize>,
    pub(crate) conversion: Option<char>,
    /// Format spec text, without the leading colon.
    pub(crate) spec: Option<Range<usize>>,
    pub(crate) spec_has_fields: bool,
    pub(crate) nested_fstring: bool,
}

/// Tokenizes Python source.
///
/// The returned stream has no comments and no non-logical newlines, and it
/// always ends with a [`TokenKind::Newline`].
pub(crate) fn tokenize(source: &str) -> MigrateResult<Vec<Token>> {
    Lexer {
        source,
        bytes: source.as_bytes(),
        pos: source.strip_prefix('\u{feff}').map_or(0, |_| '\u{feff}'.len_utf8()),
        depth: 0,
        tokens: Vec::new(),
    }
    .run()
}

/// 1-based line number of byte `offset`.
pub(crate) fn line_of(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

struct Lexer<'s> {
    source: &'s str,
    bytes: &'s [u8],
    pos: usize,
    depth: usize,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn run(mut self) -> MigrateResult<Vec<Token>> {
        while let Some(byte) = self.peek() {
            match byte {
                b'\n' => {
                    if self.depth == 0 {
                        self.push_newline(self.pos);
                    }
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' | b'\x0c' => self.pos += 1,
                b'#' => self.skip_comment(),
                b'\\' if self.continues_line() => {}
                b'\'' | b'"' => {
                    let start = self.pos;
                    let literal = self.string(String::new())?;
                    self.push(TokenKind::String(Box::new(literal)), start);
                }
                b'0'..=b'9' => self.number(),
                b'.' if self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => self.number(),
                _ => {
                    let ch = self.current_char();
                    if is_ident_start(ch) {
                        self.name_or_string()?;
                    } else {
                        self.operator(ch);
                    }
                }
            }
        }
        self.push_newline(self.source.len());
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn current_char(&self) -> char {
        self.source
            .get(self.pos..)
            .and_then(|rest| rest.chars().next())
            .unwrap_or('\0')
    }

    fn error(&self, reason: impl Into<String>) -> MigrateError {
        MigrateError::Lex {
            line: line_of(self.source, self.pos),
            reason: reason.into(),
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: start..self.pos,
            depth: self.depth,
        });
    }

    fn push_newline(&mut self, at: usize) {
        let after_statement = self
            .tokens
            .last()
            .is_some_and(|token| !matches!(token.kind, TokenKind::Newline));
        if after_statement {
            self.tokens.push(Token {
                kind: TokenKind::Newline,
                span: at..(at + 1).min(self.source.len()),
                depth: 0,
            });
        }
    }

    fn skip_comment(&mut self) {
        while let Some(byte) = self.peek() {
            if byte == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    /// Consumes a backslash line continuation, if one starts here.
    fn continues_line(&mut self) -> bool {
        let len = match (self.peek_at(1), self.peek_at(2)) {
            (Some(b'\n'), _) => 2,
            (Some(b'\r'), Some(b'\n')) => 3,
            _ => return false,
        };
        self.pos += len;
        true
    }

    fn number(&mut self) {
        let start = self.pos;
        let hex = self.source[start..].starts_with("0x") || self.source[start..].starts_with("0X");
        while let Some(byte) = self.peek() {
            let exponent_sign = matches!(byte, b'+' | b'-')
                && !hex
                && self.pos > start
                && matches!(self.bytes[self.pos - 1], b'e' | b'E');
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, start);
    }

    fn ident(&mut self) -> &str {
        let start = self.pos;
        for ch in self.source[start..].chars() {
            if !is_ident_continue(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        &self.source[start..self.pos]
    }

    fn name_or_string(&mut self) -> MigrateResult<()> {
        let start = self.pos;
        let name = self.ident().to_owned();
        if self.at_string_prefix(&name) {
            let literal = self.string(name)?;
            self.push(TokenKind::String(Box::new(literal)), start);
        } else {
            self.push(TokenKind::Name, start);
        }
        Ok(())
    }

    fn at_string_prefix(&self, name: &str) -> bool {
        matches!(self.peek(), Some(b'\'' | b'"'))
            && STRING_PREFIXES
                .iter()
                .any(|prefix| prefix.eq_ignore_ascii_case(name))
    }

    fn operator(&mut self, ch: char) {
        let start = self.pos;
        let rest = &self.source[start..];
        let len = OPERATORS_3
            .iter()
            .chain(OPERATORS_2)
            .find(|op| rest.starts_with(**op))
            .map_or(ch.len_utf8(), |op| op.len());

        match ch {
            '(' | '[' | '{' => {
                self.pos += len;
                self.push(TokenKind::Op, start);
                self.depth += 1;
            }
            ')' | ']' | '}' => {
                self.depth = self.depth.saturating_sub(1);
                self.pos += len;
                self.push(TokenKind::Op, start);
            }
            _ => {
                self.pos += len;
                self.push(TokenKind::Op, start);
            }
        }
    }

    fn closes(&self, quote: u8, triple: bool) -> bool {
        if triple {
            self.bytes[self.pos..].starts_with(&[quote; 3])
        } else {
            self.peek() == Some(quote)
        }
    }

    /// Lexes a string literal whose prefix has already been consumed.
    fn string(&mut self, prefix: String) -> MigrateResult<StringLiteral> {
        let quote = self.peek().unwrap_or(b'"');
        let triple = self.bytes[self.pos..].starts_with(&[quote; 3]);
        let quote_len = if triple { 3 } else { 1 };
        self.pos += quote_len;

        let mut literal = StringLiteral {
            prefix,
            quote: char::from(quote),
            triple,
            body: self.pos..self.pos,
            parts: Vec::new(),
        };
        if literal.is_templated() {
            literal.parts = self.templated_body(quote, triple, literal.is_raw())?;
        } else {
            self.plain_body(quote, triple)?;
        }
        literal.body.end = self.pos;
        self.pos += quote_len;
        Ok(literal)
    }

    fn plain_body(&mut self, quote: u8, triple: bool) -> MigrateResult<()> {
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string literal")),
                Some(b'\\') => self.skip_escaped_char(),
                Some(b'\n') if !triple => {
                    return Err(self.error("unterminated string literal"));
                }
                Some(byte) if byte == quote && self.closes(quote, triple) => return Ok(()),
                Some(_) => self.pos += 1,
            }
        }
    }

    fn templated_body(
        &mut self,
        quote: u8,
        triple: bool,
        raw: bool,
    ) -> MigrateResult<Vec<FStringPart>> {
        let mut parts = Vec::new();
        let mut literal_start = self.pos;

        loop {
            match self.peek() {
                None => return Err(self.error("unterminated f-string")),
                Some(b'\\') => self.skip_escape(raw),
                Some(b'\n') if !triple => return Err(self.error("unterminated f-string")),
                Some(byte) if byte == quote && self.closes(quote, triple) => {
                    if literal_start < self.pos {
                        parts.push(FStringPart::Literal(literal_start..self.pos));
                    }
                    return Ok(parts);
                }
                Some(b'{') if self.peek_at(1) == Some(b'{') => self.pos += 2,
                Some(b'}') if self.peek_at(1) == Some(b'}') => self.pos += 2,
                Some(b'{') => {
                    if literal_start < self.pos {
                        parts.push(FStringPart::Literal(literal_start..self.pos));
                    }
                    self.pos += 1;
                    parts.push(FStringPart::Field(self.field(quote, triple)?));
                    literal_start = self.pos;
                }
                Some(b'}') => return Err(self.error("single '}' is not allowed in an f-string")),
                Some(_) => self.pos += 1,
            }
        }
    }

    fn skip_escape(&mut self, raw: bool) {
        if raw {
            let escapes_next = matches!(self.peek_at(1), Some(b'\\' | b'\'' | b'"'));
            self.pos += if escapes_next { 2 } else { 1 };
        } else if matches!(self.peek_at(1), Some(b'{' | b'}')) {
            self.pos += 1;
        } else if self.bytes[self.pos..].starts_with(b"\\N{") {
            match self.source[self.pos..].find('}') {
                Some(close) => self.pos += close + 1,
                None => self.pos = self.bytes.len(),
            }
        } else {
            self.skip_escaped_char();
        }
    }

    /// Steps over a backslash and the whole character it escapes.
    fn skip_escaped_char(&mut self) {
        self.pos += 1;
        self.pos += self.source[self.pos..]
            .chars()
            .next()
            .map_or(0, char::len_utf8);
    }

    /// Lexes a replacement field; the opening brace has been consumed and the
    /// closing one is consumed before returning.
    fn field(&mut self, quote: u8, triple: bool) -> MigrateResult<FieldSpan> {
        let start = self.pos;
        let mut expression_end = None;
        let mut conversion = None;
        let mut brackets = 0usize;
        let mut nested_fstring = false;

        loop {
            let Some(byte) = self.peek() else {
                return Err(self.error("unterminated replacement field"));
            };
            match byte {
                b'\'' | b'"' => {
                    self.string(String::new())?;
                }
                b'(' | b'[' | b'{' => {
                    brackets += 1;
                    self.pos += 1;
                }
                b')' | b']' => {
                    brackets = brackets.saturating_sub(1);
                    self.pos += 1;
                }
                b'}' if brackets > 0 => {
                    brackets -= 1;
                    self.pos += 1;
                }
                b'}' => {
                    let end = self.pos;
                    self.pos += 1;
                    return Ok(FieldSpan {
                        expression: start..expression_end.unwrap_or(end),
                        conversion,
                        spec: None,
                        spec_has_fields: false,
                        nested_fstring,
                    });
                }
                b'!' if brackets == 0 && self.peek_at(1) != Some(b'=') => {
                    expression_end.get_or_insert(self.pos);
                    self.pos += 1;
                    let ch = self.current_char();
                    conversion = Some(ch);
                    self.pos += ch.len_utf8();
                }
                b':' if brackets == 0 => {
                    expression_end.get_or_insert(self.pos);
                    self.pos += 1;
                    let spec_start = self.pos;
                    let spec_has_fields = self.format_spec(quote, triple)?;
                    return Ok(FieldSpan {
                        expression: start..expression_end.unwrap_or(spec_start - 1),
                        conversion,
                        spec: Some(spec_start..self.pos - 1),
                        spec_has_fields,
                        nested_fstring,
                    });
                }
                b'\\' => self.skip_escaped_char(),
                b'#' => self.skip_comment(),
                _ => {
                    let ch = self.current_char();
                    if is_ident_start(ch) {
                        let name = self.ident().to_owned();
                        if self.at_string_prefix(&name) {
                            let nested = self.string(name)?;
                            nested_fstring |= nested.is_templated();
                        }
                    } else {
                        self.pos += ch.len_utf8();
                    }
                }
            }
        }
    }

    /// Lexes a format spec up to and including the closing brace of its field.
    /// Returns whether the spec contains nested replacement fields.
    fn format_spec(&mut self, quote: u8, triple: bool) -> MigrateResult<bool> {
        let mut has_fields = false;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated format spec")),
                Some(b'{') => {
                    self.pos += 1;
                    self.field(quote, triple)?;
                    has_fields = true;
                }
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(has_fields);
                }
                Some(byte) if byte == quote && self.closes(quote, triple) => {
                    return Err(self.error("unterminated replacement field"));
                }
                Some(b'\n') if !triple => return Err(self.error("unterminated format spec")),
                Some(b'\\') => self.skip_escaped_char(),
                Some(_) => self.pos += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<String> {
        tokenize(source)
            .unwrap()
            .iter()
            .map(|token| match &token.kind {
                TokenKind::Name => format!("N:{}", token.text(source)),
                TokenKind::Number => format!("#:{}", token.text(source)),
                TokenKind::Op => format!("O:{}", token.text(source)),
                TokenKind::String(_) => format!("S:{}", token.text(source)),
                TokenKind::Newline => "NL".to_owned(),
            })
            .collect()
    }

    #[test]
    fn tokenizes_assignment_with_fstring() {
        assert_eq!(
            kinds("prompt = f\"Hi {name}\"  # greet\n"),
            vec!["N:prompt", "O:=", "S:f\"Hi {name}\"", "NL"]
        );
    }

    #[test]
    fn newlines_inside_brackets_are_not_logical() {
        let source = "call(\n    a,\n    b,\n)\nx = 1e-5\n";
        assert_eq!(
            kinds(source),
            vec![
                "N:call", "O:(", "N:a", "O:,", "N:b", "O:,", "O:)", "NL", "N:x", "O:=",
                "#:1e-5", "NL"
            ]
        );
    }

    #[test]
    fn string_prefixes_and_triple_quotes() {
        let source = "a = rb'\\x'\nb = '''multi\nline'''\nc = Rf\"{x}\\d\"\n";
        let tokens = tokenize(source).unwrap();
        let strings: Vec<_> = tokens.iter().filter_map(Token::string).collect();
        assert_eq!(strings.len(), 3);
        assert_eq!(strings[0].prefix, "rb");
        assert!(strings[1].triple);
        assert_eq!(&source[strings[1].body.clone()], "multi\nline");
        assert!(strings[2].is_fstring() && strings[2].is_raw());
    }

    #[test]
    fn fstring_fields_capture_nested_brackets_and_specs() {
        let source = r#"f"{d['a:b']} {x[1:2]:>{width}} {value!r:^5} {{lit}} {call({'k': 1})}""#;
        let tokens = tokenize(source).unwrap();
        let literal = tokens[0].string().unwrap();
        let fields: Vec<&FieldSpan> = literal
            .parts
            .iter()
            .filter_map(|part| match part {
                FStringPart::Field(field) => Some(field),
                FStringPart::Literal(_) => None,
            })
            .collect();

        assert_eq!(fields.len(), 4);
        assert_eq!(&source[fields[0].expression.clone()], "d['a:b']");
        assert_eq!(fields[0].spec, None);
        assert_eq!(&source[fields[1].expression.clone()], "x[1:2]");
        assert!(fields[1].spec_has_fields);
        assert_eq!(&source[fields[2].expression.clone()], "value");
        assert_eq!(fields[2].conversion, Some('r'));
        assert_eq!(&source[fields[2].spec.clone().unwrap()], "^5");
        assert_eq!(&source[fields[3].expression.clone()], "call({'k': 1})");
    }

    #[test]
    fn same_quote_nesting_and_nested_fstrings() {
        let source = r#"f"{d["k"]} {f'{x}'}""#;
        let tokens = tokenize(source).unwrap();
        assert_eq!(tokens.len(), 2);
        let literal = tokens[0].string().unwrap();
        let nested: Vec<bool> = literal
            .parts
            .iter()
            .filter_map(|part| match part {
                FStringPart::Field(field) => Some(field.nested_fstring),
                FStringPart::Literal(_) => None,
            })
            .collect();
        assert_eq!(nested, vec![false, true]);
    }

    #[test]
    fn named_unicode_escape_is_not_a_field() {
        let source = r#"f"\N{BULLET} {item}""#;
        let literal = tokenize(source).unwrap()[0].string().cloned().unwrap();
        let fields = literal
            .parts
            .iter()
            .filter(|part| matches!(part, FStringPart::Field(_)))
            .count();
        assert_eq!(fields, 1);
    }

    #[test]
    fn unterminated_strings_report_line() {
        let err = tokenize("x = 1\ny = 'oops\n").expect_err("unterminated");
        assert!(matches!(err, MigrateError::Lex { line: 2, .. }));
    }

    #[test]
    fn backslash_before_multibyte_char_keeps_char_boundaries() {
        let source = "x = f\"{a\\é} long enough text\"\ny = '\\é'\nz = f\"{v:\\ü}\"\n";
        let tokens = tokenize(source).unwrap();
        let strings: Vec<_> = tokens.iter().filter_map(Token::string).collect();
        assert_eq!(strings.len(), 3);
        assert_eq!(&source[strings[0].body.clone()], "{a\\é} long enough text");
        assert_eq!(&source[strings[1].body.clone()], "\\é");
        assert_eq!(&source[strings[2].body.clone()], "{v:\\ü}");
    }

    #[test]
    fn comments_hide_quotes() {
        assert_eq!(kinds("# it's fine\nx\n"), vec!["N:x", "NL"]);
    }
}
