//! Decomposition of f-string literals into text and interpolations.

use std::fmt;

use serde::Serialize;

use crate::lexer::{FStringPart, StringLiteral};

/// One ordered piece of an f-string literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Segment {
    /// Literal text.
    Text {
        /// Text as written in the source, escapes and doubled braces intact.
        source: String,
        /// Text after escape processing, braces still doubled.
        value: String,
    },
    /// A `{expression}` or `{expression:spec}` field.
    Interpolation {
        /// Expression text, trimmed.
        expression: String,
        /// Format spec without the leading colon.
        spec: Option<String>,
    },
}

/// Why an f-string cannot be extracted safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unsupported {
    /// A `!r`, `!s` or `!a` conversion.
    Conversion(char),
    /// A self-documenting `{expr=}` field.
    SelfDocumenting,
    /// A format spec containing its own replacement fields.
    NestedSpecField,
    /// An expression containing another f-string.
    NestedFString,
    /// A backslash inside an expression or format spec.
    Backslash,
    /// An expression spanning lines or holding several statements.
    MultiStatement,
    /// An empty `{}` field.
    EmptyExpression,
    /// A `\N{...}` escape in the literal text.
    NamedEscape,
    /// An escape sequence that produces a brace.
    EscapedBrace,
    /// A malformed `\x`, `\u` or `\U` escape.
    InvalidEscape,
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversion(flag) => write!(f, "conversion flag !{flag}"),
            Self::SelfDocumenting => f.write_str("self-documenting `=` field"),
            Self::NestedSpecField => f.write_str("nested field in format spec"),
            Self::NestedFString => f.write_str("nested f-string in expression"),
            Self::Backslash => f.write_str("backslash in expression"),
            Self::MultiStatement => f.write_str("multi-line or multi-statement expression"),
            Self::EmptyExpression => f.write_str("empty expression"),
            Self::NamedEscape => f.write_str("named unicode escape"),
            Self::EscapedBrace => f.write_str("escape sequence producing a brace"),
            Self::InvalidEscape => f.write_str("malformed escape sequence"),
        }
    }
}

/// Splits a non-raw f-string into ordered segments.
pub(crate) fn decompose(source: &str, literal: &StringLiteral) -> Result<Vec<Segment>, Unsupported> {
    let mut segments = Vec::with_capacity(literal.parts.len());
    for part in &literal.parts {
        match part {
            FStringPart::Literal(range) => {
                let raw = &source[range.clone()];
                segments.push(Segment::Text {
                    source: raw.to_owned(),
                    value: decode_escapes(raw)?,
                });
            }
            FStringPart::Field(field) => {
                if field.nested_fstring {
                    return Err(Unsupported::NestedFString);
                }
                if let Some(flag) = field.conversion {
                    return Err(Unsupported::Conversion(flag));
                }
                if field.spec_has_fields {
                    return Err(Unsupported::NestedSpecField);
                }

                let raw = &source[field.expression.clone()];
                if raw.contains('\\') {
                    return Err(Unsupported::Backslash);
                }
                if raw.contains('\n') || raw.contains('\r') || has_top_level(raw, ';') {
                    return Err(Unsupported::MultiStatement);
                }
                let expression = raw.trim();
                if expression.is_empty() {
                    return Err(Unsupported::EmptyExpression);
                }
                if is_self_documenting(expression) {
                    return Err(Unsupported::SelfDocumenting);
                }

                let spec = field.spec.clone().map(|range| &source[range]);
                if spec.is_some_and(|spec| spec.contains('\\')) {
                    return Err(Unsupported::Backslash);
                }
                segments.push(Segment::Interpolation {
                    expression: expression.to_owned(),
                    spec: spec.map(str::to_owned),
                });
            }
        }
    }
    Ok(segments)
}

fn is_self_documenting(expression: &str) -> bool {
    expression.ends_with('=')
        && !["==", "!=", "<=", ">="]
            .iter()
            .any(|op| expression.ends_with(op))
}

/// Returns `true` if `target` occurs outside brackets and string literals.
pub(crate) fn has_top_level(expression: &str, target: char) -> bool {
    let mut depth = 0usize;
    let mut chars = expression.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        match ch {
            '\'' | '"' => {
                let triple = expression[index..].starts_with(&ch.to_string().repeat(3));
                skip_string(&mut chars, ch, triple);
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if ch == target && depth == 0 => return true,
            _ => {}
        }
    }
    false
}

fn skip_string(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    quote: char,
    triple: bool,
) {
    if triple {
        chars.next();
        chars.next();
    }
    let mut closing = 0;
    while let Some((_, ch)) = chars.next() {
        if ch == '\\' {
            chars.next();
            closing = 0;
        } else if ch == quote {
            closing += 1;
            if !triple || closing == 3 {
                return;
            }
        } else {
            closing = 0;
        }
    }
}

/// Processes backslash escapes the way a non-raw string literal does.
///
/// Doubled braces pass through untouched, so the result is already valid
/// template text.
pub(crate) fn decode_escapes(raw: &str) -> Result<String, Unsupported> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
            continue;
        }
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        let Some(escape) = chars.next() else {
            out.push('\\');
            break;
        };
        let decoded = match escape {
            '\n' => continue,
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                continue;
            }
            '\\' | '\'' | '"' => escape,
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{0b}',
            '0'..='7' => {
                let mut value = escape.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                char::from_u32(value).ok_or(Unsupported::InvalidEscape)?
            }
            'x' => hex_escape(&mut chars, 2)?,
            'u' => hex_escape(&mut chars, 4)?,
            'U' => hex_escape(&mut chars, 8)?,
            'N' => return Err(Unsupported::NamedEscape),
            other => {
                out.push('\\');
                other
            }
        };
        if matches!(decoded, '{' | '}') {
            return Err(Unsupported::EscapedBrace);
        }
        out.push(decoded);
    }
    Ok(out)
}

fn hex_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    digits: usize,
) -> Result<char, Unsupported> {
    let mut value = 0u32;
    for _ in 0..digits {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or(Unsupported::InvalidEscape)?;
        value = value * 16 + digit;
    }
    char::from_u32(value).ok_or(Unsupported::InvalidEscape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn segments(source: &str) -> Result<Vec<Segment>, Unsupported> {
        let tokens = tokenize(source).unwrap();
        decompose(source, tokens[0].string().unwrap())
    }

    fn interpolation(expression: &str, spec: Option<&str>) -> Segment {
        Segment::Interpolation {
            expression: expression.to_owned(),
            spec: spec.map(str::to_owned),
        }
    }

    fn text(source: &str, value: &str) -> Segment {
        Segment::Text {
            source: source.to_owned(),
            value: value.to_owned(),
        }
    }

    #[test]
    fn splits_text_and_fields() {
        assert_eq!(
            segments(r#"f"Hello {user.name}, price: {price:.2f}""#).unwrap(),
            vec![
                text("Hello ", "Hello "),
                interpolation("user.name", None),
                text(", price: ", ", price: "),
                interpolation("price", Some(".2f")),
            ]
        );
    }

    #[test]
    fn first_top_level_colon_starts_the_spec() {
        assert_eq!(
            segments(r#"f"at {when:%H:%M} of {items[1:3]}""#).unwrap(),
            vec![
                text("at ", "at "),
                interpolation("when", Some("%H:%M")),
                text(" of ", " of "),
                interpolation("items[1:3]", None),
            ]
        );
    }

    #[test]
    fn escapes_are_decoded_but_braces_stay_doubled() {
        assert_eq!(
            segments(r#"f"{{json}}\t{ value }\n""#).unwrap(),
            vec![
                text("{{json}}\\t", "{{json}}\t"),
                interpolation("value", None),
                text("\\n", "\n"),
            ]
        );
    }

    #[test]
    fn unsupported_fields_are_reported() {
        assert_eq!(segments(r#"f"{x!r} is long""#), Err(Unsupported::Conversion('r')));
        assert_eq!(segments(r#"f"{x=} is long""#), Err(Unsupported::SelfDocumenting));
        assert_eq!(segments(r#"f"{x:>{w}} is long""#), Err(Unsupported::NestedSpecField));
        assert_eq!(segments(r#"f"{f'{x}'} is long""#), Err(Unsupported::NestedFString));
        assert_eq!(segments(r#"f"{a; b} is long""#), Err(Unsupported::MultiStatement));
        assert_eq!(segments(r#"f"{ } is long""#), Err(Unsupported::EmptyExpression));
        assert_eq!(segments(r#"f"\N{DASH} {x}""#), Err(Unsupported::NamedEscape));
        assert_eq!(segments(r#"f"\x7b {x}""#), Err(Unsupported::EscapedBrace));
    }

    #[test]
    fn comparisons_are_not_self_documenting() {
        assert_eq!(
            segments(r#"f"{a == b}""#).unwrap(),
            vec![interpolation("a == b", None)]
        );
    }

    #[test]
    fn top_level_search_ignores_strings_and_brackets() {
        assert!(has_top_level("a, b", ','));
        assert!(!has_top_level("f(a, b)", ','));
        assert!(!has_top_level("d[','] + d[\"x;y\"]", ','));
        assert!(!has_top_level("'''a;b'''", ';'));
    }

    #[test]
    fn decodes_numeric_escapes() {
        assert_eq!(decode_escapes(r"\x41\101é\U0001F600").unwrap(), "AAé😀");
        assert_eq!(decode_escapes(r"\q\\").unwrap(), "\\q\\");
        assert_eq!(decode_escapes("a\\\nb").unwrap(), "ab");
        assert_eq!(decode_escapes(r"\xZZ"), Err(Unsupported::InvalidEscape));
    }
}
