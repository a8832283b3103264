//! Detection of extractable f-string literals in Python source.

use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::error::MigrateResult;
use crate::fstring::{Segment, Unsupported, decompose};
use crate::lexer::{FStringPart, StringLiteral, Token, TokenKind, line_of, tokenize};

const COMPOUND_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "while", "for", "with", "try", "except", "finally", "async", "match",
    "case",
];

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Returns `true` for Python's reserved words.
pub(crate) fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Filters applied while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Literals whose body is shorter than this many characters are skipped.
    pub min_literal_len: usize,
    /// When non-empty, only literals bound to a variable or keyword whose name
    /// contains one of these words (case-insensitive) are extracted.
    pub target_names: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            min_literal_len: 10,
            target_names: Vec::new(),
        }
    }
}

/// Code surrounding a literal, used to name the extracted prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Context {
    /// Right-hand side of an assignment to this name.
    Assignment(String),
    /// Value of this keyword argument.
    Keyword(String),
    /// Somewhere inside the body of this function.
    Function(String),
    /// Module level, with no nearer name.
    Module,
}

impl Context {
    /// Returns the variable or keyword the literal is bound to, if any.
    #[must_use]
    pub fn binding(&self) -> Option<&str> {
        match self {
            Self::Assignment(name) | Self::Keyword(name) => Some(name),
            Self::Function(_) | Self::Module => None,
        }
    }

    /// Returns the name that best describes the literal.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Assignment(name) | Self::Keyword(name) | Self::Function(name) => name,
            Self::Module => "prompt",
        }
    }
}

/// Why a literal was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Body shorter than the configured minimum.
    TooShort,
    /// No replacement fields, so nothing to extract.
    NoInterpolation,
    /// Raw f-strings keep backslashes verbatim and are left alone.
    Raw,
    /// Part of an implicit concatenation with a neighbouring literal.
    Concatenated,
    /// Not bound to a name matching the configured target names.
    NameFilter,
    /// Contains a construct that cannot be re-emitted safely.
    Unsupported(Unsupported),
}

/// A literal that can be extracted, before ids and names are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCandidate {
    pub(crate) range: Range<usize>,
    pub(crate) line: usize,
    pub(crate) literal: String,
    pub(crate) prefix: String,
    pub(crate) quote: char,
    pub(crate) triple: bool,
    pub(crate) segments: Vec<Segment>,
    pub(crate) context: Context,
}

impl RawCandidate {
    /// Byte range of the whole literal, prefix and quotes included.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// 1-based line where the literal starts.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Literal source text.
    #[must_use]
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// Ordered text and interpolation segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Surrounding code context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }
}

/// Result of examining one f-string literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScanOutcome {
    /// The literal can be extracted.
    Candidate(RawCandidate),
    /// The literal is left alone.
    Skipped {
        /// Byte range of the literal.
        range: Range<usize>,
        /// 1-based line where the literal starts.
        line: usize,
        /// Why it was skipped.
        reason: SkipReason,
    },
}

/// Scans one Python source file for interpolated string literals.
///
/// Tokenizing happens up front; classification is lazy and every call to
/// [`LiteralScanner::outcomes`] starts a fresh pass over the same tokens.
#[derive(Debug)]
pub struct LiteralScanner<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    options: ScanOptions,
}

impl<'s> LiteralScanner<'s> {
    /// Tokenizes `source`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MigrateError::Lex`] when the source has unterminated
    /// strings or replacement fields.
    pub fn new(source: &'s str, options: ScanOptions) -> MigrateResult<Self> {
        Ok(Self {
            source,
            tokens: tokenize(source)?,
            options,
        })
    }

    pub(crate) fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Iterates over every f-string literal, extracted or skipped, in source order.
    #[must_use]
    pub fn outcomes(&self) -> Outcomes<'_, 's> {
        Outcomes {
            scanner: self,
            index: 0,
            functions: Vec::new(),
            line_start: true,
            line_indent: 0,
        }
    }

    /// Iterates over extractable literals only.
    pub fn candidates(&self) -> impl Iterator<Item = RawCandidate> + '_ {
        self.outcomes().filter_map(|outcome| match outcome {
            ScanOutcome::Candidate(candidate) => Some(candidate),
            ScanOutcome::Skipped { .. } => None,
        })
    }

    fn classify(&self, index: usize, literal: &StringLiteral, function: Option<&str>) -> ScanOutcome {
        let token = &self.tokens[index];
        let range = token.span.clone();
        let line = line_of(self.source, range.start);
        let skipped = |reason| {
            debug!(line, ?reason, "skipping f-string");
            ScanOutcome::Skipped {
                range: range.clone(),
                line,
                reason,
            }
        };

        if literal.is_raw() {
            return skipped(SkipReason::Raw);
        }
        let is_string = |token: Option<&Token>| token.is_some_and(|t| t.string().is_some());
        if is_string(index.checked_sub(1).map(|i| &self.tokens[i]))
            || is_string(self.tokens.get(index + 1))
        {
            return skipped(SkipReason::Concatenated);
        }
        if self.source[literal.body.clone()].chars().count() < self.options.min_literal_len {
            return skipped(SkipReason::TooShort);
        }
        if !literal
            .parts
            .iter()
            .any(|part| matches!(part, FStringPart::Field(_)))
        {
            return skipped(SkipReason::NoInterpolation);
        }

        let context = self.context(index, function);
        if !self.options.target_names.is_empty() && !self.matches_target(&context) {
            return skipped(SkipReason::NameFilter);
        }

        match decompose(self.source, literal) {
            Ok(segments) => ScanOutcome::Candidate(RawCandidate {
                range: range.clone(),
                line,
                literal: self.source[range.clone()].to_owned(),
                prefix: literal.prefix.clone(),
                quote: literal.quote,
                triple: literal.triple,
                segments,
                context,
            }),
            Err(unsupported) => skipped(SkipReason::Unsupported(unsupported)),
        }
    }

    fn matches_target(&self, context: &Context) -> bool {
        context.binding().is_some_and(|name| {
            let name = name.to_lowercase();
            self.options
                .target_names
                .iter()
                .any(|target| name.contains(&target.to_lowercase()))
        })
    }

    fn context(&self, index: usize, function: Option<&str>) -> Context {
        let source = self.source;
        if index >= 2 && self.tokens[index - 1].is_op(source, "=") {
            let equals = &self.tokens[index - 1];
            if equals.depth == 0 {
                if let Some(name) = self.assignment_target(index - 1) {
                    return Context::Assignment(name.to_owned());
                }
            } else {
                let name = &self.tokens[index - 2];
                let opener = index
                    .checked_sub(3)
                    .map(|i| &self.tokens[i])
                    .is_some_and(|t| t.is_op(source, "(") || t.is_op(source, ","));
                if matches!(name.kind, TokenKind::Name) && opener {
                    return Context::Keyword(name.text(source).to_owned());
                }
            }
        }
        function.map_or(Context::Module, |name| Context::Function(name.to_owned()))
    }

    /// Finds the name assigned by the statement whose `=` sits at `equals`.
    fn assignment_target(&self, equals: usize) -> Option<&'s str> {
        let source = self.source;
        let tokens = &self.tokens;
        let mut start = equals;
        while start > 0 {
            let previous = &tokens[start - 1];
            if matches!(previous.kind, TokenKind::Newline)
                || (previous.depth == 0 && previous.is_op(source, ";"))
            {
                break;
            }
            start -= 1;
        }

        let mut end = equals;
        while let Some(colon) =
            (start..end).find(|&i| tokens[i].depth == 0 && tokens[i].is_op(source, ":"))
        {
            if COMPOUND_KEYWORDS.contains(&tokens[start].text(source)) {
                start = colon + 1;
            } else {
                end = colon;
                break;
            }
        }

        (start..end).rev().find_map(|i| {
            let token = &tokens[i];
            let text = token.text(source);
            (matches!(token.kind, TokenKind::Name) && token.depth == 0 && !is_keyword(text))
                .then_some(text)
        })
    }
}

/// Lazy iterator over [`ScanOutcome`]s, created by [`LiteralScanner::outcomes`].
#[derive(Debug)]
pub struct Outcomes<'a, 's> {
    scanner: &'a LiteralScanner<'s>,
    index: usize,
    functions: Vec<(usize, &'s str)>,
    line_start: bool,
    line_indent: usize,
}

impl Outcomes<'_, '_> {
    fn column(&self, offset: usize) -> usize {
        let source = self.scanner.source;
        let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
        source[line_start..offset].chars().count()
    }
}

impl Iterator for Outcomes<'_, '_> {
    type Item = ScanOutcome;

    fn next(&mut self) -> Option<ScanOutcome> {
        let scanner = self.scanner;
        let source = scanner.source;
        let tokens = &scanner.tokens;

        while self.index < tokens.len() {
            let index = self.index;
            self.index += 1;
            let token = &tokens[index];

            if matches!(token.kind, TokenKind::Newline) {
                self.line_start = true;
                continue;
            }
            if self.line_start {
                self.line_start = false;
                self.line_indent = self.column(token.span.start);
                while self
                    .functions
                    .last()
                    .is_some_and(|(indent, _)| *indent >= self.line_indent)
                {
                    self.functions.pop();
                }
            }

            if token.is_name(source, "def") {
                if let Some(name) = tokens.get(index + 1) {
                    if matches!(name.kind, TokenKind::Name) {
                        self.functions.push((self.line_indent, name.text(source)));
                    }
                }
                continue;
            }

            if let Some(literal) = token.string() {
                if literal.is_fstring() {
                    let function = self.functions.last().map(|(_, name)| *name);
                    return Some(scanner.classify(index, literal, function));
                }
            }
        }
        None
    }
}
