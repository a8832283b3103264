//! Placeholder names and prompt ids derived from source code.

use std::collections::{HashMap, HashSet};

use crate::scanner::{Context, is_keyword};

const MAX_ID_LEN: usize = 100;

/// Turns an interpolation expression into a keyword-safe identifier.
///
/// A bare identifier passes through unchanged. Anything else keeps its
/// identifier characters and joins the runs with `_`, so `user.name` becomes
/// `user_name` and `d['key']` becomes `d_key`.
#[must_use]
pub fn sanitize(expression: &str) -> String {
    let expression = expression.trim();
    if is_identifier(expression) && !is_keyword(expression) {
        return expression.to_owned();
    }

    let joined = join_runs(expression.chars(), |ch| ch == '_' || ch.is_alphanumeric());
    let mut name = if joined.is_empty() {
        "value".to_owned()
    } else {
        joined
    };
    if name.starts_with(|ch: char| ch.is_numeric()) {
        name.insert_str(0, "var_");
    }
    if is_keyword(&name) {
        name.push('_');
    }
    name
}

/// Builds the base prompt id for a literal in file `stem` with `context`.
///
/// The result only contains ASCII letters, digits, `_`, `-` and `.`.
#[must_use]
pub fn id_base(stem: &str, context: &Context) -> String {
    let keep = |ch: char| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.');
    let stem = join_runs(stem.chars(), keep);
    let label = join_runs(context.label().chars(), keep);
    let mut id = match (stem.is_empty(), label.is_empty()) {
        (false, false) => format!("{stem}_{label}"),
        (false, true) => stem,
        (true, false) => label,
        (true, true) => "prompt".to_owned(),
    };
    id.truncate(MAX_ID_LEN);
    let trimmed = id.trim_end_matches(['_', '.']).len();
    id.truncate(trimmed);
    if id.is_empty() || id.starts_with('.') {
        id.insert_str(0, "prompt");
    }
    id
}

/// Joins the runs of characters accepted by `keep` with single underscores.
fn join_runs(chars: impl Iterator<Item = char>, keep: impl Fn(char) -> bool) -> String {
    let mut out = String::new();
    let mut pending = false;
    for ch in chars {
        if keep(ch) && ch != '_' {
            if pending && !out.is_empty() {
                out.push('_');
            }
            pending = false;
            out.push(ch);
        } else {
            pending = true;
        }
    }
    out
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|first| first == '_' || first.is_alphabetic())
        && chars.all(|ch| ch == '_' || ch.is_alphanumeric())
}

/// Returns `true` for a name followed by attribute accesses and subscripts
/// with literal keys, such as `user.data['score']` or `rows[0].id`.
///
/// Evaluating such a chain twice yields the same value, so repeats of it may
/// share one placeholder.
pub(crate) fn is_access_chain(expression: &str) -> bool {
    let Some(len) = identifier_len(expression.trim()) else {
        return false;
    };
    let mut rest = &expression.trim()[len..];
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return true;
        }
        if let Some(after) = rest.strip_prefix('.') {
            let after = after.trim_start();
            let Some(len) = identifier_len(after) else {
                return false;
            };
            rest = &after[len..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let after = after.trim_start();
            let Some(len) = literal_key_len(after) else {
                return false;
            };
            let Some(after) = after[len..].trim_start().strip_prefix(']') else {
                return false;
            };
            rest = after;
        } else {
            return false;
        }
    }
}

/// Byte length of the identifier at the start of `text`.
fn identifier_len(text: &str) -> Option<usize> {
    let first = text.chars().next()?;
    if first != '_' && !first.is_alphabetic() {
        return None;
    }
    Some(
        text.chars()
            .take_while(|&ch| ch == '_' || ch.is_alphanumeric())
            .map(char::len_utf8)
            .sum(),
    )
}

/// Byte length of the string or integer literal at the start of `text`.
fn literal_key_len(text: &str) -> Option<usize> {
    match text.chars().next()? {
        quote @ ('\'' | '"') => {
            let body = &text[1..];
            let close = body.find(quote)?;
            (!body[..close].contains('\\')).then_some(close + 2)
        }
        _ => {
            let sign = usize::from(text.starts_with('-'));
            let digits = text[sign..]
                .chars()
                .take_while(char::is_ascii_digit)
                .count();
            (digits > 0).then_some(sign + digits)
        }
    }
}

/// Assigns placeholder names within one template.
///
/// Repeats of an access chain share a placeholder. Any other expression gets
/// its own placeholder on every occurrence, and names that collide get `_2`,
/// `_3`, ... in order of appearance.
#[derive(Debug, Default)]
pub(crate) struct PlaceholderNames {
    by_expression: HashMap<String, String>,
    used: HashSet<String>,
}

impl PlaceholderNames {
    /// Returns the name for `expression` and whether it is newly assigned.
    pub(crate) fn assign(&mut self, expression: &str) -> (String, bool) {
        if let Some(name) = self.by_expression.get(expression) {
            return (name.clone(), false);
        }
        let base = sanitize(expression);
        let mut name = base.clone();
        let mut suffix = 2;
        while self.used.contains(&name) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        self.used.insert(name.clone());
        if is_access_chain(expression) {
            self.by_expression
                .insert(expression.to_owned(), name.clone());
        }
        (name, true)
    }
}
