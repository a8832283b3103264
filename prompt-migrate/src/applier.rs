//! Applies accepted candidates to the template store and to source text.

use std::ops::Range;

use prompt_primitives::VersionLabel;
use prompt_store::{StoreResult, TemplateStore};
use tracing::info;

use crate::error::{MigrateError, MigrateResult};
use crate::lexer::{Token, TokenKind};
use crate::planner::PlannedCandidate;

/// Replacement of one byte range of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    range: Range<usize>,
    replacement: String,
}

impl Edit {
    /// Creates an edit replacing `range` with `replacement`.
    #[must_use]
    pub fn new(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    /// Creates an edit inserting `text` at `offset`.
    #[must_use]
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self::new(offset..offset, text)
    }

    /// Byte range being replaced.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Replacement text.
    #[must_use]
    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

/// Applies `edits` to `source`, highest start offset first, so no edit shifts
/// the coordinates of one not yet applied.
///
/// # Errors
///
/// Returns [`MigrateError::OverlappingEdits`] when two edits overlap or an
/// edit does not fall on character boundaries of `source`.
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> MigrateResult<String> {
    edits.sort_by(|a, b| {
        b.range
            .start
            .cmp(&a.range.start)
            .then(b.range.end.cmp(&a.range.end))
    });

    let mut text = source.to_owned();
    let mut floor = source.len();
    for edit in edits {
        let Range { start, end } = edit.range;
        if start > end
            || end > floor
            || !source.is_char_boundary(start)
            || !source.is_char_boundary(end)
        {
            return Err(MigrateError::OverlappingEdits { offset: start });
        }
        text.replace_range(start..end, &edit.replacement);
        floor = start;
    }
    Ok(text)
}

/// Where the resolver import goes in one file, and whether it is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ImportSite {
    present: bool,
    offset: usize,
    needs_newline: bool,
}

impl ImportSite {
    /// Locates the import position in tokenized `source`.
    ///
    /// The import goes after a module docstring and any `from __future__`
    /// imports, otherwise before the first statement. It counts as present
    /// when a top-level statement already binds `call_name`.
    pub(crate) fn locate(source: &str, tokens: &[Token], call_name: &str) -> Self {
        let lines = logical_lines(tokens);
        let bound = call_name.split('.').next().unwrap_or(call_name);
        let present = lines
            .iter()
            .filter(|line| column(source, tokens[line.tokens.start].span.start) == 0)
            .flat_map(|line| statements(source, &tokens[line.tokens.clone()]))
            .any(|statement| binds(source, statement, bound));

        let mut offset = lines.first().map_or(source.len(), |line| {
            let start = tokens[line.tokens.start].span.start;
            source[..start].rfind('\n').map_or(0, |i| i + 1)
        });
        let mut rest = lines.iter().peekable();
        if let Some(first) = rest.peek() {
            let docstring = tokens[first.tokens.clone()]
                .iter()
                .all(|token| token.string().is_some_and(|s| !s.is_fstring()));
            if docstring {
                offset = first.end;
                rest.next();
            }
        }
        while let Some(line) = rest.next_if(|line| {
            let line_tokens = &tokens[line.tokens.clone()];
            line_tokens.len() >= 2
                && line_tokens[0].is_name(source, "from")
                && line_tokens[1].is_name(source, "__future__")
        }) {
            offset = line.end;
        }

        Self {
            present,
            offset,
            needs_newline: offset == source.len() && !source.is_empty() && !source.ends_with('\n'),
        }
    }

    /// Returns `true` when the file already binds the resolver function.
    pub(crate) fn present(&self) -> bool {
        self.present
    }

    /// Returns the edit inserting `import_line`, unless it is already present.
    pub(crate) fn edit(&self, import_line: &str) -> Option<Edit> {
        if self.present {
            return None;
        }
        let text = if self.needs_newline {
            format!("\n{import_line}\n")
        } else {
            format!("{import_line}\n")
        };
        Some(Edit::insert(self.offset, text))
    }
}

struct LogicalLine {
    tokens: Range<usize>,
    /// Byte offset just past the line's terminating newline.
    end: usize,
}

fn logical_lines(tokens: &[Token]) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (index, token) in tokens.iter().enumerate() {
        if matches!(token.kind, TokenKind::Newline) {
            if start < index {
                lines.push(LogicalLine {
                    tokens: start..index,
                    end: token.span.end,
                });
            }
            start = index + 1;
        }
    }
    lines
}

fn statements<'t>(source: &str, line: &'t [Token]) -> impl Iterator<Item = &'t [Token]> {
    let separators: Vec<usize> = line
        .iter()
        .enumerate()
        .filter(|(_, token)| token.depth == 0 && token.is_op(source, ";"))
        .map(|(index, _)| index)
        .collect();
    let mut bounds = Vec::with_capacity(separators.len() + 1);
    let mut start = 0;
    for separator in separators {
        bounds.push(start..separator);
        start = separator + 1;
    }
    bounds.push(start..line.len());
    bounds.into_iter().map(move |range| &line[range])
}

fn column(source: &str, offset: usize) -> usize {
    offset - source[..offset].rfind('\n').map_or(0, |i| i + 1)
}

/// Returns `true` if `statement` is an import or `def` binding `name`.
fn binds(source: &str, statement: &[Token], name: &str) -> bool {
    let Some(first) = statement.first() else {
        return false;
    };
    let text = |index: usize| statement.get(index).map(|token| token.text(source));

    if first.is_name(source, "def") {
        return text(1) == Some(name);
    }
    if first.is_name(source, "from") {
        let Some(import) = statement.iter().position(|t| t.is_name(source, "import")) else {
            return false;
        };
        let mut index = import + 1;
        while index < statement.len() {
            let token = &statement[index];
            if !matches!(token.kind, TokenKind::Name) {
                index += 1;
                continue;
            }
            let aliased = statement
                .get(index + 1)
                .is_some_and(|t| t.is_name(source, "as"));
            let bound = if aliased { text(index + 2) } else { text(index) };
            if bound == Some(name) {
                return true;
            }
            index += if aliased { 3 } else { 1 };
        }
        return false;
    }
    if first.is_name(source, "import") {
        let mut index = 1;
        while index < statement.len() {
            let module_start = index;
            while index < statement.len() && !statement[index].is_op(source, ",") {
                index += 1;
            }
            let module = &statement[module_start..index];
            let bound = match module.iter().position(|t| t.is_name(source, "as")) {
                Some(alias) => module.get(alias + 1).map(|t| t.text(source)),
                None => module.first().map(|t| t.text(source)),
            };
            if bound == Some(name) {
                return true;
            }
            index += 1;
        }
    }
    false
}

/// Persists accepted candidates.
#[derive(Debug, Clone, Copy)]
pub struct Applier<'a> {
    store: &'a dyn TemplateStore,
}

impl<'a> Applier<'a> {
    /// Creates an applier writing to `store`.
    #[must_use]
    pub fn new(store: &'a dyn TemplateStore) -> Self {
        Self { store }
    }

    /// Writes the candidate's template as a new store version and, only if
    /// that succeeds, returns the code edit for its literal.
    ///
    /// # Errors
    ///
    /// Propagates the store failure; no edit is produced in that case.
    pub fn apply(&self, candidate: &PlannedCandidate) -> StoreResult<(VersionLabel, Edit)> {
        let description = format!(
            "Extracted from {}:{}",
            candidate.file().display(),
            candidate.line()
        );
        let version =
            self.store
                .write_new_version(candidate.id(), candidate.template(), Some(&description))?;
        info!(id = %candidate.id(), %version, "extracted template version written");
        Ok((
            version,
            Edit::new(candidate.range(), candidate.replacement()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn insert_import(source: &str) -> String {
        let tokens = tokenize(source).unwrap();
        match ImportSite::locate(source, &tokens, "p").edit("from promptkit import p") {
            Some(edit) => apply_edits(source, vec![edit]).unwrap(),
            None => source.to_owned(),
        }
    }

    #[test]
    fn edits_apply_from_the_end() {
        let source = "aaa bbb ccc";
        let edits = vec![
            Edit::new(0..3, "first"),
            Edit::new(8..11, "third"),
            Edit::new(4..7, "second"),
            Edit::insert(0, "> "),
        ];
        assert_eq!(apply_edits(source, edits).unwrap(), "> first second third");
    }

    #[test]
    fn overlapping_edits_are_rejected() {
        let edits = vec![Edit::new(0..5, "x"), Edit::new(3..8, "y")];
        assert!(matches!(
            apply_edits("0123456789", edits),
            Err(MigrateError::OverlappingEdits { offset: 0 })
        ));
    }

    #[test]
    fn import_goes_before_first_statement() {
        let source = "#!/usr/bin/env python\n# -*- coding: utf-8 -*-\n\nimport os\nx = 1\n";
        assert_eq!(
            insert_import(source),
            "#!/usr/bin/env python\n# -*- coding: utf-8 -*-\n\nfrom promptkit import p\nimport os\nx = 1\n"
        );
    }

    #[test]
    fn import_goes_after_docstring_and_future_imports() {
        let source = "\"\"\"Module docs.\"\"\"\nfrom __future__ import annotations\nimport os\n";
        assert_eq!(
            insert_import(source),
            "\"\"\"Module docs.\"\"\"\nfrom __future__ import annotations\nfrom promptkit import p\nimport os\n"
        );
    }

    #[test]
    fn import_appends_newline_when_missing() {
        let source = "from __future__ import annotations";
        assert_eq!(
            insert_import(source),
            "from __future__ import annotations\nfrom promptkit import p\n"
        );
    }

    #[test]
    fn existing_bindings_are_detected() {
        for source in [
            "from promptkit import p\n",
            "from promptkit import (\n    other,\n    p,\n)\n",
            "from somewhere import resolve as p\n",
            "import os; from promptkit import p\n",
            "import promptkit.runtime as p\n",
            "def p(*args, **kwargs):\n    pass\n",
        ] {
            let tokens = tokenize(source).unwrap();
            assert!(ImportSite::locate(source, &tokens, "p").present(), "{source}");
        }
    }

    #[test]
    fn nested_or_unrelated_imports_do_not_count() {
        for source in [
            "def f():\n    from promptkit import p\n",
            "from promptkit import prompt\n",
            "from p import something\n",
            "import os as path\n",
        ] {
            let tokens = tokenize(source).unwrap();
            assert!(!ImportSite::locate(source, &tokens, "p").present(), "{source}");
        }
    }
}
