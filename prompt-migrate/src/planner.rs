//! Turns scanner candidates into concrete extraction plans.

use std::ops::Range;
use std::path::{Path, PathBuf};

use prompt_primitives::PromptId;
use serde::Serialize;

use crate::error::MigrateResult;
use crate::fstring::{Segment, has_top_level};
use crate::naming::{PlaceholderNames, id_base};
use crate::registry::IdRegistry;
use crate::scanner::{Context, RawCandidate};

/// A named substitution slot extracted from an interpolation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placeholder {
    name: String,
    expression: String,
    spec: Option<String>,
}

impl Placeholder {
    /// Sanitized placeholder name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Original expression, verbatim.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Format spec of the first occurrence, if any.
    #[must_use]
    pub fn spec(&self) -> Option<&str> {
        self.spec.as_deref()
    }
}

/// A candidate with its id, template and rewritten call finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCandidate {
    file: PathBuf,
    range: Range<usize>,
    line: usize,
    context: Context,
    id: PromptId,
    template: String,
    placeholders: Vec<Placeholder>,
    original: String,
    replacement: String,
}

impl PlannedCandidate {
    /// File the literal lives in.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Byte range of the literal.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// 1-based line where the literal starts.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Surrounding code context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Run-unique prompt id.
    #[must_use]
    pub fn id(&self) -> &PromptId {
        &self.id
    }

    /// Template text to persist.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholders in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Literal as written in the source.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Call expression replacing the literal.
    #[must_use]
    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

/// Builds extraction plans for one migration run.
#[derive(Debug, Clone)]
pub struct ExtractionPlanner {
    call_name: String,
    clean: bool,
}

impl ExtractionPlanner {
    /// Creates a planner that emits calls to `call_name`.
    ///
    /// In clean mode the rewritten call carries only the id and keyword
    /// arguments; otherwise the template is kept inline as the call's default.
    #[must_use]
    pub fn new(call_name: impl Into<String>, clean: bool) -> Self {
        Self {
            call_name: call_name.into(),
            clean,
        }
    }

    /// Finalizes `candidate`, reserving its id in `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MigrateError::InvalidId`] if no valid id can be derived.
    pub fn plan(
        &self,
        file: &Path,
        candidate: RawCandidate,
        registry: &IdRegistry,
    ) -> MigrateResult<PlannedCandidate> {
        let stem = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = registry.reserve(&id_base(&stem, &candidate.context))?;

        let mut names = PlaceholderNames::default();
        let mut placeholders = Vec::new();
        let mut template = String::new();
        let mut inline = String::new();
        for segment in &candidate.segments {
            match segment {
                Segment::Text { source, value } => {
                    template.push_str(value);
                    inline.push_str(source);
                }
                Segment::Interpolation { expression, spec } => {
                    let (name, fresh) = names.assign(expression);
                    let field = match spec {
                        Some(spec) => format!("{{{name}:{spec}}}"),
                        None => format!("{{{name}}}"),
                    };
                    template.push_str(&field);
                    inline.push_str(&field);
                    if fresh {
                        placeholders.push(Placeholder {
                            name,
                            expression: expression.clone(),
                            spec: spec.clone(),
                        });
                    }
                }
            }
        }

        let replacement = self.call_text(&id, &candidate, &inline, &placeholders);
        Ok(PlannedCandidate {
            file: file.to_path_buf(),
            range: candidate.range,
            line: candidate.line,
            context: candidate.context,
            id,
            template,
            placeholders,
            original: candidate.literal,
            replacement,
        })
    }

    fn call_text(
        &self,
        id: &PromptId,
        candidate: &RawCandidate,
        inline: &str,
        placeholders: &[Placeholder],
    ) -> String {
        let mut args = vec![format!("\"{id}\"")];
        if !self.clean {
            let prefix: String = candidate
                .prefix
                .chars()
                .filter(|ch| !ch.eq_ignore_ascii_case(&'f'))
                .collect();
            let quote = if candidate.triple {
                candidate.quote.to_string().repeat(3)
            } else {
                candidate.quote.to_string()
            };
            args.push(format!("{prefix}{quote}{inline}{quote}"));
        }
        for placeholder in placeholders {
            let expression = &placeholder.expression;
            if has_top_level(expression, ',') {
                args.push(format!("{}=({expression})", placeholder.name));
            } else {
                args.push(format!("{}={expression}", placeholder.name));
            }
        }
        format!("{}({})", self.call_name, args.join(", "))
    }
}
