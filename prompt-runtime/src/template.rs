//! Placeholder templates with keyword substitution.

use std::fmt;

use crate::format::{FormatSpec, format_value};
use crate::value::TemplateVars;

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur during template operations.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A placeholder names a variable that was not provided.
    #[error("missing required variable: {name}")]
    MissingVariable {
        /// Name of the missing variable.
        name: String,
    },

    /// The template text is not well formed.
    #[error("invalid template: {reason}")]
    InvalidTemplate {
        /// Reason for the failure.
        reason: String,
    },

    /// A value cannot be rendered with its placeholder's format spec.
    #[error("cannot format `{name}` with spec `{spec}`: {reason}")]
    InvalidFormat {
        /// Placeholder name.
        name: String,
        /// Format spec as written in the template.
        spec: String,
        /// Reason for the failure.
        reason: String,
    },
}

impl TemplateError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug)]
enum Segment {
    Literal(String),
    Field {
        name: String,
        spec_text: String,
        spec: FormatSpec,
    },
}

/// A parsed prompt template.
///
/// Placeholders are written `{name}` or `{name:spec}`; `{{` and `}}` stand for
/// literal braces. Rendering is pure: the same template and values always
/// produce the same text.
///
/// # Examples
///
/// ```
/// use prompt_runtime::{PromptTemplate, vars};
///
/// let template = PromptTemplate::parse("Hello {user_name}, price: {price:.2f}").unwrap();
/// let rendered = template.render(&vars!(user_name = "Bo", price = 3.14159)).unwrap();
/// assert_eq!(rendered, "Hello Bo, price: 3.14");
/// ```
#[derive(Clone, Debug)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parses template text.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::InvalidTemplate`] for unbalanced braces, empty
    /// or non-identifier placeholder names, conversion flags, nested fields,
    /// and malformed format specs.
    pub fn parse(source: impl Into<String>) -> TemplateResult<Self> {
        let source = source.into();
        let segments = parse_segments(&source)?;
        Ok(Self { source, segments })
    }

    /// Renders the template with `vars`.
    ///
    /// Variables not referenced by the template are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingVariable`] if a placeholder has no value
    /// and [`TemplateError::InvalidFormat`] if a value does not fit its spec.
    pub fn render(&self, vars: &TemplateVars) -> TemplateResult<String> {
        let mut result = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => result.push_str(text),
                Segment::Field {
                    name,
                    spec_text,
                    spec,
                } => {
                    let value = vars
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingVariable { name: name.clone() })?;
                    let rendered =
                        format_value(value, spec).map_err(|reason| TemplateError::InvalidFormat {
                            name: name.clone(),
                            spec: spec_text.clone(),
                            reason,
                        })?;
                    result.push_str(&rendered);
                }
            }
        }
        Ok(result)
    }

    /// Returns the distinct placeholder names in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Field { name, .. } = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Returns the raw template string.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parses and renders `template` in one step.
///
/// # Errors
///
/// See [`PromptTemplate::parse`] and [`PromptTemplate::render`].
pub fn render(template: &str, vars: &TemplateVars) -> TemplateResult<String> {
    PromptTemplate::parse(template)?.render(vars)
}

fn parse_segments(source: &str) -> TemplateResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = source.char_indices().peekable();

    while let Some((index, ch)) = chars.next() {
        match ch {
            '{' if chars.peek().is_some_and(|(_, next)| *next == '{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek().is_some_and(|(_, next)| *next == '}') => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(TemplateError::invalid(format!("single '}}' at byte {index}"))),
            '{' => {
                let start = index + 1;
                let mut end = None;
                for (inner, ch) in chars.by_ref() {
                    match ch {
                        '}' => {
                            end = Some(inner);
                            break;
                        }
                        '{' => {
                            return Err(TemplateError::invalid(format!(
                                "nested replacement field at byte {inner}"
                            )));
                        }
                        _ => {}
                    }
                }
                let end = end.ok_or_else(|| {
                    TemplateError::invalid(format!("unclosed '{{' at byte {index}"))
                })?;

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(parse_field(&source[start..end])?);
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_field(field: &str) -> TemplateResult<Segment> {
    let (name, spec_text) = field.split_once(':').unwrap_or((field, ""));

    if name.contains('!') {
        return Err(TemplateError::invalid(format!(
            "conversion flags are not supported in `{{{field}}}`"
        )));
    }
    if name.is_empty() {
        return Err(TemplateError::invalid(
            "positional placeholders `{}` are not supported; name every placeholder",
        ));
    }
    if !name.chars().all(|c| c == '_' || c.is_alphanumeric()) {
        return Err(TemplateError::invalid(format!(
            "placeholder name `{name}` must be a plain identifier"
        )));
    }

    let spec = FormatSpec::parse(spec_text)
        .map_err(|reason| TemplateError::invalid(format!("placeholder `{name}`: {reason}")))?;
    Ok(Segment::Field {
        name: name.to_owned(),
        spec_text: spec_text.to_owned(),
        spec,
    })
}
