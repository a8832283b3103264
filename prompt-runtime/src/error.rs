//! Error types for prompt resolution.

use prompt_store::StoreError;
use thiserror::Error;

use crate::template::TemplateError;

/// Result alias for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors emitted while resolving and rendering a prompt.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The id has no lock entry and the call site supplied no inline default.
    #[error("prompt `{id}` has no lock entry and no inline default")]
    NotFound {
        /// Requested prompt id.
        id: String,
    },
    /// The chosen template references a variable that was not provided.
    #[error("missing required variable: {name}")]
    MissingVariable {
        /// Name of the missing variable.
        name: String,
    },
    /// The chosen template is not well formed.
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
    /// Lockfile or template store failure, including pins to missing versions.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The project configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] prompt_config::ConfigError),
}

impl From<TemplateError> for ResolveError {
    fn from(error: TemplateError) -> Self {
        match error {
            TemplateError::MissingVariable { name } => Self::MissingVariable { name },
            TemplateError::InvalidTemplate { reason } => Self::InvalidTemplate { reason },
            TemplateError::InvalidFormat { name, spec, reason } => {
                Self::InvalidFormat { name, spec, reason }
            }
        }
    }
}
