//! Shared error definitions for prompt primitives.

use thiserror::Error;

/// Result alias used throughout the prompt toolkit.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating prompt primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// Prompt identifier failed validation.
    #[error("invalid prompt id `{id}`: {reason}")]
    InvalidPromptId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Version label could not be parsed.
    #[error("invalid version label `{label}`: expected `v<N>` with N >= 1")]
    InvalidVersionLabel {
        /// The offending label.
        label: String,
    },
}
