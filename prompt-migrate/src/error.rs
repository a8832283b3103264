//! Error types for the migration engine.

use std::path::PathBuf;

use prompt_store::StoreError;
use thiserror::Error;

/// Result alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Errors emitted while scanning and rewriting source files.
///
/// Everything except [`MigrateError::Store`] carrying
/// [`StoreError::LockfileCorrupt`] is scoped to one file or one candidate; the
/// migration run records it and moves on.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// A source file could not be read or written.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// File involved in the failed operation.
        path: PathBuf,
        /// Source [`std::io::Error`].
        #[source]
        source: std::io::Error,
    },
    /// Template store or lockfile failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The project configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] prompt_config::ConfigError),
    /// A source file could not be tokenized.
    #[error("line {line}: {reason}")]
    Lex {
        /// 1-based line of the offending token.
        line: usize,
        /// Human-readable reason.
        reason: String,
    },
    /// Directory traversal failed.
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    /// Two edits staged for one file overlap.
    #[error("overlapping edits at byte {offset}")]
    OverlappingEdits {
        /// Start of the later of the two edits.
        offset: usize,
    },
    /// A generated prompt id failed validation.
    #[error(transparent)]
    InvalidId(#[from] prompt_primitives::Error),
}

impl MigrateError {
    /// Helper to construct I/O errors bound to a path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` when the error must abort the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(StoreError::LockfileCorrupt { .. }))
    }
}
