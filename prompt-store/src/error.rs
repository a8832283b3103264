//! Error types for the template store and lockfile.

use std::path::PathBuf;

use prompt_primitives::VersionLabel;
use thiserror::Error;

/// Errors emitted by store and lockfile operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The prompt id, or the requested version of it, does not exist.
    #[error("prompt `{id}`{} not found in the template store", version_suffix(.version))]
    NotFound {
        /// Requested prompt id.
        id: String,
        /// Requested version, when the id itself exists.
        version: Option<VersionLabel>,
    },
    /// A stored template document is malformed.
    #[error("malformed template document {}: {reason}", path.display())]
    Parse {
        /// Document that failed to parse.
        path: PathBuf,
        /// Human-readable parser message.
        reason: String,
    },
    /// The lockfile exists but its contents cannot be trusted.
    #[error("lockfile {} is corrupt: {reason}", path.display())]
    LockfileCorrupt {
        /// Lockfile location.
        path: PathBuf,
        /// Human-readable reason.
        reason: String,
    },
    /// Underlying I/O failure.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// File or directory involved in the failed operation.
        path: PathBuf,
        /// Source [`std::io::Error`].
        #[source]
        source: std::io::Error,
    },
    /// Another writer held the store lock for too long.
    #[error("timed out waiting for write lock {}; remove it if no other writer is running", path.display())]
    WriteContended {
        /// Lock file that could not be acquired.
        path: PathBuf,
    },
    /// Every candidate version label was taken by concurrent writers.
    #[error("could not allocate a free version label for prompt `{id}`")]
    VersionConflict {
        /// Prompt id being written.
        id: String,
    },
    /// An id or label read from disk failed validation.
    #[error(transparent)]
    Primitive(#[from] prompt_primitives::Error),
}

impl StoreError {
    /// Helper to construct I/O errors bound to a path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for [`StoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn version_suffix(version: &Option<VersionLabel>) -> String {
    version.map(|v| format!(" version {v}")).unwrap_or_default()
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
