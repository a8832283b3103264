//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted while loading project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading the configuration file.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Source [`std::io::Error`].
        #[source]
        source: std::io::Error,
    },
    /// The configuration document is not valid YAML for [`crate::ProjectConfig`].
    #[error("invalid configuration in {}: {reason}", path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Human-readable parser message.
        reason: String,
    },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
