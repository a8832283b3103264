//! Core shared types for git-native prompt versioning.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod version;

/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Stable key identifying one logical prompt across versions.
pub use ids::PromptId;
/// Ordered, immutable version label (`v1`, `v2`, ...).
pub use version::VersionLabel;
