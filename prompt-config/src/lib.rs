//! Configuration management for prompt projects.
//!
//! A project is a directory holding the lockfile and the template store. Its
//! layout can be tuned with an optional `.promptkit.yaml` next to the lockfile;
//! every field falls back to a sensible default when absent.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod project;

pub use error::{ConfigError, ConfigResult};
pub use project::{
    CONFIG_FILE_NAME, DEFAULT_COMBINED_FILE, DEFAULT_LOCKFILE_NAME, DEFAULT_PROMPTS_DIR,
    ProjectConfig, StoreLayout, find_project_root,
};
