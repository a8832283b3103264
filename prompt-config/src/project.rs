//! Project layout configuration and root discovery.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Name of the optional per-project configuration file.
pub const CONFIG_FILE_NAME: &str = ".promptkit.yaml";
/// Default lockfile name at the project root.
pub const DEFAULT_LOCKFILE_NAME: &str = ".prompt_lock.json";
/// Default directory holding one subdirectory per prompt id.
pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
/// Default combined document used by [`StoreLayout::Combined`].
pub const DEFAULT_COMBINED_FILE: &str = "prompts.yaml";

/// Physical layout of the template store on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLayout {
    /// One directory per prompt id holding one `v<N>.yaml` file per version.
    #[default]
    Directory,
    /// A single YAML document keyed by prompt id.
    Combined,
}

/// Layout settings of a prompt project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Lockfile name relative to the project root.
    pub lockfile: PathBuf,
    /// Directory used by [`StoreLayout::Directory`], relative to the project root.
    pub prompts_dir: PathBuf,
    /// Active store layout.
    pub layout: StoreLayout,
    /// Document used by [`StoreLayout::Combined`], relative to the project root.
    pub combined_file: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            lockfile: PathBuf::from(DEFAULT_LOCKFILE_NAME),
            prompts_dir: PathBuf::from(DEFAULT_PROMPTS_DIR),
            layout: StoreLayout::default(),
            combined_file: PathBuf::from(DEFAULT_COMBINED_FILE),
        }
    }
}

impl ProjectConfig {
    /// Loads `.promptkit.yaml` from `root`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file exists but cannot be read and
    /// [`ConfigError::Parse`] when its contents are not a valid configuration.
    pub fn load(root: &Path) -> ConfigResult<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(root = %root.display(), "no project config, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&contents).map_err(|err| ConfigError::Parse {
            path,
            reason: err.to_string(),
        })
    }

    /// Absolute lockfile path for a project rooted at `root`.
    #[must_use]
    pub fn lockfile_path(&self, root: &Path) -> PathBuf {
        root.join(&self.lockfile)
    }

    /// Absolute prompts directory for a project rooted at `root`.
    #[must_use]
    pub fn prompts_path(&self, root: &Path) -> PathBuf {
        root.join(&self.prompts_dir)
    }

    /// Absolute combined document path for a project rooted at `root`.
    #[must_use]
    pub fn combined_path(&self, root: &Path) -> PathBuf {
        root.join(&self.combined_file)
    }
}

/// Walks from `start` towards the filesystem root and returns the first
/// directory that looks like a prompt project.
///
/// A directory qualifies when it contains the default lockfile, a
/// `.promptkit.yaml`, or a `.git` entry.
#[must_use]
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| {
            [DEFAULT_LOCKFILE_NAME, CONFIG_FILE_NAME, ".git"]
                .iter()
                .any(|marker| dir.join(marker).exists())
        })
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(
            config.lockfile_path(dir.path()),
            dir.path().join(".prompt_lock.json")
        );
    }

    #[test]
    fn partial_file_overrides_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "layout: combined\ncombined_file: all_prompts.yaml\n",
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.layout, StoreLayout::Combined);
        assert_eq!(config.combined_file, PathBuf::from("all_prompts.yaml"));
        assert_eq!(config.prompts_dir, PathBuf::from(DEFAULT_PROMPTS_DIR));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "layuot: combined\n").unwrap();

        let err = ProjectConfig::load(dir.path()).expect_err("typo should be rejected");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn finds_root_by_lockfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_LOCKFILE_NAME), "{}").unwrap();
        let nested = dir.path().join("src").join("app");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested).as_deref(), Some(dir.path()));
    }

    #[test]
    fn finds_root_by_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("src");
        std::fs::create_dir(&nested).unwrap();

        assert_eq!(find_project_root(&nested).as_deref(), Some(dir.path()));
    }
}
