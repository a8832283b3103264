//! Persisted pin of prompt ids to template versions.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use prompt_primitives::{PromptId, VersionLabel};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::fs::atomic_write;

/// Mapping of prompt ids to pinned version labels.
///
/// An id without an entry resolves to the inline default supplied at the
/// call site. The document is a flat JSON object; `null` values are read as
/// absent entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lockfile {
    path: PathBuf,
    entries: BTreeMap<PromptId, VersionLabel>,
}

impl Lockfile {
    /// Creates an empty lockfile that will be saved at `path`.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Loads the lockfile at `path`.
    ///
    /// A missing file yields an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockfileCorrupt`] when the file exists but is not
    /// a JSON object of valid ids and version labels; no partial mapping is
    /// ever inferred. Returns [`StoreError::Io`] when the file cannot be read.
    pub fn load(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no lockfile, every prompt uses its inline default");
                return Ok(Self::empty(path));
            }
            Err(source) => return Err(StoreError::io(path, source)),
        };

        let raw: BTreeMap<String, Option<String>> =
            serde_json::from_str(&contents).map_err(|err| StoreError::LockfileCorrupt {
                path: path.clone(),
                reason: err.to_string(),
            })?;

        let mut entries = BTreeMap::new();
        for (id, version) in raw {
            let Some(version) = version else { continue };
            let corrupt = |err: prompt_primitives::Error| StoreError::LockfileCorrupt {
                path: path.clone(),
                reason: err.to_string(),
            };
            entries.insert(
                PromptId::new(id).map_err(corrupt)?,
                version.parse().map_err(corrupt)?,
            );
        }

        Ok(Self { path, entries })
    }

    /// Returns the lockfile location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the pinned version of `id`, or `None` to use the inline default.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<VersionLabel> {
        self.entries.get(id).copied()
    }

    /// Pins `id` to `version`, returning the previous pin.
    pub fn set(&mut self, id: PromptId, version: VersionLabel) -> Option<VersionLabel> {
        self.entries.insert(id, version)
    }

    /// Removes the pin of `id`, returning it.
    pub fn unset(&mut self, id: &str) -> Option<VersionLabel> {
        self.entries.remove(id)
    }

    /// Iterates over all pins in id order.
    pub fn entries(&self) -> impl Iterator<Item = (&PromptId, VersionLabel)> {
        self.entries.iter().map(|(id, version)| (id, *version))
    }

    /// Returns `true` when nothing is pinned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the lockfile atomically (temporary file, then rename).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the document cannot be written.
    pub fn save(&self) -> StoreResult<()> {
        let document: BTreeMap<&str, String> = self
            .entries
            .iter()
            .map(|(id, version)| (id.as_str(), version.to_string()))
            .collect();
        let mut contents =
            serde_json::to_string_pretty(&document).map_err(|err| StoreError::io(&self.path, err.into()))?;
        contents.push('\n');
        atomic_write(&self.path, contents.as_bytes())
    }
}
