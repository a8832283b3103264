//! Per-id directory layout: `<root>/<id>/v<N>.yaml`.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use prompt_primitives::{PromptId, VersionLabel};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::fs::{Publish, publish_new};
use crate::record::{TemplateVersion, VersionDocument};
use crate::store::TemplateStore;

const VERSION_EXTENSIONS: [&str; 2] = ["yaml", "yml"];
const MAX_WRITE_ATTEMPTS: usize = 64;

/// Template store holding one directory per prompt id and one YAML document
/// per version.
///
/// Each document carries `version`, an optional `description`, and
/// `template`. New versions are published with an exclusive create, so two
/// writers racing for the same label can never both succeed.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Creates a store rooted at `root` (typically `<project>/prompts`).
    ///
    /// The directory is created lazily on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn prompt_dir(&self, id: &PromptId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn version_files(&self, id: &PromptId) -> StoreResult<Vec<(VersionLabel, PathBuf)>> {
        let dir = self.prompt_dir(id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::io(dir, source)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|source| StoreError::io(&dir, source))?.path();
            match parse_version_file(&path) {
                Some(label) => files.push((label, path)),
                None => debug!(path = %path.display(), "ignoring non-version file"),
            }
        }

        files.sort_by_key(|(label, _)| *label);
        if let Some(pair) = files.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(StoreError::Parse {
                path: pair[1].1.clone(),
                reason: format!("version {} is stored twice", pair[1].0),
            });
        }
        Ok(files)
    }
}

fn parse_version_file(path: &Path) -> Option<VersionLabel> {
    let extension = path.extension()?.to_str()?;
    if !VERSION_EXTENSIONS.contains(&extension) {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

impl TemplateStore for DirectoryStore {
    fn list_versions(&self, id: &PromptId) -> StoreResult<Vec<VersionLabel>> {
        Ok(self
            .version_files(id)?
            .into_iter()
            .map(|(label, _)| label)
            .collect())
    }

    fn read(&self, id: &PromptId, version: VersionLabel) -> StoreResult<TemplateVersion> {
        let files = self.version_files(id)?;
        if files.is_empty() {
            return Err(StoreError::NotFound {
                id: id.to_string(),
                version: None,
            });
        }

        let path = files
            .into_iter()
            .find_map(|(label, path)| (label == version).then_some(path))
            .ok_or_else(|| StoreError::NotFound {
                id: id.to_string(),
                version: Some(version),
            })?;

        let contents = fs::read_to_string(&path).map_err(|source| StoreError::io(&path, source))?;
        let document: VersionDocument =
            serde_yaml::from_str(&contents).map_err(|err| StoreError::Parse {
                path: path.clone(),
                reason: err.to_string(),
            })?;

        if let Some(declared) = document.version.filter(|declared| *declared != version) {
            warn!(
                path = %path.display(),
                %declared,
                "version field disagrees with file name; using file name"
            );
        }

        Ok(TemplateVersion::new(
            id.clone(),
            version,
            document.template,
            document.description,
        ))
    }

    fn write_new_version(
        &self,
        id: &PromptId,
        template: &str,
        description: Option<&str>,
    ) -> StoreResult<VersionLabel> {
        let dir = self.prompt_dir(id);
        let mut next = self
            .list_versions(id)?
            .last()
            .map_or(Some(VersionLabel::FIRST), |last| last.next());

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let Some(label) = next else { break };
            let document = VersionDocument::new(Some(label), template, description);
            let contents = serde_yaml::to_string(&document).map_err(|err| StoreError::Parse {
                path: dir.clone(),
                reason: err.to_string(),
            })?;

            let path = dir.join(format!("{label}.yaml"));
            match publish_new(&path, contents.as_bytes())? {
                Publish::Created => {
                    info!(%id, version = %label, path = %path.display(), "wrote template version");
                    return Ok(label);
                }
                Publish::AlreadyExists => {
                    debug!(%id, version = %label, "version label taken, retrying");
                    let current = self.list_versions(id)?.last().copied().unwrap_or(label);
                    next = current.max(label).next();
                }
            }
        }

        Err(StoreError::VersionConflict { id: id.to_string() })
    }

    fn list_ids(&self) -> StoreResult<BTreeSet<PromptId>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(source) => return Err(StoreError::io(&self.root, source)),
        };

        let mut ids = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::io(&self.root, source))?;
            let is_dir = entry
                .file_type()
                .map_err(|source| StoreError::io(entry.path(), source))?
                .is_dir();
            if !is_dir {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            match PromptId::new(name) {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(err) => debug!(path = %entry.path().display(), error = %err, "skipping directory"),
            }
        }
        Ok(ids)
    }
}
