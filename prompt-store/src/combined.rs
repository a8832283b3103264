//! Single-document layout: one YAML mapping keyed by prompt id.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use prompt_primitives::{PromptId, VersionLabel};
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::fs::{WriteLock, atomic_write};
use crate::record::{CombinedEntry, TemplateVersion, VersionDocument, VersionItem};
use crate::store::TemplateStore;

/// Template store backed by one combined YAML document.
///
/// Each id maps to a bare template string, a `{template, description}`
/// object, or a sequence of those (one per version, oldest first). Writing a
/// new version appends to the sequence under an exclusive lock and replaces
/// the document atomically, leaving earlier entries untouched.
#[derive(Debug, Clone)]
pub struct CombinedStore {
    path: PathBuf,
}

impl CombinedStore {
    /// Creates a store backed by the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<Mapping> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Mapping::new()),
            Err(source) => return Err(StoreError::io(&self.path, source)),
        };

        if contents.trim().is_empty() {
            return Ok(Mapping::new());
        }

        match serde_yaml::from_str::<Value>(&contents).map_err(|err| self.parse_error(err))? {
            Value::Mapping(mapping) => Ok(mapping),
            Value::Null => Ok(Mapping::new()),
            _ => Err(self.parse_error("top level must be a mapping of prompt ids")),
        }
    }

    fn entry(&self, document: &Mapping, id: &PromptId) -> StoreResult<Option<Vec<(VersionLabel, VersionItem)>>> {
        let Some(value) = document.get(id.as_str()) else {
            return Ok(None);
        };
        let entry: CombinedEntry = serde_yaml::from_value(value.clone())
            .map_err(|err| self.parse_error(format!("entry `{id}`: {err}")))?;
        entry
            .labelled()
            .map(Some)
            .map_err(|reason| self.parse_error(format!("entry `{id}`: {reason}")))
    }

    fn parse_error(&self, reason: impl ToString) -> StoreError {
        StoreError::Parse {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl TemplateStore for CombinedStore {
    fn list_versions(&self, id: &PromptId) -> StoreResult<Vec<VersionLabel>> {
        let document = self.load()?;
        Ok(self
            .entry(&document, id)?
            .map(|items| items.into_iter().map(|(label, _)| label).collect())
            .unwrap_or_default())
    }

    fn read(&self, id: &PromptId, version: VersionLabel) -> StoreResult<TemplateVersion> {
        let document = self.load()?;
        let items = self.entry(&document, id)?.ok_or_else(|| StoreError::NotFound {
            id: id.to_string(),
            version: None,
        })?;

        let (template, description) = items
            .into_iter()
            .find_map(|(label, item)| (label == version).then(|| item.into_parts()))
            .ok_or_else(|| StoreError::NotFound {
                id: id.to_string(),
                version: Some(version),
            })?;

        Ok(TemplateVersion::new(id.clone(), version, template, description))
    }

    fn write_new_version(
        &self,
        id: &PromptId,
        template: &str,
        description: Option<&str>,
    ) -> StoreResult<VersionLabel> {
        let _lock = WriteLock::acquire(&self.path)?;
        let mut document = self.load()?;
        let key = Value::String(id.to_string());

        let (label, value) = match self.entry(&document, id)? {
            None => {
                let item = VersionItem::Document(VersionDocument::new(None, template, description));
                (VersionLabel::FIRST, to_value(&item, &self.path)?)
            }
            Some(items) => {
                let label = items
                    .last()
                    .map_or(Some(VersionLabel::FIRST), |(last, _)| last.next())
                    .ok_or_else(|| StoreError::VersionConflict { id: id.to_string() })?;

                // Earlier items are carried over verbatim so their text never changes.
                let mut history = match document.get(&key) {
                    Some(Value::Sequence(existing)) => existing.clone(),
                    Some(single) => vec![single.clone()],
                    None => Vec::new(),
                };
                let item = VersionItem::Document(VersionDocument::new(Some(label), template, description));
                history.push(to_value(&item, &self.path)?);
                (label, Value::Sequence(history))
            }
        };

        document.insert(key, value);
        let contents = serde_yaml::to_string(&document).map_err(|err| self.parse_error(err))?;
        atomic_write(&self.path, contents.as_bytes())?;

        info!(%id, version = %label, path = %self.path.display(), "wrote template version");
        Ok(label)
    }

    fn list_ids(&self) -> StoreResult<BTreeSet<PromptId>> {
        let document = self.load()?;
        document
            .keys()
            .map(|key| match key {
                Value::String(name) => PromptId::new(name.clone()).map_err(StoreError::from),
                other => Err(self.parse_error(format!("prompt id must be a string, got {other:?}"))),
            })
            .collect()
    }
}

fn to_value(item: &VersionItem, path: &Path) -> StoreResult<Value> {
    serde_yaml::to_value(item).map_err(|err| StoreError::Parse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> PromptId {
        PromptId::new(value).unwrap()
    }

    #[test]
    fn normalises_both_value_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.yaml");
        fs::write(
            &path,
            "bare: \"Hi {name}\"\nobject:\n  template: \"Bye {name}\"\n  description: farewell\n",
        )
        .unwrap();

        let store = CombinedStore::new(&path);
        let bare = store.read(&id("bare"), VersionLabel::FIRST).unwrap();
        assert_eq!(bare.template(), "Hi {name}");
        assert_eq!(bare.description(), None);

        let object = store.read(&id("object"), VersionLabel::FIRST).unwrap();
        assert_eq!(object.template(), "Bye {name}");
        assert_eq!(object.description(), Some("farewell"));

        let ids: Vec<_> = store.list_ids().unwrap().into_iter().map(String::from).collect();
        assert_eq!(ids, vec!["bare", "object"]);
    }

    #[test]
    fn appending_upgrades_to_history_and_keeps_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.yaml");
        fs::write(&path, "greeting: \"Hi {name}\"\nother: untouched\n").unwrap();

        let store = CombinedStore::new(&path);
        let label = store
            .write_new_version(&id("greeting"), "Hello {name}!", Some("friendlier"))
            .unwrap();
        assert_eq!(label.to_string(), "v2");

        let versions = store.list_versions(&id("greeting")).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(
            store.read(&id("greeting"), VersionLabel::FIRST).unwrap().template(),
            "Hi {name}"
        );
        assert_eq!(
            store.read(&id("greeting"), label).unwrap().template(),
            "Hello {name}!"
        );
        assert_eq!(
            store.read(&id("other"), VersionLabel::FIRST).unwrap().template(),
            "untouched"
        );
    }

    #[test]
    fn unknown_version_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = CombinedStore::new(dir.path().join("prompts.yaml"));
        store.write_new_version(&id("x"), "one", None).unwrap();

        let err = store
            .read(&id("x"), "v5".parse().unwrap())
            .expect_err("v5 was never written");
        assert!(matches!(err, StoreError::NotFound { version: Some(_), .. }));

        let err = store
            .read(&id("missing"), VersionLabel::FIRST)
            .expect_err("unknown id");
        assert!(matches!(err, StoreError::NotFound { version: None, .. }));
    }

    #[test]
    fn non_mapping_document_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.yaml");
        fs::write(&path, "- just\n- a list\n").unwrap();

        let err = CombinedStore::new(&path)
            .list_ids()
            .expect_err("list is not a valid store");
        assert!(matches!(err, StoreError::Parse { .. }));
    }
}
