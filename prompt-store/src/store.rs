//! Layout-independent template store contract.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use prompt_config::{ProjectConfig, StoreLayout};
use prompt_primitives::{PromptId, VersionLabel};

use crate::combined::CombinedStore;
use crate::directory::DirectoryStore;
use crate::error::StoreResult;
use crate::record::TemplateVersion;

/// Uniform id/version API over the supported on-disk layouts.
///
/// Implementations own the persisted template bytes exclusively. A version,
/// once written, is never modified: new edits always allocate a new label.
pub trait TemplateStore: Send + Sync + Debug {
    /// Returns every version label of `id` in ascending order.
    ///
    /// Unknown ids yield an empty list.
    ///
    /// # Errors
    ///
    /// Propagates I/O and parse failures of the underlying documents.
    fn list_versions(&self, id: &PromptId) -> StoreResult<Vec<VersionLabel>>;

    /// Reads one version of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotFound`] when the id or version is absent.
    fn read(&self, id: &PromptId, version: VersionLabel) -> StoreResult<TemplateVersion>;

    /// Writes `template` as the next version of `id` (current max + 1, starting
    /// at `v1`) and returns the allocated label.
    ///
    /// Concurrent writers for the same id never materialise the same label:
    /// the loser retries with the next free one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Io`] when the version cannot be written.
    fn write_new_version(
        &self,
        id: &PromptId,
        template: &str,
        description: Option<&str>,
    ) -> StoreResult<VersionLabel>;

    /// Returns every prompt id present in the store.
    ///
    /// # Errors
    ///
    /// Propagates I/O and parse failures of the underlying documents.
    fn list_ids(&self) -> StoreResult<BTreeSet<PromptId>>;

    /// Returns the most recent version of `id`, if any.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`TemplateStore::list_versions`] and
    /// [`TemplateStore::read`].
    fn latest(&self, id: &PromptId) -> StoreResult<Option<TemplateVersion>> {
        match self.list_versions(id)?.last() {
            Some(&version) => self.read(id, version).map(Some),
            None => Ok(None),
        }
    }
}

/// Opens the store configured for the project rooted at `root`.
#[must_use]
pub fn open_store(config: &ProjectConfig, root: &Path) -> Arc<dyn TemplateStore> {
    match config.layout {
        StoreLayout::Directory => Arc::new(DirectoryStore::new(config.prompts_path(root))),
        StoreLayout::Combined => Arc::new(CombinedStore::new(config.combined_path(root))),
    }
}
