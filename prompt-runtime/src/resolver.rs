//! Lockfile-driven template selection and rendering.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use prompt_config::ProjectConfig;
use prompt_primitives::{PromptId, VersionLabel};
use prompt_store::{Lockfile, StoreError, TemplateStore, TemplateVersion, open_store};
use tracing::{debug, info};

use crate::error::{ResolveError, ResolveResult};
use crate::template::PromptTemplate;
use crate::value::TemplateVars;

/// Template chosen for one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<'a> {
    /// The lockfile pins the id to this stored version.
    Pinned(TemplateVersion),
    /// No lock entry; the call site's inline default applies.
    Inline(&'a str),
}

impl Selection<'_> {
    /// Returns the template text to render.
    #[must_use]
    pub fn template(&self) -> &str {
        match self {
            Self::Pinned(version) => version.template(),
            Self::Inline(template) => template,
        }
    }

    /// Returns the pinned version label, if the template came from the store.
    #[must_use]
    pub fn version(&self) -> Option<VersionLabel> {
        match self {
            Self::Pinned(version) => Some(version.version()),
            Self::Inline(_) => None,
        }
    }
}

/// One lock entry and whether the store still holds its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinStatus {
    id: PromptId,
    version: VersionLabel,
    available: bool,
}

impl PinStatus {
    /// Pinned prompt id.
    #[must_use]
    pub fn id(&self) -> &PromptId {
        &self.id
    }

    /// Pinned version.
    #[must_use]
    pub fn version(&self) -> VersionLabel {
        self.version
    }

    /// Returns `false` when the pinned version is missing from the store.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available
    }
}

/// Resolves prompt ids to rendered text using a lockfile and a template store.
///
/// The lockfile is loaded on first use and cached until [`Resolver::reload`].
/// Callers never see which store layout is active.
#[derive(Debug)]
pub struct Resolver {
    store: Arc<dyn TemplateStore>,
    lockfile_path: PathBuf,
    lockfile: RwLock<Option<Arc<Lockfile>>>,
}

impl Resolver {
    /// Creates a resolver over `store` that reads its pins from `lockfile_path`.
    #[must_use]
    pub fn new(store: Arc<dyn TemplateStore>, lockfile_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            lockfile_path: lockfile_path.into(),
            lockfile: RwLock::new(None),
        }
    }

    /// Creates a resolver with an already loaded lockfile.
    #[must_use]
    pub fn with_lockfile(store: Arc<dyn TemplateStore>, lockfile: Lockfile) -> Self {
        Self {
            store,
            lockfile_path: lockfile.path().to_path_buf(),
            lockfile: RwLock::new(Some(Arc::new(lockfile))),
        }
    }

    /// Creates a resolver for the project rooted at `root`, honouring its
    /// `.promptkit.yaml` when present.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Config`] when the project configuration is invalid.
    pub fn for_project(root: &Path) -> ResolveResult<Self> {
        let config = ProjectConfig::load(root)?;
        Ok(Self::new(
            open_store(&config, root),
            config.lockfile_path(root),
        ))
    }

    /// Returns the underlying template store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TemplateStore> {
        &self.store
    }

    /// Returns the lockfile location.
    #[must_use]
    pub fn lockfile_path(&self) -> &Path {
        &self.lockfile_path
    }

    /// Returns the cached lockfile, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Store`] when the lockfile is corrupt or unreadable.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned by a previous panic.
    pub fn lockfile(&self) -> ResolveResult<Arc<Lockfile>> {
        if let Some(lockfile) = self
            .lockfile
            .read()
            .expect("resolver lockfile poisoned")
            .as_ref()
        {
            return Ok(Arc::clone(lockfile));
        }

        let mut guard = self.lockfile.write().expect("resolver lockfile poisoned");
        if let Some(lockfile) = guard.as_ref() {
            return Ok(Arc::clone(lockfile));
        }
        let loaded = Arc::new(Lockfile::load(&self.lockfile_path)?);
        *guard = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Discards the cached lockfile and reads it again from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Store`] when the lockfile is corrupt or unreadable;
    /// the previous cache is dropped either way.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned by a previous panic.
    pub fn reload(&self) -> ResolveResult<Arc<Lockfile>> {
        self.lockfile
            .write()
            .expect("resolver lockfile poisoned")
            .take();
        self.lockfile()
    }

    /// Chooses the template for `id` without rendering it.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when there is neither a lock entry
    /// nor an inline default, and [`ResolveError::Store`] when a pinned version
    /// cannot be read (a stale pin is an error, never silently skipped).
    pub fn select<'a>(
        &self,
        id: &str,
        inline_default: Option<&'a str>,
    ) -> ResolveResult<Selection<'a>> {
        let lockfile = self.lockfile()?;
        if let Some(version) = lockfile.get(id) {
            let id = PromptId::new(id).map_err(prompt_store::StoreError::from)?;
            debug!(%id, %version, "resolving pinned template");
            return Ok(Selection::Pinned(self.store.read(&id, version)?));
        }

        match inline_default {
            Some(template) => Ok(Selection::Inline(template)),
            None => Err(ResolveError::NotFound { id: id.to_owned() }),
        }
    }

    /// Resolves `id` and renders the chosen template with `vars`.
    ///
    /// # Errors
    ///
    /// See [`Resolver::select`]; rendering adds [`ResolveError::MissingVariable`],
    /// [`ResolveError::InvalidTemplate`] and [`ResolveError::InvalidFormat`].
    pub fn resolve(
        &self,
        id: &str,
        inline_default: Option<&str>,
        vars: &TemplateVars,
    ) -> ResolveResult<String> {
        let selection = self.select(id, inline_default)?;
        let template = PromptTemplate::parse(selection.template())?;
        Ok(template.render(vars)?)
    }

    /// Pins `id` to `version` and saves the lockfile. Returns the previous pin.
    ///
    /// The lockfile is re-read from disk before the update so pins written
    /// by other processes are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Store`] wrapping [`StoreError::NotFound`] when the
    /// store holds no such version, and [`ResolveError::Store`] when the
    /// lockfile cannot be read or written.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned by a previous panic.
    pub fn switch(&self, id: &str, version: VersionLabel) -> ResolveResult<Option<VersionLabel>> {
        let id = PromptId::new(id).map_err(StoreError::from)?;
        if !self.store.list_versions(&id)?.contains(&version) {
            return Err(StoreError::NotFound {
                id: id.to_string(),
                version: Some(version),
            }
            .into());
        }

        let mut lockfile = Lockfile::load(&self.lockfile_path)?;
        let previous = lockfile.set(id.clone(), version);
        lockfile.save()?;
        info!(%id, %version, ?previous, "prompt version pinned");
        *self.lockfile.write().expect("resolver lockfile poisoned") = Some(Arc::new(lockfile));
        Ok(previous)
    }

    /// Lists every lock entry in id order with whether its version exists.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Store`] when the lockfile or store cannot be read.
    pub fn status(&self) -> ResolveResult<Vec<PinStatus>> {
        let lockfile = self.lockfile()?;
        lockfile
            .entries()
            .map(|(id, version)| {
                Ok(PinStatus {
                    id: id.clone(),
                    version,
                    available: self.store.list_versions(id)?.contains(&version),
                })
            })
            .collect()
    }

    /// Returns lock entries that point at versions missing from the store.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Store`] when the lockfile or store cannot be read.
    pub fn stale_pins(&self) -> ResolveResult<Vec<(PromptId, VersionLabel)>> {
        Ok(self
            .status()?
            .into_iter()
            .filter(|pin| !pin.available)
            .map(|pin| (pin.id, pin.version))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars;
    use prompt_store::{DirectoryStore, StoreError};
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Arc<dyn TemplateStore>, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let store: Arc<dyn TemplateStore> =
            Arc::new(DirectoryStore::new(dir.path().join("prompts")));
        let lockfile = dir.path().join(".prompt_lock.json");
        (dir, store, lockfile)
    }

    fn id(value: &str) -> PromptId {
        PromptId::new(value).expect("valid id")
    }

    #[test]
    fn inline_default_used_without_lock_entry() {
        let (_dir, store, lockfile) = fixture();
        let resolver = Resolver::new(store, lockfile);
        let rendered = resolver
            .resolve("x", Some("Hi {name}"), &vars!(name = "Bo"))
            .unwrap();
        assert_eq!(rendered, "Hi Bo");
    }

    #[test]
    fn pinned_version_wins_over_inline_default() {
        let (_dir, store, lockfile_path) = fixture();
        let version = store.write_new_version(&id("x"), "Hi {name}!!", None).unwrap();
        let mut lockfile = Lockfile::empty(&lockfile_path);
        lockfile.set(id("x"), version);
        lockfile.save().unwrap();

        let resolver = Resolver::new(store, lockfile_path);
        let rendered = resolver
            .resolve("x", Some("Hi {name}"), &vars!(name = "Bo"))
            .unwrap();
        assert_eq!(rendered, "Hi Bo!!");
    }

    #[test]
    fn missing_variable_is_reported() {
        let (_dir, store, lockfile) = fixture();
        let resolver = Resolver::new(store, lockfile);
        let err = resolver
            .resolve("x", Some("Hi {name}"), &vars!())
            .expect_err("missing variable");
        assert!(matches!(err, ResolveError::MissingVariable { name } if name == "name"));
    }

    #[test]
    fn no_entry_and_no_default_is_not_found() {
        let (_dir, store, lockfile) = fixture();
        let resolver = Resolver::new(store, lockfile);
        let err = resolver.resolve("x", None, &vars!()).expect_err("not found");
        assert!(matches!(err, ResolveError::NotFound { id } if id == "x"));
    }

    #[test]
    fn stale_pin_is_an_error() {
        let (_dir, store, lockfile_path) = fixture();
        let mut lockfile = Lockfile::empty(&lockfile_path);
        lockfile.set(id("x"), VersionLabel::new(3).unwrap());
        let resolver = Resolver::with_lockfile(Arc::clone(&store), lockfile);

        let err = resolver
            .resolve("x", Some("Hi {name}"), &vars!(name = "Bo"))
            .expect_err("stale pin");
        assert!(matches!(err, ResolveError::Store(StoreError::NotFound { .. })));
        assert_eq!(
            resolver.stale_pins().unwrap(),
            vec![(id("x"), VersionLabel::new(3).unwrap())]
        );
    }

    #[test]
    fn reload_picks_up_new_pins() {
        let (_dir, store, lockfile_path) = fixture();
        let resolver = Resolver::new(Arc::clone(&store), &lockfile_path);
        assert!(resolver.lockfile().unwrap().is_empty());

        let version = store.write_new_version(&id("x"), "stored", None).unwrap();
        let mut lockfile = Lockfile::empty(&lockfile_path);
        lockfile.set(id("x"), version);
        lockfile.save().unwrap();

        assert_eq!(resolver.select("x", Some("inline")).unwrap().template(), "inline");
        resolver.reload().unwrap();
        let selection = resolver.select("x", Some("inline")).unwrap();
        assert_eq!(selection.template(), "stored");
        assert_eq!(selection.version(), Some(VersionLabel::FIRST));
    }

    #[test]
    fn corrupt_lockfile_fails_resolution() {
        let (_dir, store, lockfile_path) = fixture();
        std::fs::write(&lockfile_path, "{ not json").unwrap();
        let resolver = Resolver::new(store, lockfile_path);
        let err = resolver
            .resolve("x", Some("Hi"), &vars!())
            .expect_err("corrupt lockfile");
        assert!(matches!(err, ResolveError::Store(StoreError::LockfileCorrupt { .. })));
    }

    #[test]
    fn switch_pins_existing_versions_only() {
        let (_dir, store, lockfile_path) = fixture();
        let first = store.write_new_version(&id("x"), "one", None).unwrap();
        let second = store.write_new_version(&id("x"), "two", None).unwrap();
        let resolver = Resolver::new(Arc::clone(&store), &lockfile_path);

        assert_eq!(resolver.switch("x", second).unwrap(), None);
        assert_eq!(resolver.select("x", None).unwrap().template(), "two");
        assert_eq!(resolver.switch("x", first).unwrap(), Some(second));
        assert_eq!(Lockfile::load(&lockfile_path).unwrap().get("x"), Some(first));

        let missing = VersionLabel::new(9).unwrap();
        let err = resolver.switch("x", missing).expect_err("absent version");
        assert!(matches!(
            err,
            ResolveError::Store(StoreError::NotFound { version: Some(v), .. }) if v == missing
        ));
        let err = resolver.switch("nobody", first).expect_err("absent id");
        assert!(matches!(err, ResolveError::Store(StoreError::NotFound { .. })));
        assert_eq!(Lockfile::load(&lockfile_path).unwrap().get("x"), Some(first));
    }

    #[test]
    fn status_marks_missing_versions() {
        let (_dir, store, lockfile_path) = fixture();
        let version = store.write_new_version(&id("b"), "stored", None).unwrap();
        let mut lockfile = Lockfile::empty(&lockfile_path);
        lockfile.set(id("b"), version);
        lockfile.set(id("a"), VersionLabel::new(2).unwrap());
        lockfile.save().unwrap();

        let resolver = Resolver::new(store, lockfile_path);
        let status: Vec<_> = resolver
            .status()
            .unwrap()
            .iter()
            .map(|pin| (pin.id().to_string(), pin.version().to_string(), pin.is_available()))
            .collect();
        assert_eq!(
            status,
            vec![
                ("a".to_owned(), "v2".to_owned(), false),
                ("b".to_owned(), "v1".to_owned(), true),
            ]
        );
        assert_eq!(
            resolver.stale_pins().unwrap(),
            vec![(id("a"), VersionLabel::new(2).unwrap())]
        );
    }
}
