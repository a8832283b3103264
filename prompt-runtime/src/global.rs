//! Process-wide resolver behind the `p()` call surface.
//!
//! The resolver is discovered lazily from the current directory on first use.
//! Applications that know their project root can set it up front with
//! [`set_project_root`]; tests can swap in their own resolver with [`install`].

use std::env;
use std::path::Path;
use std::sync::{Arc, RwLock};

use prompt_config::find_project_root;
use prompt_store::StoreError;
use tracing::debug;

use crate::error::ResolveResult;
use crate::resolver::Resolver;
use crate::value::TemplateVars;

static GLOBAL: RwLock<Option<Arc<Resolver>>> = RwLock::new(None);

/// Points the process-wide resolver at the project rooted at `root`.
///
/// # Errors
///
/// Returns [`crate::ResolveError::Config`] when the project configuration is invalid.
///
/// # Panics
///
/// Panics if the global lock has been poisoned by a previous panic.
pub fn set_project_root(root: impl AsRef<Path>) -> ResolveResult<()> {
    let resolver = Resolver::for_project(root.as_ref())?;
    install(resolver);
    Ok(())
}

/// Installs `resolver` as the process-wide resolver.
///
/// # Panics
///
/// Panics if the global lock has been poisoned by a previous panic.
pub fn install(resolver: Resolver) {
    *GLOBAL.write().expect("global resolver poisoned") = Some(Arc::new(resolver));
}

/// Forgets the process-wide resolver; the next call discovers it again.
///
/// # Panics
///
/// Panics if the global lock has been poisoned by a previous panic.
pub fn reset() {
    GLOBAL.write().expect("global resolver poisoned").take();
}

/// Returns the process-wide resolver, discovering the project root from the
/// current directory when none is installed.
///
/// Discovery walks up to the first directory holding a lockfile, a project
/// configuration file or a `.git` entry, falling back to the current directory.
///
/// # Errors
///
/// Returns [`crate::ResolveError::Store`] when the current directory cannot be
/// read and [`crate::ResolveError::Config`] when the configuration is invalid.
///
/// # Panics
///
/// Panics if the global lock has been poisoned by a previous panic.
pub fn resolver() -> ResolveResult<Arc<Resolver>> {
    if let Some(resolver) = GLOBAL.read().expect("global resolver poisoned").as_ref() {
        return Ok(Arc::clone(resolver));
    }

    let mut guard = GLOBAL.write().expect("global resolver poisoned");
    if let Some(resolver) = guard.as_ref() {
        return Ok(Arc::clone(resolver));
    }
    let cwd = env::current_dir().map_err(|source| StoreError::io(".", source))?;
    let root = find_project_root(&cwd).unwrap_or(cwd);
    debug!(root = %root.display(), "discovered prompt project root");
    let resolver = Arc::new(Resolver::for_project(&root)?);
    *guard = Some(Arc::clone(&resolver));
    Ok(resolver)
}

/// Resolves `id` through the process-wide resolver and renders it with `vars`.
///
/// # Errors
///
/// See [`Resolver::resolve`] and [`resolver`].
///
/// # Panics
///
/// Panics if the global lock has been poisoned by a previous panic.
pub fn p(id: &str, inline_default: Option<&str>, vars: &TemplateVars) -> ResolveResult<String> {
    resolver()?.resolve(id, inline_default, vars)
}
