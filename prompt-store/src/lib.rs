//! Persistence for versioned prompt templates.
//!
//! Two pieces of state live on disk next to the application code so that Git
//! records their history:
//!
//! - the template store, which owns every template version ever written and
//!   never rewrites one in place, available as a per-id directory layout
//!   ([`DirectoryStore`]) or a single combined document ([`CombinedStore`]);
//! - the [`Lockfile`], which pins prompt ids to the version the application
//!   should use.
//!
//! Every write goes through a temporary file that is moved into place, so a
//! crash never leaves a truncated document behind.

#![warn(missing_docs, clippy::pedantic)]

mod combined;
mod directory;
mod error;
mod fs;
mod lockfile;
mod record;
mod store;

pub use combined::CombinedStore;
pub use directory::DirectoryStore;
pub use error::{StoreError, StoreResult};
pub use fs::atomic_write;
pub use lockfile::Lockfile;
pub use record::TemplateVersion;
pub use store::{TemplateStore, open_store};

pub use prompt_primitives::{PromptId, VersionLabel};
