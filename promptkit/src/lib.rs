//! Git-native prompt versioning facade.
//!
//! Depend on this crate via `cargo add promptkit`. It bundles the internal
//! crates behind feature flags so applications that only resolve prompts can
//! leave the migration engine out.
//!
//! With the `runtime` feature the resolver call surface is available at the
//! crate root. The `#[prompt]` attribute has to be told where the runtime
//! lives when it is reached through this facade:
//!
//! ```ignore
//! use promptkit::prompt;
//!
//! #[prompt(id = "summary", runtime = "promptkit::runtime")]
//! /// Summarize {document} in {words} words.
//! fn summary(document: &str, words: u32) {}
//! ```

#![warn(missing_docs, clippy::pedantic)]

/// Prompt ids and version labels.
pub use prompt_primitives as primitives;

/// Project configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use prompt_config as config;

/// Template store and lockfile (enabled by `store` feature).
#[cfg(feature = "store")]
pub use prompt_store as store;

/// Resolver and template rendering (enabled by `runtime` feature).
#[cfg(feature = "runtime")]
pub use prompt_runtime as runtime;

/// F-string extraction engine (enabled by `migrate` feature).
#[cfg(feature = "migrate")]
pub use prompt_migrate as migrate;

#[cfg(feature = "runtime")]
pub use prompt_runtime::{ResolveError, ResolveResult, TemplateVars, global::p, prompt, vars};

pub use prompt_primitives::{PromptId, VersionLabel};
