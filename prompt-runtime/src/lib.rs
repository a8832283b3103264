//! Call-time prompt resolution.
//!
//! A call site names a prompt id, optionally supplies an inline default
//! template, and passes named values. The [`Resolver`] consults the lockfile:
//! a pinned id renders the stored version, an unpinned id renders the inline
//! default. Templates use `{name}` and `{name:spec}` placeholders with the
//! usual format-spec mini-language (fill, alignment, sign, width, grouping,
//! precision and presentation type).
//!
//! ```no_run
//! use prompt_runtime::{global, vars};
//!
//! let text = global::p("greeting", Some("Hello {name}!"), &vars!(name = "Bo"))?;
//! # Ok::<(), prompt_runtime::ResolveError>(())
//! ```

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod format;
pub mod global;
mod resolver;
mod template;
mod value;

pub use error::{ResolveError, ResolveResult};
pub use resolver::{PinStatus, Resolver, Selection};
pub use template::{PromptTemplate, TemplateError, TemplateResult, render};
pub use value::{TemplateValue, TemplateVars};

pub use prompt_macros::prompt;
