//! Extraction of hardcoded f-string prompts into versioned templates.
//!
//! A migration run walks a Python source tree, finds interpolated string
//! literals, and proposes to replace each with a resolver call:
//!
//! ```text
//! msg = f"Hello {user.name}, price: {price:.2f}"
//! ```
//!
//! becomes
//!
//! ```text
//! msg = p("shop_msg", "Hello {user_name}, price: {price:.2f}", user_name=user.name, price=price)
//! ```
//!
//! while `Hello {user_name}, price: {price:.2f}` is written to the template
//! store as a new version of `shop_msg`. Candidates are reported
//! ([`ReviewMode::DryRun`]), confirmed one by one through a [`Reviewer`]
//! ([`ReviewMode::Interactive`]) or all accepted ([`ReviewMode::Auto`]).
//!
//! Files are scanned in parallel; prompt ids stay unique across the whole run
//! through a shared [`IdRegistry`]. Edits in one file are applied from the
//! highest offset down, and the resolver import is added once per rewritten
//! file.

#![warn(missing_docs, clippy::pedantic)]

mod applier;
mod error;
mod fstring;
mod lexer;
mod migrator;
mod naming;
mod planner;
mod registry;
mod review;
mod scanner;

pub use applier::{Applier, Edit, apply_edits};
pub use error::{MigrateError, MigrateResult};
pub use fstring::{Segment, Unsupported};
pub use migrator::{
    CandidateReport, CandidateStatus, FileError, MigrationConfig, MigrationSummary, Migrator,
    migrate,
};
pub use naming::{id_base, sanitize};
pub use planner::{ExtractionPlanner, Placeholder, PlannedCandidate};
pub use registry::IdRegistry;
pub use review::{AutoApprove, Decision, ReviewMode, Reviewer, ScriptedReviewer};
pub use scanner::{Context, LiteralScanner, Outcomes, RawCandidate, ScanOptions, ScanOutcome, SkipReason};
