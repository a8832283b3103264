//! Migration entry point: walk, scan, review, apply.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use prompt_config::{ProjectConfig, find_project_root};
use prompt_primitives::VersionLabel;
use prompt_store::{Lockfile, TemplateStore, atomic_write, open_store};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::applier::{Applier, ImportSite, apply_edits};
use crate::error::{MigrateError, MigrateResult};
use crate::planner::{ExtractionPlanner, PlannedCandidate};
use crate::registry::IdRegistry;
use crate::review::{Decision, ReviewMode, Reviewer};
use crate::scanner::{LiteralScanner, ScanOptions, ScanOutcome, SkipReason};

const IGNORED_DIRS: &[&str] = &["__pycache__", "node_modules", "site-packages", "venv"];

/// Settings of one migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// File extensions to scan, without the leading dot.
    pub extensions: Vec<String>,
    /// Minimum number of characters in a literal's body.
    pub min_literal_len: usize,
    /// Name of the resolver function emitted in rewritten calls.
    pub call_name: String,
    /// Statement inserted into files that do not yet bind `call_name`.
    pub import_line: String,
    /// Optional variable-name keywords restricting which literals are extracted.
    pub target_names: Vec<String>,
    /// How candidates are confirmed.
    pub mode: ReviewMode,
    /// Drop the inline template from rewritten calls and pin extracted ids.
    pub clean: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        let scan = ScanOptions::default();
        Self {
            extensions: vec!["py".to_owned()],
            min_literal_len: scan.min_literal_len,
            call_name: "p".to_owned(),
            import_line: "from promptkit import p".to_owned(),
            target_names: scan.target_names,
            mode: ReviewMode::default(),
            clean: false,
        }
    }
}

impl MigrationConfig {
    /// Sets the review mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ReviewMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the clean flag.
    #[must_use]
    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Replaces the scanned file extensions.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts extraction to literals bound to names containing one of `names`.
    #[must_use]
    pub fn with_target_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_names = names.into_iter().map(Into::into).collect();
        self
    }

    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            min_literal_len: self.min_literal_len,
            target_names: self.target_names.clone(),
        }
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|wanted| wanted.trim_start_matches('.') == ext)
            })
    }
}

/// What happened to one planned candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Reported by a dry run.
    Proposed,
    /// Written to the store and rewritten in code.
    Applied {
        /// Version written to the store.
        version: VersionLabel,
    },
    /// Declined by the reviewer.
    Rejected,
    /// The store write failed; the code was left unchanged.
    Failed {
        /// Rendered store error.
        reason: String,
    },
}

/// Per-candidate line of a [`MigrationSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateReport {
    /// File path relative to the migration target.
    pub file: PathBuf,
    /// 1-based line of the literal.
    pub line: usize,
    /// Generated prompt id.
    pub id: String,
    /// Extracted template text.
    pub template: String,
    /// Literal as written.
    pub original: String,
    /// Proposed call expression.
    pub replacement: String,
    /// Outcome.
    pub status: CandidateStatus,
}

impl CandidateReport {
    fn new(candidate: &PlannedCandidate, status: CandidateStatus) -> Self {
        Self {
            file: candidate.file().to_path_buf(),
            line: candidate.line(),
            id: candidate.id().to_string(),
            template: candidate.template().to_owned(),
            original: candidate.original().to_owned(),
            replacement: candidate.replacement().to_owned(),
            status,
        }
    }
}

/// A file that could not be migrated.
#[derive(Debug)]
pub struct FileError {
    /// File or directory involved.
    pub path: PathBuf,
    /// Underlying failure.
    pub error: MigrateError,
}

/// Tally of one migration run.
#[derive(Debug, Default)]
pub struct MigrationSummary {
    /// Source files examined.
    pub files_scanned: usize,
    /// Candidates written to the store and rewritten in code.
    pub accepted: usize,
    /// Candidates declined by the reviewer.
    pub rejected: usize,
    /// Candidates reported by a dry run.
    pub proposed: usize,
    /// F-strings skipped by the length, interpolation, raw, concatenation or
    /// name filters.
    pub skipped: usize,
    /// F-strings skipped because they hold unsupported expressions.
    pub unsupported: usize,
    /// Accepted candidates whose store write failed.
    pub failed: usize,
    /// Files rewritten on disk.
    pub files_modified: usize,
    /// Whether the reviewer stopped the run early.
    pub quit: bool,
    /// One entry per planned candidate, in processing order.
    pub reports: Vec<CandidateReport>,
    /// Files skipped because of read, tokenize or write failures.
    pub file_errors: Vec<FileError>,
}

struct ScannedFile {
    source: String,
    outcomes: Vec<ScanOutcome>,
    import: ImportSite,
}

struct RunState<'a> {
    planner: ExtractionPlanner,
    applier: Applier<'a>,
    registry: IdRegistry,
    lockfile: Lockfile,
    summary: MigrationSummary,
}

/// Extracts interpolated literals from a source tree into the template store.
///
/// Files are read and scanned in parallel; ids are then reserved and
/// candidates reviewed and applied one file at a time in path order, so two
/// runs over the same tree produce the same ids and the same rewritten files.
#[derive(Debug, Clone)]
pub struct Migrator {
    store: Arc<dyn TemplateStore>,
    lockfile_path: PathBuf,
    config: MigrationConfig,
}

impl Migrator {
    /// Creates a migrator writing to `store` and pinning into `lockfile_path`.
    #[must_use]
    pub fn new(
        store: Arc<dyn TemplateStore>,
        lockfile_path: impl Into<PathBuf>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            store,
            lockfile_path: lockfile_path.into(),
            config,
        }
    }

    /// Creates a migrator for the project rooted at `root`, honouring its
    /// `.promptkit.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Config`] when the project configuration is invalid.
    pub fn for_project(root: &Path, config: MigrationConfig) -> MigrateResult<Self> {
        let project = ProjectConfig::load(root)?;
        Ok(Self::new(
            open_store(&project, root),
            project.lockfile_path(root),
            config,
        ))
    }

    /// Settings of this migrator.
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Migrates every matching file under `target` (or `target` itself).
    ///
    /// Failures reading, tokenizing or writing one file are recorded in
    /// [`MigrationSummary::file_errors`] and the run continues; failed store
    /// writes only affect their own candidate.
    ///
    /// # Errors
    ///
    /// Returns an error, before anything is written, when `target` does not
    /// exist, the store cannot list its ids, or the lockfile is corrupt.
    pub fn run(
        &self,
        target: &Path,
        reviewer: &mut dyn Reviewer,
    ) -> MigrateResult<MigrationSummary> {
        fs::metadata(target).map_err(|err| MigrateError::io(target, err))?;
        let lockfile = Lockfile::load(&self.lockfile_path)?;
        let registry = IdRegistry::seeded(self.store.list_ids()?);

        let mut state = RunState {
            planner: ExtractionPlanner::new(&self.config.call_name, self.config.clean),
            applier: Applier::new(self.store.as_ref()),
            registry,
            lockfile,
            summary: MigrationSummary::default(),
        };

        let files = self.collect_files(target, &mut state.summary);
        info!(
            target = %target.display(),
            files = files.len(),
            mode = ?self.config.mode,
            clean = self.config.clean,
            "starting prompt migration"
        );

        let options = self.config.scan_options();
        let scanned: Vec<(PathBuf, MigrateResult<ScannedFile>)> = files
            .into_par_iter()
            .map(|path| {
                let scanned = self.scan_file(&path, &options);
                (path, scanned)
            })
            .collect();

        for (path, scanned) in scanned {
            state.summary.files_scanned += 1;
            let shown = display_path(target, &path);
            let result = match scanned {
                Ok(scanned) => self.migrate_file(&mut state, &path, &shown, scanned, reviewer),
                Err(error) => Err(error),
            };
            match result {
                Ok(false) => {}
                Ok(true) => {
                    info!("migration stopped by reviewer");
                    state.summary.quit = true;
                    break;
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(file = %shown.display(), %error, "skipping file");
                    state.summary.file_errors.push(FileError { path, error });
                }
            }
        }

        let summary = state.summary;
        info!(
            accepted = summary.accepted,
            rejected = summary.rejected,
            proposed = summary.proposed,
            skipped = summary.skipped + summary.unsupported,
            failed = summary.failed,
            files_modified = summary.files_modified,
            "prompt migration finished"
        );
        Ok(summary)
    }

    fn collect_files(&self, target: &Path, summary: &mut MigrationSummary) -> Vec<PathBuf> {
        let walker = WalkDir::new(target)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_ignored_dir(entry));

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.config.matches_extension(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(err) => {
                    let path = err
                        .path()
                        .map_or_else(|| target.to_path_buf(), Path::to_path_buf);
                    warn!(path = %path.display(), error = %err, "cannot walk entry");
                    summary.file_errors.push(FileError {
                        path,
                        error: err.into(),
                    });
                }
            }
        }
        files.sort();
        files
    }

    fn scan_file(&self, path: &Path, options: &ScanOptions) -> MigrateResult<ScannedFile> {
        let source = fs::read_to_string(path).map_err(|err| MigrateError::io(path, err))?;
        let (outcomes, import) = {
            let scanner = LiteralScanner::new(&source, options.clone())?;
            let outcomes: Vec<ScanOutcome> = scanner.outcomes().collect();
            let import = ImportSite::locate(&source, scanner.tokens(), &self.config.call_name);
            (outcomes, import)
        };
        debug!(
            file = %path.display(),
            literals = outcomes.len(),
            import_present = import.present(),
            "scanned"
        );
        Ok(ScannedFile {
            source,
            outcomes,
            import,
        })
    }

    /// Reviews and applies one file's candidates. Returns `true` when the
    /// reviewer asked to quit.
    fn migrate_file(
        &self,
        state: &mut RunState<'_>,
        path: &Path,
        shown: &Path,
        scanned: ScannedFile,
        reviewer: &mut dyn Reviewer,
    ) -> MigrateResult<bool> {
        let mut edits = Vec::new();
        let mut pinned = false;
        let mut quit = false;

        for outcome in scanned.outcomes {
            let raw = match outcome {
                ScanOutcome::Candidate(raw) => raw,
                ScanOutcome::Skipped {
                    reason: SkipReason::Unsupported(_),
                    ..
                } => {
                    state.summary.unsupported += 1;
                    continue;
                }
                ScanOutcome::Skipped { .. } => {
                    state.summary.skipped += 1;
                    continue;
                }
            };

            let line = raw.line();
            let candidate = match state.planner.plan(shown, raw, &state.registry) {
                Ok(candidate) => candidate,
                Err(error) => {
                    warn!(file = %shown.display(), line, %error, "cannot plan candidate");
                    state.summary.failed += 1;
                    continue;
                }
            };

            let decision = match self.config.mode {
                ReviewMode::DryRun => {
                    state.summary.proposed += 1;
                    state
                        .summary
                        .reports
                        .push(CandidateReport::new(&candidate, CandidateStatus::Proposed));
                    continue;
                }
                ReviewMode::Auto => Decision::Accept,
                ReviewMode::Interactive => reviewer.review(&candidate),
            };

            let status = match decision {
                Decision::Quit => {
                    quit = true;
                    break;
                }
                Decision::Reject => {
                    debug!(id = %candidate.id(), "candidate rejected");
                    state.summary.rejected += 1;
                    CandidateStatus::Rejected
                }
                Decision::Accept => match state.applier.apply(&candidate) {
                    Ok((version, edit)) => {
                        state.summary.accepted += 1;
                        edits.push(edit);
                        if self.config.clean {
                            state.lockfile.set(candidate.id().clone(), version);
                            pinned = true;
                        }
                        CandidateStatus::Applied { version }
                    }
                    Err(error) => {
                        warn!(id = %candidate.id(), %error, "store write failed, literal left in place");
                        state.summary.failed += 1;
                        CandidateStatus::Failed {
                            reason: error.to_string(),
                        }
                    }
                },
            };
            state
                .summary
                .reports
                .push(CandidateReport::new(&candidate, status));
        }

        if !edits.is_empty() {
            if let Some(import) = scanned.import.edit(&self.config.import_line) {
                edits.push(import);
            }
            let rewritten = apply_edits(&scanned.source, edits)?;
            if pinned {
                state.lockfile.save()?;
            }
            atomic_write(path, rewritten.as_bytes())?;
            state.summary.files_modified += 1;
            info!(file = %shown.display(), "source file rewritten");
        }
        Ok(quit)
    }
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || IGNORED_DIRS.contains(&name))
}

fn display_path(target: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(target) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
        _ => path
            .file_name()
            .map_or_else(|| path.to_path_buf(), PathBuf::from),
    }
}

/// Migrates `target` within the project that contains it.
///
/// The project root is the nearest ancestor holding a lockfile, a
/// `.promptkit.yaml` or a `.git` entry, falling back to `target`'s directory.
///
/// # Errors
///
/// See [`Migrator::for_project`] and [`Migrator::run`].
pub fn migrate(
    target: &Path,
    config: MigrationConfig,
    reviewer: &mut dyn Reviewer,
) -> MigrateResult<MigrationSummary> {
    let start = if target.is_dir() {
        target
    } else {
        target
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    };
    let root = find_project_root(start).unwrap_or_else(|| start.to_path_buf());
    Migrator::for_project(&root, config)?.run(target, reviewer)
}
