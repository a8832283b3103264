//! Command-line front end for a prompt project.
//!
//! `migrate` extracts hardcoded f-string prompts into the template store,
//! asking before each rewrite unless `--yes` or `--dry-run` is given.
//! `switch` pins a stored version in the lockfile and `status` lists the pins.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use promptkit::config::find_project_root;
use promptkit::migrate::{
    CandidateStatus, Decision, MigrationConfig, MigrationSummary, PlannedCandidate, ReviewMode,
    migrate,
};
use promptkit::runtime::{ResolveError, Resolver};
use promptkit::store::StoreError;
use promptkit::{PromptId, VersionLabel};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "migrate-project")]
#[command(about = "Manage versioned prompts of a Python project", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract f-string prompts into versioned templates.
    Migrate(MigrateArgs),

    /// Pin a prompt to one of its stored versions.
    Switch {
        /// Prompt id.
        id: String,

        /// Version to pin, such as `v2`.
        version: VersionLabel,

        /// Project root; defaults to the nearest enclosing project.
        #[arg(long, short = 'p')]
        project: Option<PathBuf>,
    },

    /// List lockfile pins and whether their versions exist.
    Status {
        /// Project root; defaults to the nearest enclosing project.
        #[arg(long, short = 'p')]
        project: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct MigrateArgs {
    /// Directory or file to migrate.
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Report candidates without writing anything.
    #[arg(long, conflicts_with = "yes")]
    dry_run: bool,

    /// Accept every candidate without asking.
    #[arg(long, short = 'y')]
    yes: bool,

    /// Keep only the id and keyword arguments in rewritten calls.
    #[arg(long)]
    clean: bool,

    /// File extension to scan (repeatable).
    #[arg(long = "ext", default_value = "py")]
    extensions: Vec<String>,

    /// Only extract literals bound to names containing this word (repeatable).
    #[arg(long = "target")]
    target_names: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match Cli::parse().command {
        Commands::Migrate(args) => run_migrate(args),
        Commands::Switch {
            id,
            version,
            project,
        } => switch(&resolver(project)?, &id, version),
        Commands::Status { project } => status(&resolver(project)?),
    }
}

fn run_migrate(args: MigrateArgs) -> Result<()> {
    let mode = if args.dry_run {
        ReviewMode::DryRun
    } else if args.yes {
        ReviewMode::Auto
    } else {
        ReviewMode::Interactive
    };
    let config = MigrationConfig::default()
        .with_mode(mode)
        .with_clean(args.clean)
        .with_extensions(args.extensions)
        .with_target_names(args.target_names);

    let stdin = io::stdin();
    let mut reviewer = |candidate: &PlannedCandidate| {
        ask(&mut stdin.lock(), candidate).unwrap_or(Decision::Quit)
    };
    let summary = migrate(&args.path, config, &mut reviewer)
        .with_context(|| format!("migrating {}", args.path.display()))?;

    report(&summary, mode);
    Ok(())
}

fn resolver(project: Option<PathBuf>) -> Result<Resolver> {
    let root = match project {
        Some(root) => root,
        None => {
            let cwd = env::current_dir().context("reading the current directory")?;
            find_project_root(&cwd).unwrap_or(cwd)
        }
    };
    Resolver::for_project(&root).with_context(|| format!("opening project {}", root.display()))
}

fn switch(resolver: &Resolver, id: &str, version: VersionLabel) -> Result<()> {
    match resolver.switch(id, version) {
        Ok(Some(previous)) => println!("{id}: {previous} -> {version}"),
        Ok(None) => println!("{id}: pinned to {version}"),
        Err(ResolveError::Store(StoreError::NotFound { .. })) => {
            let available = PromptId::new(id)
                .ok()
                .map(|id| resolver.store().list_versions(&id))
                .transpose()?
                .unwrap_or_default();
            let listed = if available.is_empty() {
                "(none)".to_owned()
            } else {
                available
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            bail!("{id} has no version {version}; available: {listed}");
        }
        Err(error) => {
            return Err(error).with_context(|| format!("pinning {id} to {version}"));
        }
    }
    Ok(())
}

fn status(resolver: &Resolver) -> Result<()> {
    let pins = resolver
        .status()
        .with_context(|| format!("reading {}", resolver.lockfile_path().display()))?;
    if pins.is_empty() {
        println!("lockfile is empty; every prompt uses its inline template");
        return Ok(());
    }

    let width = pins
        .iter()
        .map(|pin| pin.id().as_str().len())
        .max()
        .unwrap_or(0)
        .max("PROMPT ID".len());
    println!("{:<width$}  VERSION  FILE", "PROMPT ID");
    for pin in &pins {
        let file = if pin.is_available() { "ok" } else { "missing" };
        println!("{:<width$}  {:<7}  {file}", pin.id().as_str(), pin.version().to_string());
    }
    let missing = pins.iter().filter(|pin| !pin.is_available()).count();
    if missing > 0 {
        warn!(missing, "lockfile pins versions missing from the store");
    }
    Ok(())
}

fn ask(input: &mut impl BufRead, candidate: &PlannedCandidate) -> io::Result<Decision> {
    let mut stdout = io::stdout().lock();
    writeln!(
        stdout,
        "\n{}:{}  id: {}",
        candidate.file().display(),
        candidate.line(),
        candidate.id()
    )?;
    writeln!(stdout, "  - {}", candidate.original())?;
    writeln!(stdout, "  + {}", candidate.replacement())?;
    for placeholder in candidate.placeholders() {
        writeln!(
            stdout,
            "    {} <- {}",
            placeholder.name(),
            placeholder.expression()
        )?;
    }

    loop {
        write!(stdout, "Extract? [y]es / [n]o / [q]uit: ")?;
        stdout.flush()?;
        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(Decision::Quit);
        }
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(Decision::Accept),
            "n" | "no" | "" => return Ok(Decision::Reject),
            "q" | "quit" => return Ok(Decision::Quit),
            _ => {}
        }
    }
}

fn report(summary: &MigrationSummary, mode: ReviewMode) {
    if mode == ReviewMode::DryRun {
        for candidate in &summary.reports {
            println!(
                "{}:{}  {}\n  - {}\n  + {}",
                candidate.file.display(),
                candidate.line,
                candidate.id,
                candidate.original,
                candidate.replacement
            );
        }
    }
    for candidate in &summary.reports {
        if let CandidateStatus::Failed { reason } = &candidate.status {
            println!("failed {} ({}:{}): {reason}", candidate.id, candidate.file.display(), candidate.line);
        }
    }
    for failure in &summary.file_errors {
        println!("skipped {}: {}", failure.path.display(), failure.error);
    }

    println!("\n=== Migration summary ===");
    println!("files scanned:  {}", summary.files_scanned);
    println!("files modified: {}", summary.files_modified);
    println!("accepted:       {}", summary.accepted);
    println!("rejected:       {}", summary.rejected);
    println!("proposed:       {}", summary.proposed);
    println!("skipped:        {}", summary.skipped + summary.unsupported);
    println!("failed:         {}", summary.failed);
    if summary.quit {
        println!("stopped early at reviewer request");
    }
}
