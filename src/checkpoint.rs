//! Local checkpoint: resolve tracked files in the config directory, stage
//! them and commit. Nothing leaves the machine.

use anyhow::Context as _;
use chrono::Local;
use tracing::{info, warn};

use crate::context::Context;
use crate::error::{Result, SpiritError};
use crate::git::{CommitOutcome, RepoInit, Vcs};
use crate::lock::DirLock;
use crate::manifest::TrackedManifest;
use crate::paths::StateDir;
use crate::progress::{Progress, Spinner, Stage};
use crate::resolve::resolve;

pub const DEFAULT_MESSAGE: &str = "Manual checkpoint";

/// What a checkpoint recorded. `short_hash` is `None` when nothing changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRecord {
    pub message: String,
    pub short_hash: Option<String>,
    pub file_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointReport {
    pub record: CheckpointRecord,
    pub outcome: CommitOutcome,
    /// Literal patterns that matched no file.
    pub missing: Vec<String>,
    pub repo_created: bool,
}

/// Commit the tracked files of `state` as `[HH:MM:SS] <message>`.
///
/// With `all`, every change in the config directory is staged instead of
/// only the resolved files.
///
/// # Errors
/// - [`SpiritError::NotInitialized`] if the config directory is missing.
/// - [`SpiritError::NoFiles`] if no tracked file exists; no commit is made.
/// - Any adapter failure, unchanged.
pub fn create(
    state: &StateDir,
    vcs: &dyn Vcs,
    message: &str,
    all: bool,
    progress: &dyn Progress,
) -> Result<CheckpointReport> {
    if !state.is_initialized() {
        return Err(SpiritError::NotInitialized(state.root().to_path_buf()));
    }
    let _lock = DirLock::acquire(&state.paths.lock, state.lock_wait)?;
    create_locked(state, vcs, message, all, progress)
}

/// [`create`] for a caller that already holds the config directory lock.
pub(crate) fn create_locked(
    state: &StateDir,
    vcs: &dyn Vcs,
    message: &str,
    all: bool,
    progress: &dyn Progress,
) -> Result<CheckpointReport> {
    let root = state.root();

    progress.stage(Stage::EnsureRepo);
    let repo_created = vcs.ensure_repo(root)? == RepoInit::Created;

    let manifest = TrackedManifest::load_or_default(&state.paths.manifest);
    let files = resolve(root, &manifest.files);
    if files.present.is_empty() {
        return Err(SpiritError::NoFiles);
    }
    for m in &files.missing {
        info!(file = %m, "tracked file not present");
    }

    progress.stage(Stage::Stage);
    if all {
        vcs.stage_all(root)?;
    } else {
        vcs.stage(root, &files.present)?;
    }

    progress.stage(Stage::Commit);
    let text = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
    let outcome = vcs.commit(root, &text)?;

    Ok(CheckpointReport {
        record: CheckpointRecord {
            message: message.to_string(),
            short_hash: outcome.short_hash().map(str::to_string),
            file_count: files.present.len(),
        },
        outcome,
        missing: files.missing,
        repo_created,
    })
}

/// `spirit checkpoint [message] [--all]`
pub fn cmd_checkpoint(ctx: &Context, message: Option<&str>, all: bool) -> anyhow::Result<()> {
    let message = message.unwrap_or(DEFAULT_MESSAGE);
    let spinner = Spinner::start("creating checkpoint", ctx.verbose);

    let report = match create(&ctx.state, &ctx.git, message, all, &spinner) {
        Ok(r) => r,
        Err(e) => {
            spinner.finish_err("checkpoint failed");
            return Err(e).context("checkpoint");
        }
    };

    if report.repo_created {
        println!("Initialized git repository in {}", ctx.state.root().display());
    }
    match &report.record.short_hash {
        Some(hash) => {
            spinner.finish_ok(format!("checkpoint {}", hash));
            println!("Checkpoint created: {}", hash);
            println!("   Message: {}", report.record.message);
            println!("   Files: {} tracked", report.record.file_count);
        }
        None => {
            spinner.finish_ok("already up to date");
            println!("Already up to date (no changes)");
        }
    }

    match ctx.git.remote_url(ctx.state.root()) {
        Ok(Some(_)) => println!("\n   Tip: Run 'spirit sync' to push to remote"),
        Ok(None) => println!("\n   Tip: Set up remote with: git remote add origin <url>"),
        Err(e) => warn!("could not query remote: {}", e),
    }
    Ok(())
}
