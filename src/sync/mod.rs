use anyhow::Context as _;
use chrono::Local;
use std::path::Path;
use tracing::{info, warn};

use crate::context::Context;
use crate::error::{Result, SpiritError};
use crate::git::{CommitOutcome, PullOutcome, RepoInit, Vcs};
use crate::lock::DirLock;
use crate::manifest::TrackedManifest;
use crate::mirror::{MirrorReport, Snapshot, reconcile};
use crate::paths::StateDir;
use crate::progress::{Progress, Spinner, Stage};
use crate::resolve::resolve;

/// Result of a completed sync.
#[derive(Debug)]
pub struct SyncReport {
    pub remote_url: String,
    /// Files staged and committed, relative to the config directory.
    pub files: Vec<String>,
    pub missing: Vec<String>,
    /// Present only in workspace mode.
    pub mirror: Option<MirrorReport>,
    pub pull: PullOutcome,
    pub commit: CommitOutcome,
    pub pushed_branch: String,
    pub repo_created: bool,
}

/// Reconcile the tracked files of `state` with `origin`.
///
/// High-level flow:
/// 1. Lock the config directory and make sure it holds a repository.
/// 2. Require an `origin` remote before touching any file.
/// 3. Resolve tracked patterns against the workspace (or the config dir).
/// 4. Fetch, then rebase onto the remote branch (`main`, else `master`).
/// 5. In workspace mode, mirror the workspace into the rebased config dir,
///    comparing both sides against their pre-pull contents.
/// 6. Stage, commit `SPIRIT checkpoint: <time> (N files)` and push to the
///    branch the rebase used.
///
/// A commit with nothing new still pushes, so an earlier local checkpoint
/// reaches the remote.
///
/// # Errors
/// - [`SpiritError::NotInitialized`], [`SpiritError::NoRemote`] and
///   [`SpiritError::NoFiles`] before any git history is touched.
/// - [`SpiritError::PullConflict`] when the rebase needs manual resolution
///   or a workspace file changed on both sides; nothing is committed or
///   pushed.
pub fn run(state: &StateDir, vcs: &dyn Vcs, progress: &dyn Progress) -> Result<SyncReport> {
    if !state.is_initialized() {
        return Err(SpiritError::NotInitialized(state.root().to_path_buf()));
    }
    let _lock = DirLock::acquire(&state.paths.lock, state.lock_wait)?;
    run_locked(state, vcs, progress)
}

/// [`run`] for a caller that already holds the config directory lock.
pub(crate) fn run_locked(
    state: &StateDir,
    vcs: &dyn Vcs,
    progress: &dyn Progress,
) -> Result<SyncReport> {
    let root = state.root();

    progress.stage(Stage::EnsureRepo);
    let repo_created = vcs.ensure_repo(root)? == RepoInit::Created;

    progress.stage(Stage::CheckRemote);
    let remote_url = vcs.remote_url(root)?.ok_or(SpiritError::NoRemote)?;

    let manifest = TrackedManifest::load_or_default(&state.paths.manifest);
    let resolved = resolve(state.files_dir(), &manifest.files);
    if resolved.present.is_empty() {
        return Err(SpiritError::NoFiles);
    }

    progress.stage(Stage::Fetch);
    vcs.fetch(root)?;

    let before = state
        .workspace()
        .map(|_| Snapshot::take(root, &resolved.present));

    progress.stage(Stage::Pull);
    let pull = vcs.pull(root)?;

    let mirrored = match (state.workspace(), &before) {
        (Some(ws), Some(base)) => {
            progress.stage(Stage::Mirror);
            Some(reconcile(ws, root, &resolved.present, base))
        }
        _ => None,
    };
    if let Some(report) = &mirrored {
        if !report.conflicts.is_empty() {
            return Err(SpiritError::PullConflict(format!(
                "{} changed in both the workspace and the remote; \
                 the config directory holds the remote copy, \
                 sync again once the workspace has the version to keep",
                report.conflicts.join(", ")
            )));
        }
        if !report.is_clean() {
            warn!(
                failed = report.failed.len(),
                "some workspace files could not be mirrored"
            );
        }
    }

    let files = stageable(root, resolved.present);
    if files.is_empty() {
        return Err(SpiritError::NoFiles);
    }

    progress.stage(Stage::Stage);
    vcs.stage(root, &files)?;

    progress.stage(Stage::Commit);
    let message = format!(
        "SPIRIT checkpoint: {} ({} files)",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        files.len()
    );
    let commit = vcs.commit(root, &message)?;

    progress.stage(Stage::Push);
    let target = match &pull {
        PullOutcome::Rebased { branch } => Some(branch.as_str()),
        PullOutcome::NoRemoteHistory => None,
    };
    let pushed_branch = vcs.push(root, target)?;
    info!(branch = %pushed_branch, files = files.len(), "sync complete");

    Ok(SyncReport {
        remote_url,
        files,
        missing: resolved.missing,
        mirror: mirrored,
        pull,
        commit,
        pushed_branch,
        repo_created,
    })
}

/// Keep only paths that exist as files in the config directory. A file whose
/// mirror failed is still staged if an earlier copy is there.
fn stageable(root: &Path, present: Vec<String>) -> Vec<String> {
    present
        .into_iter()
        .filter(|rel| root.join(rel).is_file())
        .collect()
}

/// `spirit sync [--verbose]`
pub fn cmd_sync(ctx: &Context, verbose: bool) -> anyhow::Result<()> {
    let verbose = verbose || ctx.verbose;
    let spinner = Spinner::start("syncing", verbose);

    let report = match run(&ctx.state, &ctx.git, &spinner) {
        Ok(r) => r,
        Err(e) => {
            spinner.finish_err("sync failed");
            if matches!(e, SpiritError::NoRemote) {
                println!("No remote configured.");
                println!("   Set up with: git remote add origin <url>");
            }
            return Err(e).context("sync");
        }
    };

    let summary = match &report.commit {
        CommitOutcome::Committed { short_hash } => format!("synced {}", short_hash),
        CommitOutcome::NothingToCommit => "already up to date".to_string(),
    };
    spinner.finish_ok(summary);

    if report.repo_created {
        println!("Initialized git repository in {}", ctx.state.root().display());
    }
    if verbose {
        println!("Found {} files to sync:", report.files.len());
        for f in &report.files {
            println!("   ✓ {}", f);
        }
        if !report.missing.is_empty() {
            println!("   Skipped {} missing files", report.missing.len());
            for f in &report.missing {
                println!("     - {} (not found)", f);
            }
        }
        if let Some(m) = &report.mirror {
            println!("   Mirrored {} files from workspace", m.copied.len());
            for f in &m.pulled {
                println!("   ↓ {} (updated from remote)", f);
            }
            for (f, e) in &m.failed {
                println!("     ! {} ({})", f, e);
            }
        }
        if report.pull == PullOutcome::NoRemoteHistory {
            println!("   Remote was empty, established {}", report.pushed_branch);
        }
    }
    if report.commit.is_noop() {
        println!("Already up to date");
    }
    println!("Sync complete!");
    println!("   Remote: {}", report.remote_url);
    println!("   Branch: {}", report.pushed_branch);
    println!("   Files: {}", report.files.len());
    Ok(())
}
