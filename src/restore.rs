use anyhow::Context as _;
use tracing::{info, warn};

use crate::context::Context;
use crate::error::{Result, SpiritError};
use crate::git::{PullOutcome, Vcs};
use crate::lock::DirLock;
use crate::manifest::TrackedManifest;
use crate::mirror::{MirrorReport, mirror};
use crate::paths::StateDir;
use crate::progress::{Progress, Spinner, Stage};
use crate::resolve::resolve;

#[derive(Debug)]
pub struct RestoreReport {
    /// `None` when pulling was skipped or no remote is configured.
    pub pull: Option<PullOutcome>,
    /// Files copied back into the workspace (workspace mode only).
    pub mirror: Option<MirrorReport>,
}

/// Bring the config directory up to date with `origin` and, in workspace
/// mode, copy the tracked files back into the workspace.
pub fn run(
    state: &StateDir,
    vcs: &dyn Vcs,
    pull: bool,
    progress: &dyn Progress,
) -> Result<RestoreReport> {
    if !state.is_initialized() {
        return Err(SpiritError::NotInitialized(state.root().to_path_buf()));
    }
    let _lock = DirLock::acquire(&state.paths.lock, state.lock_wait)?;
    let root = state.root();

    let mut pulled = None;
    if pull {
        progress.stage(Stage::EnsureRepo);
        vcs.ensure_repo(root)?;
        progress.stage(Stage::CheckRemote);
        match vcs.remote_url(root)? {
            Some(url) => {
                progress.stage(Stage::Fetch);
                vcs.fetch(root)?;
                progress.stage(Stage::Pull);
                pulled = Some(vcs.pull(root)?);
                info!(remote = %url, "pulled latest state");
            }
            None => warn!("no remote configured, restoring from local state"),
        }
    }

    let mirrored = state.workspace().map(|ws| {
        progress.stage(Stage::Mirror);
        let manifest = TrackedManifest::load_or_default(&state.paths.manifest);
        let files = resolve(root, &manifest.files);
        mirror(root, ws, &files.present)
    });

    Ok(RestoreReport {
        pull: pulled,
        mirror: mirrored,
    })
}

/// `spirit restore [--no-pull]`
pub fn cmd_restore(ctx: &Context, no_pull: bool) -> anyhow::Result<()> {
    let spinner = Spinner::start("restoring", ctx.verbose);
    let report = match run(&ctx.state, &ctx.git, !no_pull, &spinner) {
        Ok(r) => r,
        Err(e) => {
            spinner.finish_err("restore failed");
            return Err(e).context("restore");
        }
    };
    spinner.finish_ok("restore complete");

    match &report.pull {
        Some(PullOutcome::Rebased { branch }) => println!("Pulled latest state from {}", branch),
        Some(PullOutcome::NoRemoteHistory) => println!("Remote has no history yet"),
        None => {}
    }
    if let Some(m) = &report.mirror {
        println!("Restored {} files to workspace", m.copied.len());
        for (f, e) in &m.failed {
            println!("   ! {} ({})", f, e);
        }
    }
    println!("Restore complete");
    Ok(())
}
