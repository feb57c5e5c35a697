use anyhow::Context as _;
use chrono::{Local, Utc};
use tracing::{info, warn};

use crate::checkpoint::{self, CheckpointReport};
use crate::config::AutoBackupPolicy;
use crate::context::Context;
use crate::error::{Result, SpiritError};
use crate::git::Vcs;
use crate::manifest::TrackedManifest;
use crate::lock::DirLock;
use crate::mirror::{MirrorReport, mirror};
use crate::paths::StateDir;
use crate::progress::{Progress, Spinner, Stage};
use crate::resolve::resolve;
use crate::sync::{self, SyncReport};

#[derive(Debug)]
pub struct BackupReport {
    pub message: String,
    /// Workspace files copied in before the checkpoint (workspace mode).
    pub mirror: Option<MirrorReport>,
    pub checkpoint: CheckpointReport,
    /// `None` when no remote is configured.
    pub sync: Option<SyncReport>,
}

pub fn default_message() -> String {
    format!("Backup at {}", Local::now().format("%Y-%m-%d %H:%M"))
}

/// Checkpoint, then sync when `origin` exists, then record the backup time.
///
/// In workspace mode the tracked files are mirrored first so the local
/// checkpoint captures the live workspace. The config directory stays
/// locked from the mirror through the push.
pub fn run(
    state: &StateDir,
    vcs: &dyn Vcs,
    message: Option<&str>,
    progress: &dyn Progress,
) -> Result<BackupReport> {
    if !state.is_initialized() {
        return Err(SpiritError::NotInitialized(state.root().to_path_buf()));
    }
    let message = message
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(default_message);

    let _lock = DirLock::acquire(&state.paths.lock, state.lock_wait)?;
    let mirrored = state.workspace().map(|ws| {
        progress.stage(Stage::Mirror);
        let manifest = TrackedManifest::load_or_default(&state.paths.manifest);
        let files = resolve(ws, &manifest.files);
        mirror(ws, state.root(), &files.present)
    });

    let checkpoint = checkpoint::create_locked(state, vcs, &message, false, progress)?;

    let sync = match vcs.remote_url(state.root())? {
        Some(_) => Some(sync::run_locked(state, vcs, progress)?),
        None => {
            warn!("no remote configured, backup kept local");
            None
        }
    };

    AutoBackupPolicy::record_backup(&state.paths.autobackup, Utc::now())?;
    info!(message = %message, "backup complete");
    Ok(BackupReport {
        message,
        mirror: mirrored,
        checkpoint,
        sync,
    })
}

/// `spirit backup [-m message]`
pub fn cmd_backup(ctx: &Context, message: Option<&str>) -> anyhow::Result<()> {
    let spinner = Spinner::start("backing up", ctx.verbose);
    let report = match run(&ctx.state, &ctx.git, message, &spinner) {
        Ok(r) => r,
        Err(e) => {
            spinner.finish_err("backup failed");
            return Err(e).context("backup");
        }
    };
    spinner.finish_ok(format!("backup: {}", report.message));

    if let Some(m) = &report.mirror {
        println!("Mirrored {} files from workspace", m.copied.len());
        for (f, e) in &m.failed {
            println!("   ! {} ({})", f, e);
        }
    }
    match report.checkpoint.record.short_hash.as_deref() {
        Some(h) => println!("Checkpoint {} ({} files)", h, report.checkpoint.record.file_count),
        None => println!("Checkpoint unchanged"),
    }
    match &report.sync {
        Some(s) => println!("Synced to {} ({})", s.remote_url, s.pushed_branch),
        None => println!("No remote configured; backup is local only"),
    }
    println!("Backup complete!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fake::FakeVcs;
    use crate::progress::Quiet;
    use std::fs;
    use tempfile::tempdir;

    fn state() -> (tempfile::TempDir, StateDir) {
        let td = tempdir().unwrap();
        TrackedManifest::new(["IDENTITY.md"])
            .save(&td.path().join(".spirit-tracked"))
            .unwrap();
        fs::write(td.path().join("IDENTITY.md"), "id").unwrap();
        let state = StateDir::new(td.path());
        (td, state)
    }

    #[test]
    fn local_only_without_remote() {
        let (_td, state) = state();
        let vcs = FakeVcs::default();

        let report = run(&state, &vcs, Some("nightly"), &Quiet).unwrap();
        assert!(report.sync.is_none());
        assert!(vcs.commit_messages()[0].ends_with("] nightly"));
        assert!(!vcs.calls().iter().any(|c| c == "push"));

        let policy = AutoBackupPolicy::load_or_default(&state.paths.autobackup);
        assert!(policy.last_backup.is_some());
    }

    #[test]
    fn syncs_when_remote_configured() {
        let (_td, state) = state();
        let vcs = FakeVcs::with_remote("/srv/state.git");

        let report = run(&state, &vcs, None, &Quiet).unwrap();
        assert!(report.message.starts_with("Backup at "));
        let sync = report.sync.unwrap();
        assert_eq!(sync.pushed_branch, "main");
        // The sync commit finds the checkpoint already holds everything.
        assert!(sync.commit.is_noop());
    }

    #[test]
    fn blank_message_uses_default() {
        let (_td, state) = state();
        let vcs = FakeVcs::default();
        let report = run(&state, &vcs, Some("  "), &Quiet).unwrap();
        assert!(report.message.starts_with("Backup at "));
    }

    fn workspace_state(td: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf, StateDir) {
        let root = td.join("config");
        let ws = td.join("ws");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&ws).unwrap();
        TrackedManifest::new(["IDENTITY.md", "SOUL.md"])
            .save(&root.join(".spirit-tracked"))
            .unwrap();
        let state = StateDir::new(&root).with_source(Some(ws.clone()));
        (root, ws, state)
    }

    #[test]
    fn workspace_mirror_is_reported() {
        let td = tempdir().unwrap();
        let (root, ws, state) = workspace_state(td.path());
        fs::write(ws.join("IDENTITY.md"), "live").unwrap();

        let report = run(&state, &FakeVcs::default(), None, &Quiet).unwrap();
        let mirrored = report.mirror.unwrap();
        assert_eq!(mirrored.copied, vec!["IDENTITY.md"]);
        assert!(mirrored.is_clean());
        assert_eq!(fs::read_to_string(root.join("IDENTITY.md")).unwrap(), "live");
    }

    #[test]
    fn busy_config_dir_is_left_untouched() {
        let td = tempdir().unwrap();
        let (root, ws, state) = workspace_state(td.path());
        let state = state.with_lock_wait(std::time::Duration::ZERO);
        fs::write(ws.join("IDENTITY.md"), "live").unwrap();
        let _held = DirLock::acquire(&state.paths.lock, std::time::Duration::ZERO).unwrap();

        let vcs = FakeVcs::default();
        let err = run(&state, &vcs, None, &Quiet).unwrap_err();
        assert!(matches!(err, SpiritError::Busy(_)));
        assert!(!root.join("IDENTITY.md").exists());
        assert!(vcs.calls().is_empty());
    }
}
