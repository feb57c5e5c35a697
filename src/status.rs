use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{AutoBackupPolicy, SpiritConfig};
use crate::context::Context;
use crate::git::inspect;
use crate::manifest::TrackedManifest;
use crate::paths::StateDir;
use crate::resolve::resolve;

/// Snapshot printed by `spirit status`.
#[derive(Debug, Clone, Serialize)]
pub struct SpiritStatus {
    pub initialized: bool,
    pub config_dir: PathBuf,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    pub tracked_files: usize,
    pub existing_files: usize,
    pub missing_files: Vec<String>,
    pub git_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    pub commits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    pub autobackup: AutoBackupPolicy,
}

/// Gather status for `state` without invoking the `git` executable.
pub fn collect(state: &StateDir) -> Result<SpiritStatus> {
    let mut status = SpiritStatus {
        initialized: state.is_initialized(),
        config_dir: state.root().to_path_buf(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        agent: None,
        workspace: state.workspace().map(|p| p.to_path_buf()),
        tracked_files: 0,
        existing_files: 0,
        missing_files: Vec::new(),
        git_configured: false,
        branch: None,
        head: None,
        commits: 0,
        last_commit: None,
        remote_url: None,
        autobackup: AutoBackupPolicy::default(),
    };
    if !status.initialized {
        return Ok(status);
    }

    if let Ok(cfg) = SpiritConfig::load(&state.paths.config) {
        status.agent = Some(format!("{} {}", cfg.identity.emoji, cfg.identity.name));
    }

    let manifest = TrackedManifest::load_or_default(&state.paths.manifest);
    let files = resolve(state.files_dir(), &manifest.files);
    status.tracked_files = manifest.files.len();
    status.existing_files = files.present.len();
    status.missing_files = files.missing;

    if let Some(snap) = inspect(state.root()).context("inspect state repository")? {
        status.git_configured = true;
        status.branch = snap.branch;
        status.head = snap.head_short;
        status.commits = snap.commit_count;
        status.last_commit = snap.last_commit;
        status.remote_url = snap.remote_url;
    }

    status.autobackup = AutoBackupPolicy::load_or_default(&state.paths.autobackup);
    Ok(status)
}

/// Coarse age: `42s`, `5m`, `3h`, `2d`.
pub fn format_duration(d: Duration) -> String {
    let s = d.as_secs();
    match s {
        0..60 => format!("{}s", s),
        60..3600 => format!("{}m", s / 60),
        3600..86400 => format!("{}h", s / 3600),
        _ => format!("{}d", s / 86400),
    }
}

fn ago(t: DateTime<Utc>) -> String {
    let d = (Utc::now() - t).to_std().unwrap_or_default();
    format!("{} ago", format_duration(d))
}

/// `spirit status [--json]`
pub fn cmd_status(ctx: &Context, json: bool) -> Result<()> {
    let st = collect(&ctx.state)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&st)?);
        return Ok(());
    }

    println!("SPIRIT Status\n");
    if !st.initialized {
        println!("   Status:     {}", "Not initialized".yellow());
        println!("   Config dir: {}", st.config_dir.display());
        println!("\n   Run 'spirit init' to get started");
        return Ok(());
    }

    println!("   Version:    {}", st.version);
    println!("   Config:     {}", st.config_dir.display());
    if let Some(a) = &st.agent {
        println!("   Agent:      {}", a);
    }
    if let Some(ws) = &st.workspace {
        println!("   Workspace:  {}", ws.display());
    }
    match st.last_commit {
        Some(t) => println!(
            "   Last sync:  {} ({})",
            ago(t),
            st.head.as_deref().unwrap_or("-")
        ),
        None => println!("   Last sync:  Never"),
    }

    println!();
    println!("   Tracked files:  {} patterns", st.tracked_files);
    println!("   Existing files: {} matched", st.existing_files);
    if !st.missing_files.is_empty() {
        println!("   Missing files:  {}", st.missing_files.join(", ").dimmed());
    }

    println!();
    if st.git_configured {
        println!(
            "   Git: {} Configured ({} commits on {})",
            "✓".green(),
            st.commits,
            st.branch.as_deref().unwrap_or("detached HEAD")
        );
        match &st.remote_url {
            Some(url) => println!("   Remote: {}", url),
            None => {
                println!("   Remote: {} Not configured", "✗".red());
                println!("           Run: git remote add origin <url>");
            }
        }
    } else {
        println!("   Git: {} Not initialized", "✗".red());
    }

    let ab = &st.autobackup;
    if ab.enabled {
        let last = ab.last_backup.map(ago).unwrap_or_else(|| "never".into());
        println!(
            "   Auto-backup: every {}s, last {}",
            ab.interval().as_secs(),
            last
        );
    } else {
        println!("   Auto-backup: off");
    }

    println!();
    println!("   Commands:");
    println!("     spirit sync    - Push state to remote");
    println!("     spirit backup  - Create checkpoint + sync");
    Ok(())
}
