mod watch;

use anyhow::{Context as _, anyhow};
use chrono::{DateTime, Utc};
use crossbeam_channel::bounded;
use std::fs;
use tracing::{debug, error, info};

use crate::backup;
use crate::config::{AutoBackupPolicy, parse_interval};
use crate::context::Context;
use crate::manifest::TrackedManifest;
use crate::paths::StateDir;
use crate::progress::Quiet;
use crate::resolve::resolve;

pub use watch::{DEBOUNCE, Trigger, is_relevant, run_loop, watch_dir};

pub const AUTO_MESSAGE: &str = "Auto-backup on change";

#[derive(Debug, Clone, Default)]
pub struct AutoBackupArgs {
    pub interval: Option<String>,
    pub on_session_end: bool,
    pub watch: bool,
    pub disable: bool,
}

/// Whether any tracked file was modified after `since`.
///
/// With no previous backup everything counts as changed.
pub fn has_changes(state: &StateDir, since: Option<DateTime<Utc>>) -> bool {
    let Some(since) = since else {
        return true;
    };
    let manifest = TrackedManifest::load_or_default(&state.paths.manifest);
    let base = state.files_dir();
    resolve(base, &manifest.files).present.iter().any(|rel| {
        fs::metadata(base.join(rel))
            .and_then(|m| m.modified())
            .map(|t| DateTime::<Utc>::from(t) > since)
            .unwrap_or(false)
    })
}

/// `spirit autobackup [--interval] [--on-session-end] [--watch] [--disable]`
pub fn cmd_autobackup(ctx: &Context, args: &AutoBackupArgs) -> anyhow::Result<()> {
    let path = &ctx.state.paths.autobackup;
    if !ctx.state.is_initialized() {
        return Err(crate::SpiritError::NotInitialized(ctx.state.root().to_path_buf()).into());
    }

    if args.disable {
        AutoBackupPolicy::default()
            .save(path)
            .context("failed to save config")?;
        println!("Auto-backup disabled");
        return Ok(());
    }

    if let Some(i) = &args.interval {
        parse_interval(i).map_err(|e| anyhow!("invalid interval {:?}: {}", i, e))?;
    }

    let policy = AutoBackupPolicy {
        enabled: true,
        interval: args.interval.clone(),
        on_session_end: args.on_session_end,
        watch: args.watch,
        last_backup: AutoBackupPolicy::load_or_default(path).last_backup,
    };
    policy.save(path).context("failed to save config")?;

    if let Some(i) = &policy.interval {
        println!("Backing up every {}", i);
    }
    if policy.on_session_end {
        println!("Backing up on session end");
    }
    println!("Auto-backup configured!");

    if policy.watch {
        watch_foreground(ctx, &policy)?;
    }
    Ok(())
}

fn watch_foreground(ctx: &Context, policy: &AutoBackupPolicy) -> anyhow::Result<()> {
    let state = &ctx.state;
    let (_watcher, events) = watch_dir(state.files_dir())
        .with_context(|| format!("watch {}", state.files_dir().display()))?;

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("install Ctrl-C handler")?;

    let interval = policy.interval();
    println!(
        "Watching {} (every {}s, Ctrl-C to stop)",
        state.files_dir().display(),
        interval.as_secs()
    );

    let handled = run_loop(interval, DEBOUNCE, events, stop_rx, |trigger| {
        if trigger == Trigger::Tick {
            let last = AutoBackupPolicy::load_or_default(&state.paths.autobackup).last_backup;
            if !has_changes(state, last) {
                debug!("no changes since last backup");
                return;
            }
        }
        match backup::run(state, &ctx.git, Some(AUTO_MESSAGE), &Quiet) {
            Ok(r) => {
                info!(?trigger, "auto-backup complete");
                println!(
                    "Auto-backup: {}",
                    r.checkpoint.record.short_hash.as_deref().unwrap_or("no changes")
                );
            }
            Err(e) => error!("auto-backup failed: {}", e),
        }
    });

    println!("Watcher stopped after {} trigger(s)", handled);
    Ok(())
}
