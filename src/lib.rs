//! Keeps an agent's identity, soul and memory files in git.
//!
//! The `spirit` binary is a thin clap front end over this library. The
//! `cmd_*` functions print for a terminal; [`run`] exposes the same
//! checkpoint, sync, backup and restore flows as plain functions returning
//! reports, for callers that bring their own [`Vcs`] and [`Progress`].

mod autobackup;
mod backup;
mod checkpoint;
mod config;
mod context;
mod error;
mod git;
mod init;
mod lock;
mod manifest;
mod migrate;
mod mirror;
mod paths;
mod progress;
mod resolve;
mod restore;
mod status;
mod sync;

pub use autobackup::{AutoBackupArgs, cmd_autobackup, has_changes};
pub use backup::{BackupReport, cmd_backup};
pub use checkpoint::{CheckpointRecord, CheckpointReport, cmd_checkpoint};
pub use config::{AutoBackupPolicy, Identity, SpiritConfig};
pub use context::Context;
pub use error::{Result, SpiritError};
pub use git::{CommitOutcome, DEFAULT_GIT_TIMEOUT, GitCli, PullOutcome, RepoInit, Vcs};
pub use init::{InitArgs, cmd_init};
pub use lock::DirLock;
pub use manifest::{DEFAULT_TRACKED, TrackedManifest};
pub use migrate::{Location, cmd_migrate, parse_location};
pub use mirror::{MirrorReport, Snapshot, mirror, reconcile};
pub use paths::{SOURCE_DIR_ENV, StateDir, spirit_home};
pub use progress::{Progress, Quiet, Stage};
pub use resolve::{ResolvedFileSet, resolve};
pub use restore::cmd_restore;
pub use status::{SpiritStatus, cmd_status};
pub use sync::{SyncReport, cmd_sync};

/// Library-level orchestrators, for embedding without the CLI layer.
pub mod run {
    pub use crate::backup::run as backup;
    pub use crate::checkpoint::create as checkpoint;
    pub use crate::restore::run as restore;
    pub use crate::sync::run as sync;
}
