//! Error taxonomy for checkpoint and sync runs.
//!
//! Every failure an orchestrator can hit maps onto one variant here. A commit
//! with nothing to record is *not* an error; see [`crate::git::CommitOutcome`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpiritError {
    /// The config directory does not exist yet.
    #[error("spirit not initialized at {}. Run: spirit init", .0.display())]
    NotInitialized(PathBuf),

    /// None of the tracked patterns matched an existing file.
    #[error("no files to checkpoint")]
    NoFiles,

    /// `origin` is not configured for the state repository.
    #[error("no remote configured. Set up with: git remote add origin <url>")]
    NoRemote,

    #[error("git init failed: {0}")]
    RepoInit(String),

    #[error("git add failed: {0}")]
    Stage(String),

    #[error("git commit failed: {0}")]
    Commit(String),

    #[error("git fetch failed: {0}")]
    Fetch(String),

    /// Rebase-pull failed for a reason other than a missing remote ref.
    /// Needs manual resolution in the state repository.
    #[error("sync failed (possible conflict): {0}")]
    PullConflict(String),

    #[error("git push failed: {0}")]
    Push(String),

    /// A git invocation ran past its deadline and was killed.
    #[error("`git {command}` timed out after {}s", .after.as_secs())]
    Timeout { command: String, after: Duration },

    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    /// Another run holds the lock on the config directory.
    #[error("another spirit run is using {}", .0.display())]
    Busy(PathBuf),

    #[error("invalid config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("identity missing name")]
    InvalidIdentity,

    #[error("{0} locations are not supported yet")]
    UnsupportedLocation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = SpiritError> = std::result::Result<T, E>;
