//! Git integration layer.
//!
//! Orchestrators only see the [`Vcs`] trait. The production implementation
//! ([`GitCli`]) shells out to the `git` executable; read-only inspection for
//! `spirit status` goes through `git2` ([`inspect`]). Tests substitute an
//! in-memory backend.
//!
//! Pull tries [`PRIMARY_BRANCH`] first and falls back to
//! [`SECONDARY_BRANCH`]. Push goes to whichever branch the pull rebased
//! onto, so a remote that only has `master` keeps receiving work there.
//! Only an empty remote makes push guess, in the same order.

mod cli_backend;
#[cfg(test)]
pub(crate) mod fake;
mod git2_backend;
mod phrases;
mod process;

use std::path::Path;

use crate::error::Result;

pub use cli_backend::{Author, DEFAULT_GIT_TIMEOUT, GitCli};
pub use git2_backend::{RepoSnapshot, inspect};

pub const REMOTE: &str = "origin";
pub const PRIMARY_BRANCH: &str = "main";
pub const SECONDARY_BRANCH: &str = "master";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoInit {
    Created,
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { short_hash: String },
    /// The staged tree equals HEAD. A normal outcome, not a failure.
    NothingToCommit,
}

impl CommitOutcome {
    pub fn short_hash(&self) -> Option<&str> {
        match self {
            CommitOutcome::Committed { short_hash } => Some(short_hash),
            CommitOutcome::NothingToCommit => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, CommitOutcome::NothingToCommit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Rebased { branch: String },
    /// Neither branch exists on the remote yet (first push).
    NoRemoteHistory,
}

/// Version-control capabilities used by the checkpoint and sync runs.
///
/// Every call blocks until the backend finishes or its timeout fires.
pub trait Vcs {
    /// Initialize a repository in `dir` unless one exists.
    fn ensure_repo(&self, dir: &Path) -> Result<RepoInit>;

    /// URL of `origin`; `None` when no remote is configured.
    fn remote_url(&self, dir: &Path) -> Result<Option<String>>;

    fn stage(&self, dir: &Path, paths: &[String]) -> Result<()>;

    fn stage_all(&self, dir: &Path) -> Result<()>;

    fn commit(&self, dir: &Path, message: &str) -> Result<CommitOutcome>;

    /// Best effort: an empty remote is not an error.
    fn fetch(&self, dir: &Path) -> Result<()>;

    /// Rebase onto the remote branch. Fails with
    /// [`crate::SpiritError::PullConflict`] for anything but missing refs,
    /// and when the rebase leaves unmerged paths behind.
    fn pull(&self, dir: &Path) -> Result<PullOutcome>;

    /// Push `HEAD` to `branch`, or when `None` (empty remote) to the first
    /// of [`PRIMARY_BRANCH`] and [`SECONDARY_BRANCH`] that works. Returns
    /// the branch that was pushed.
    fn push(&self, dir: &Path, branch: Option<&str>) -> Result<String>;
}
