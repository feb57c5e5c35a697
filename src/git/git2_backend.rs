use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use git2::{Repository, Sort};
use std::path::Path;

use super::REMOTE;

/// Read-only view of a state repository, as shown by `spirit status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoSnapshot {
    /// Current branch; `None` for a detached HEAD.
    pub branch: Option<String>,
    /// Abbreviated id of HEAD; `None` before the first commit.
    pub head_short: Option<String>,
    pub last_commit: Option<DateTime<Utc>>,
    pub commit_count: usize,
    pub remote_url: Option<String>,
}

/// Inspect the repository in `dir` without invoking the `git` executable.
///
/// Returns `Ok(None)` when `dir` holds no repository. An unborn HEAD (no
/// commits yet) yields a snapshot with empty commit fields.
///
/// # Errors
/// Returns an error if the repository exists but cannot be opened or its
/// history cannot be walked.
pub fn inspect(dir: &Path) -> Result<Option<RepoSnapshot>> {
    if !dir.join(".git").exists() {
        return Ok(None);
    }
    let repo =
        Repository::open(dir).with_context(|| format!("open repository {}", dir.display()))?;

    let mut snap = RepoSnapshot {
        remote_url: repo
            .find_remote(REMOTE)
            .ok()
            .and_then(|r| r.url().map(str::to_string)),
        ..Default::default()
    };

    let head = match repo.head() {
        Ok(h) => h,
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
            snap.branch = unborn_branch(&repo);
            return Ok(Some(snap));
        }
        Err(e) => return Err(e).context("read HEAD"),
    };

    if head.is_branch() {
        snap.branch = head.shorthand().map(str::to_string);
    }
    let commit = head.peel_to_commit().context("HEAD is not a commit")?;
    snap.head_short = commit
        .as_object()
        .short_id()
        .ok()
        .and_then(|b| b.as_str().map(str::to_string));
    snap.last_commit = Utc.timestamp_opt(commit.time().seconds(), 0).single();

    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL)?;
    walk.push(commit.id())?;
    snap.commit_count = walk.filter(|r| r.is_ok()).count();

    Ok(Some(snap))
}

/// Branch HEAD will point at once the first commit is made.
fn unborn_branch(repo: &Repository) -> Option<String> {
    let head = repo.find_reference("HEAD").ok()?;
    head.symbolic_target()
        .and_then(|t| t.strip_prefix("refs/heads/"))
        .map(str::to_string)
}
