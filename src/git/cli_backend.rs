use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::phrases;
use super::process::{GitOutput, run_git};
use super::{CommitOutcome, PRIMARY_BRANCH, PullOutcome, REMOTE, RepoInit, SECONDARY_BRANCH, Vcs};
use crate::error::{Result, SpiritError};
use crate::paths::LOCK_FILE;

pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Identity passed to every git invocation with `-c user.name=... -c user.email=...`,
/// so commits and rebases work without a global git identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// [`Vcs`] implementation that drives the `git` executable.
///
/// Every invocation is bounded by `timeout`; a git that outlives it is killed.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
    author: Option<Author>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(DEFAULT_GIT_TIMEOUT)
    }
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            author: None,
        }
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author = Some(Author {
            name: name.into(),
            email: email.into(),
        });
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn git<S: AsRef<OsStr>>(&self, dir: &Path, args: &[S]) -> Result<GitOutput> {
        let mut full: Vec<OsString> = Vec::with_capacity(args.len() + 4);
        if let Some(a) = &self.author {
            full.push("-c".into());
            full.push(format!("user.name={}", a.name).into());
            full.push("-c".into());
            full.push(format!("user.email={}", a.email).into());
        }
        full.extend(args.iter().map(|a| a.as_ref().to_os_string()));
        run_git(dir, &full, self.timeout)
    }

    fn short_head(&self, dir: &Path) -> Result<String> {
        let out = self.git(dir, &["rev-parse", "--short", "HEAD"])?;
        if !out.success {
            return Err(SpiritError::Commit(out.combined()));
        }
        Ok(out.stdout.trim().to_string())
    }

    /// Fallback classifier for a failed commit: `git diff --cached --quiet`
    /// exits 0 when nothing is staged.
    fn index_matches_head(&self, dir: &Path) -> Result<bool> {
        Ok(self.git(dir, &["diff", "--cached", "--quiet"])?.success)
    }

    fn pull_branch(&self, dir: &Path, branch: &str) -> Result<GitOutput> {
        self.git(dir, &["pull", "--rebase", "--autostash", REMOTE, branch])
    }

    fn push_branch(&self, dir: &Path, branch: &str) -> Result<GitOutput> {
        self.git(dir, &["push", REMOTE, branch])
    }

    /// A rebase can exit 0 and still leave conflicts behind when its
    /// autostash does not reapply. Those paths hold conflict markers and
    /// must never be staged.
    fn reject_unmerged(&self, dir: &Path, pull_output: &str) -> Result<()> {
        let out = self.git(dir, &["ls-files", "--unmerged"])?;
        let mut paths: Vec<&str> = out
            .stdout
            .lines()
            .filter_map(|l| l.split_once('\t').map(|(_, path)| path))
            .collect();
        paths.dedup();
        if paths.is_empty() && !phrases::autostash_conflict(pull_output) {
            return Ok(());
        }

        let mut text = pull_output.trim().to_string();
        if !paths.is_empty() {
            text.push_str(&format!("\nunmerged: {}", paths.join(", ")));
        }
        Err(SpiritError::PullConflict(text))
    }
}

impl Vcs for GitCli {
    fn ensure_repo(&self, dir: &Path) -> Result<RepoInit> {
        if dir.join(".git").exists() {
            exclude_lock_file(dir)?;
            return Ok(RepoInit::Existing);
        }

        let init = self.git(dir, &["init"]).map_err(|e| match e {
            SpiritError::Spawn(io) => SpiritError::RepoInit(format!("cannot invoke git: {}", io)),
            other => other,
        })?;
        if !init.success {
            return Err(SpiritError::RepoInit(init.combined()));
        }

        // New state repositories are born on the primary branch so pull and
        // push agree on it from the first sync.
        let head = format!("refs/heads/{}", PRIMARY_BRANCH);
        let out = self.git(dir, &["symbolic-ref", "HEAD", head.as_str()])?;
        if !out.success {
            return Err(SpiritError::RepoInit(out.combined()));
        }

        exclude_lock_file(dir)?;
        info!(dir = %dir.display(), "initialized state repository");
        Ok(RepoInit::Created)
    }

    fn remote_url(&self, dir: &Path) -> Result<Option<String>> {
        let out = self.git(dir, &["remote", "get-url", REMOTE])?;
        if !out.success {
            return Ok(None);
        }
        let url = out.stdout.trim();
        Ok((!url.is_empty()).then(|| url.to_string()))
    }

    fn stage(&self, dir: &Path, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<OsString> = vec!["add".into(), "--".into()];
        args.extend(paths.iter().map(OsString::from));
        let out = self.git(dir, &args)?;
        if !out.success {
            return Err(SpiritError::Stage(out.combined()));
        }
        Ok(())
    }

    fn stage_all(&self, dir: &Path) -> Result<()> {
        let out = self.git(dir, &["add", "-A"])?;
        if !out.success {
            return Err(SpiritError::Stage(out.combined()));
        }
        Ok(())
    }

    fn commit(&self, dir: &Path, message: &str) -> Result<CommitOutcome> {
        let out = self.git(dir, &["commit", "-m", message])?;
        if out.success {
            let short_hash = self.short_head(dir)?;
            info!(hash = %short_hash, "created commit");
            return Ok(CommitOutcome::Committed { short_hash });
        }

        let text = out.combined();
        if phrases::nothing_to_commit(&text) || self.index_matches_head(dir)? {
            debug!("nothing to commit");
            return Ok(CommitOutcome::NothingToCommit);
        }
        Err(SpiritError::Commit(text))
    }

    fn fetch(&self, dir: &Path) -> Result<()> {
        let out = self.git(dir, &["fetch", REMOTE])?;
        if out.success {
            return Ok(());
        }
        let text = out.combined();
        if phrases::missing_remote_ref(&text) {
            debug!("fetch found no remote history: {}", text);
            return Ok(());
        }
        Err(SpiritError::Fetch(text))
    }

    fn pull(&self, dir: &Path) -> Result<PullOutcome> {
        for branch in [PRIMARY_BRANCH, SECONDARY_BRANCH] {
            let out = self.pull_branch(dir, branch)?;
            let text = out.combined();
            if out.success {
                self.reject_unmerged(dir, &text)?;
                return Ok(PullOutcome::Rebased {
                    branch: branch.to_string(),
                });
            }
            if !phrases::missing_remote_ref(&text) {
                return Err(SpiritError::PullConflict(text));
            }
            debug!("{} not on remote", branch);
        }
        info!("remote has no history yet");
        Ok(PullOutcome::NoRemoteHistory)
    }

    fn push(&self, dir: &Path, branch: Option<&str>) -> Result<String> {
        if let Some(branch) = branch {
            let refspec = format!("HEAD:refs/heads/{}", branch);
            let out = self.git(dir, &["push", REMOTE, refspec.as_str()])?;
            if out.success {
                return Ok(branch.to_string());
            }
            return Err(SpiritError::Push(out.combined()));
        }

        let first = self.push_branch(dir, PRIMARY_BRANCH)?;
        if first.success {
            return Ok(PRIMARY_BRANCH.to_string());
        }
        let text = first.combined();
        if !phrases::mentions_branch(&text, PRIMARY_BRANCH) {
            return Err(SpiritError::Push(text));
        }

        debug!("push to {} failed, trying {}", PRIMARY_BRANCH, SECONDARY_BRANCH);
        let second = self.push_branch(dir, SECONDARY_BRANCH)?;
        if second.success {
            return Ok(SECONDARY_BRANCH.to_string());
        }
        Err(SpiritError::Push(format!("{}\n{}", text, second.combined())))
    }
}

/// Keep the run lock out of `git add -A`.
fn exclude_lock_file(dir: &Path) -> Result<()> {
    let git_dir = dir.join(".git");
    if !git_dir.is_dir() {
        return Ok(());
    }
    let info = git_dir.join("info");
    fs::create_dir_all(&info)?;
    let exclude = info.join("exclude");
    let entry = format!("/{}", LOCK_FILE);

    let mut current = fs::read_to_string(&exclude).unwrap_or_default();
    if current.lines().any(|l| l.trim() == entry) {
        return Ok(());
    }
    if !current.is_empty() && !current.ends_with('\n') {
        current.push('\n');
    }
    current.push_str(&entry);
    current.push('\n');
    fs::write(&exclude, current)?;
    Ok(())
}
