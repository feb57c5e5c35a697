//! In-memory [`Vcs`] used to drive orchestrator state transitions in tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::{CommitOutcome, PRIMARY_BRANCH, PullOutcome, RepoInit, Vcs};
use crate::error::{Result, SpiritError};

#[derive(Debug, Clone)]
pub enum PullScript {
    Rebased,
    RebasedOnto(String),
    NoRemoteHistory,
    Conflict(String),
}

#[derive(Debug, Clone)]
pub enum PushScript {
    Ok(String),
    Fail(String),
}

/// Records every call in `calls` and snapshots staged file contents so a
/// repeated commit of identical content reports nothing to commit.
pub struct FakeVcs {
    pub remote: Option<String>,
    pub pull: PullScript,
    pub push: PushScript,
    /// Files a successful pull writes into the working tree, as if the
    /// remote had changed them.
    pub incoming: Vec<(String, String)>,
    pub calls: RefCell<Vec<String>>,
    pub commits: RefCell<Vec<(String, BTreeMap<String, Vec<u8>>)>>,
    pub repos: RefCell<HashSet<PathBuf>>,
    pub index: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl Default for FakeVcs {
    fn default() -> Self {
        Self {
            remote: None,
            pull: PullScript::Rebased,
            push: PushScript::Ok(PRIMARY_BRANCH.to_string()),
            incoming: Vec::new(),
            calls: RefCell::new(Vec::new()),
            commits: RefCell::new(Vec::new()),
            repos: RefCell::new(HashSet::new()),
            index: RefCell::new(BTreeMap::new()),
        }
    }
}

impl FakeVcs {
    pub fn with_remote(url: &str) -> Self {
        Self {
            remote: Some(url.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.commits.borrow().iter().map(|(m, _)| m.clone()).collect()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }
}

impl Vcs for FakeVcs {
    fn ensure_repo(&self, dir: &Path) -> Result<RepoInit> {
        self.record("ensure_repo");
        if self.repos.borrow_mut().insert(dir.to_path_buf()) {
            Ok(RepoInit::Created)
        } else {
            Ok(RepoInit::Existing)
        }
    }

    fn remote_url(&self, _dir: &Path) -> Result<Option<String>> {
        self.record("remote_url");
        Ok(self.remote.clone())
    }

    fn stage(&self, dir: &Path, paths: &[String]) -> Result<()> {
        self.record(format!("stage {}", paths.join(" ")));
        let mut index = self.index.borrow_mut();
        for p in paths {
            let data = fs::read(dir.join(p)).map_err(|e| SpiritError::Stage(e.to_string()))?;
            index.insert(p.clone(), data);
        }
        Ok(())
    }

    fn stage_all(&self, _dir: &Path) -> Result<()> {
        self.record("stage_all");
        Ok(())
    }

    fn commit(&self, _dir: &Path, message: &str) -> Result<CommitOutcome> {
        self.record("commit");
        let snapshot = self.index.borrow().clone();
        let mut commits = self.commits.borrow_mut();
        if commits.last().map(|(_, s)| s) == Some(&snapshot) {
            return Ok(CommitOutcome::NothingToCommit);
        }
        commits.push((message.to_string(), snapshot));
        Ok(CommitOutcome::Committed {
            short_hash: format!("{:07x}", 0xabc0000 + commits.len()),
        })
    }

    fn fetch(&self, _dir: &Path) -> Result<()> {
        self.record("fetch");
        Ok(())
    }

    fn pull(&self, dir: &Path) -> Result<PullOutcome> {
        self.record("pull");
        if !matches!(self.pull, PullScript::Conflict(_)) {
            for (rel, body) in &self.incoming {
                fs::write(dir.join(rel), body).map_err(|e| SpiritError::PullConflict(e.to_string()))?;
            }
        }
        match &self.pull {
            PullScript::Rebased => Ok(PullOutcome::Rebased {
                branch: PRIMARY_BRANCH.to_string(),
            }),
            PullScript::RebasedOnto(branch) => Ok(PullOutcome::Rebased {
                branch: branch.clone(),
            }),
            PullScript::NoRemoteHistory => Ok(PullOutcome::NoRemoteHistory),
            PullScript::Conflict(msg) => Err(SpiritError::PullConflict(msg.clone())),
        }
    }

    fn push(&self, _dir: &Path, branch: Option<&str>) -> Result<String> {
        self.record("push");
        match &self.push {
            PushScript::Ok(fallback) => Ok(branch.unwrap_or(fallback.as_str()).to_string()),
            PushScript::Fail(msg) => Err(SpiritError::Push(msg.clone())),
        }
    }
}
