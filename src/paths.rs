use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

pub const MANIFEST_FILE: &str = ".spirit-tracked";
pub const CONFIG_FILE: &str = "spirit.json";
pub const AUTOBACKUP_FILE: &str = "autobackup.json";
pub const LOCK_FILE: &str = ".spirit.lock";

/// Environment variable that redirects file resolution to a workspace tree.
pub const SOURCE_DIR_ENV: &str = "SPIRIT_SOURCE_DIR";

const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(30);

/// Files that live directly under the config directory.
#[derive(Clone, Debug)]
pub struct Paths {
    pub root: PathBuf,
    pub manifest: PathBuf,
    pub config: PathBuf,
    pub autobackup: PathBuf,
    pub lock: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            manifest: root.join(MANIFEST_FILE),
            config: root.join(CONFIG_FILE),
            autobackup: root.join(AUTOBACKUP_FILE),
            lock: root.join(LOCK_FILE),
            root,
        }
    }
}

/// Default config directory: `$HOME/.spirit`, or `./.spirit` without a home.
pub fn spirit_home() -> PathBuf {
    home_from(env::var_os("HOME"))
}

fn home_from(home: Option<OsString>) -> PathBuf {
    match home.filter(|h| !h.is_empty()) {
        Some(h) => PathBuf::from(h).join(".spirit"),
        None => PathBuf::from(".spirit"),
    }
}

/// Workspace directory named by [`SOURCE_DIR_ENV`], if set and non-empty.
pub fn source_dir_from_env() -> Option<PathBuf> {
    env::var_os(SOURCE_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// The directories one checkpoint or sync run operates on.
///
/// Passed explicitly to every operation so several state directories can be
/// used side by side in one process.
#[derive(Clone, Debug)]
pub struct StateDir {
    pub paths: Paths,
    /// Workspace the tracked files are mirrored from (workspace mode).
    pub source: Option<PathBuf>,
    /// How long a run waits for another run to release the directory lock.
    pub lock_wait: Duration,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: Paths::new(root),
            source: None,
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    pub fn with_source(mut self, source: Option<PathBuf>) -> Self {
        self.source = source;
        self
    }

    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    /// `Some(source)` only when the workspace is a different directory than
    /// the config directory.
    pub fn workspace(&self) -> Option<&Path> {
        self.source
            .as_deref()
            .filter(|src| !same_path(src, self.root()))
    }

    /// Directory tracked patterns are resolved against.
    pub fn files_dir(&self) -> &Path {
        self.workspace().unwrap_or_else(|| self.root())
    }

    pub fn is_initialized(&self) -> bool {
        self.root().is_dir()
    }
}

/// Compare two paths, resolving symlinks and `..` where possible.
pub fn same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
