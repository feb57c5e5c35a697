use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SpiritConfig;
use crate::git::GitCli;
use crate::paths::{StateDir, source_dir_from_env, spirit_home};

/// Settings shared by every subcommand, built once from global CLI flags.
#[derive(Debug, Clone)]
pub struct Context {
    pub state: StateDir,
    pub git: GitCli,
    pub verbose: bool,
}

impl Context {
    /// Resolve the config directory, workspace and git backend.
    ///
    /// The workspace comes from `SPIRIT_SOURCE_DIR` when set, otherwise from
    /// the `workspace` backend recorded in `spirit.json`. The identity in
    /// `spirit.json` becomes the commit author.
    pub fn new(config_dir: Option<PathBuf>, git_timeout: Duration, verbose: bool) -> Self {
        let root = config_dir.unwrap_or_else(spirit_home);
        let state = StateDir::new(&root);

        let config = if state.paths.config.exists() {
            match SpiritConfig::load(&state.paths.config) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("ignoring {}: {}", state.paths.config.display(), e);
                    None
                }
            }
        } else {
            None
        };

        let source = source_dir_from_env().or_else(|| config.as_ref()?.workspace_dir());
        if let Some(src) = &source {
            debug!(workspace = %src.display(), "resolving tracked files from workspace");
        }

        let mut git = GitCli::new(git_timeout);
        if let Some(id) = config.as_ref().map(|c| &c.identity)
            && !id.name.is_empty()
        {
            let email = id
                .email
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| format!("{}@spirit.local", id.name));
            git = git.with_author(id.name.clone(), email);
        }

        Self {
            state: state.with_source(source),
            git,
            verbose,
        }
    }
}
