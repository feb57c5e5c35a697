use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::config::{read_json, write_json};
use crate::error::Result;

pub const MANIFEST_VERSION: &str = "1.0.0";

/// Tracked list used when `.spirit-tracked` is missing or unreadable.
pub const DEFAULT_TRACKED: &[&str] = &[
    "IDENTITY.md",
    "SOUL.md",
    "AGENTS.md",
    "TOOLS.md",
    "PROJECTS.md",
    "HEARTBEAT.md",
    "README.md",
    "spirit.json",
    ".spirit-tracked",
    "memory/*.md",
    "projects/*.md",
    "context/*.md",
];

/// Contents of `.spirit-tracked`.
///
/// ```json
/// { "version": "1.0.0", "files": ["IDENTITY.md", "memory/*.md"] }
/// ```
///
/// The file may be a symlink into a workspace; it is read through the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedManifest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub files: Vec<String>,
}

impl TrackedManifest {
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            version: MANIFEST_VERSION.to_string(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Load the manifest, falling back to [`DEFAULT_TRACKED`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(m) => {
                debug!(path = %path.display(), patterns = m.files.len(), "loaded tracked manifest");
                m
            }
            Err(e) => {
                warn!("using default tracked files: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self, 0o644)
    }
}

impl Default for TrackedManifest {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKED.iter().copied())
    }
}
