//! Persisted configuration under the config directory.
//!
//! - `spirit.json`: identity, soul and backend table ([`SpiritConfig`])
//! - `autobackup.json`: automatic backup policy ([`AutoBackupPolicy`])
//!
//! The core only reads the backend table to find the workspace path; the
//! identity is used as the commit author.

mod autobackup;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Result, SpiritError};

pub use autobackup::{AutoBackupPolicy, DEFAULT_WATCH_INTERVAL, parse_interval};

pub const CONFIG_VERSION: &str = "1.0.0";
pub const WORKSPACE_CONFIG_VERSION: &str = "1.1.0";

/// Backend name (and type) recorded by `spirit init --workspace`.
pub const WORKSPACE_BACKEND: &str = "workspace";

/// Top-level structure of `spirit.json`.
///
/// Example:
/// ```json
/// {
///   "version": "1.1.0",
///   "identity": { "name": "orion", "emoji": "🌌", "created_at": "2024-05-01T10:00:00Z" },
///   "soul": { "vibe": "", "core_truths": [], "boundaries": [] },
///   "backends": { "workspace": { "type": "workspace", "config": { "path": "/srv/ws" } } },
///   "created_at": "2024-05-01T10:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiritConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub backends: BTreeMap<String, Backend>,
    pub identity: Identity,
    #[serde(default, deserialize_with = "null_as_default")]
    pub soul: Soul,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

/// Free-text personality block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Soul {
    #[serde(default)]
    pub vibe: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub core_truths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub boundaries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: BTreeMap<String, String>,
}

impl Identity {
    pub fn new(name: &str, emoji: &str, email: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            emoji: emoji.to_string(),
            email: email.filter(|e| !e.is_empty()).map(str::to_string),
            description: None,
            created_at: Utc::now(),
        }
    }
}

impl SpiritConfig {
    pub fn new(identity: Identity) -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            backends: BTreeMap::new(),
            identity,
            soul: Soul::default(),
            created_at: Utc::now(),
        }
    }

    /// Record `dir` as the workspace the tracked files live in.
    pub fn with_workspace(mut self, dir: &Path) -> Self {
        let config = BTreeMap::from([("path".to_string(), dir.display().to_string())]);
        self.version = WORKSPACE_CONFIG_VERSION.to_string();
        self.backends.insert(
            WORKSPACE_BACKEND.to_string(),
            Backend {
                kind: WORKSPACE_BACKEND.to_string(),
                config,
            },
        );
        self
    }

    /// Workspace path from the `workspace` backend, if one is configured.
    pub fn workspace_dir(&self) -> Option<PathBuf> {
        self.backends
            .values()
            .find(|b| b.kind == WORKSPACE_BACKEND)
            .and_then(|b| b.config.get("path"))
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Written with mode 0600; the file may carry an e-mail address.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self, 0o600)
    }
}

/// Go-era files serialize empty maps and lists as `null`.
fn null_as_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let txt = fs::read_to_string(path)?;
    serde_json::from_str(&txt).map_err(|source| SpiritError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically replace `path` with the pretty-printed JSON of `value`.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T, mode: u32) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(value).map_err(|source| SpiritError::Config {
        path: path.to_path_buf(),
        source,
    })?;
    data.push(b'\n');

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&data)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
