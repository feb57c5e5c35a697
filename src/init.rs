use anyhow::Context as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{Identity, SpiritConfig};
use crate::error::Result;
use crate::manifest::TrackedManifest;
use crate::paths::{MANIFEST_FILE, Paths};

pub const DEFAULT_NAME: &str = "agent";
pub const DEFAULT_EMOJI: &str = "🤖";

const STATE_DIRS: &[&str] = &["memory", "projects", "context"];

const STANDARD_TRACKED: &[&str] = &[
    "IDENTITY.md",
    "SOUL.md",
    "AGENTS.md",
    "TOOLS.md",
    "memory/*.md",
    "projects/*.md",
    "context/*.md",
];

const WORKSPACE_TRACKED: &[&str] = &[
    "IDENTITY.md",
    "SOUL.md",
    "AGENTS.md",
    "USER.md",
    "TOOLS.md",
    "PROJECTS.md",
    "HEARTBEAT.md",
    "README.md",
    "memory/*.md",
    "projects/*.md",
    "context/*.md",
];

#[derive(Debug, Clone, Default)]
pub struct InitArgs {
    pub name: Option<String>,
    pub emoji: Option<String>,
    pub email: Option<String>,
    pub workspace: Option<PathBuf>,
}

#[derive(Debug)]
pub struct InitReport {
    pub config: SpiritConfig,
    pub root: PathBuf,
    /// Absolute workspace path in workspace mode.
    pub workspace: Option<PathBuf>,
}

/// Create the config directory layout at `root`.
///
/// - Standard mode: state directories, manifest and README live in `root`.
/// - Workspace mode: they live in the workspace; `root/.spirit-tracked` is
///   a symlink to the workspace manifest and `spirit.json` records the
///   workspace path.
///
/// Seed files (`IDENTITY.md`, `SOUL.md`, `README.md`) are only written when
/// absent.
pub fn init(root: &Path, args: &InitArgs) -> Result<InitReport> {
    let name = args.name.as_deref().filter(|s| !s.is_empty()).unwrap_or(DEFAULT_NAME);
    let emoji = args.emoji.as_deref().filter(|s| !s.is_empty()).unwrap_or(DEFAULT_EMOJI);
    let identity = Identity::new(name, emoji, args.email.as_deref().filter(|s| !s.is_empty()));

    let paths = Paths::new(root);
    fs::create_dir_all(root)?;

    let (config, workspace) = match &args.workspace {
        None => {
            create_state_dirs(root)?;
            TrackedManifest::new(STANDARD_TRACKED.iter().copied()).save(&paths.manifest)?;
            write_if_absent(
                &root.join("README.md"),
                &format!("# SPIRIT State for {} {}\n\nRun: spirit sync\n", emoji, name),
            )?;
            (SpiritConfig::new(identity), None)
        }
        Some(ws) => {
            let ws = std::path::absolute(ws)?;
            create_state_dirs(&ws)?;

            let ws_manifest = ws.join(MANIFEST_FILE);
            TrackedManifest::new(WORKSPACE_TRACKED.iter().copied()).save(&ws_manifest)?;
            link_manifest(&ws_manifest, &paths.manifest)?;

            write_if_absent(
                &ws.join("IDENTITY.md"),
                &format!("# {} {}\n\nName: {}\nEmoji: {}\n", emoji, name, name, emoji),
            )?;
            write_if_absent(
                &ws.join("SOUL.md"),
                "# SOUL\n\nPersonality, behavior and boundaries.\n",
            )?;
            write_if_absent(&ws.join("README.md"), &workspace_readme(name, emoji, &ws))?;

            (SpiritConfig::new(identity).with_workspace(&ws), Some(ws))
        }
    };

    config.save(&paths.config)?;
    info!(root = %root.display(), "initialized config directory");
    Ok(InitReport {
        config,
        root: root.to_path_buf(),
        workspace,
    })
}

fn create_state_dirs(base: &Path) -> io::Result<()> {
    for d in STATE_DIRS {
        fs::create_dir_all(base.join(d))?;
    }
    Ok(())
}

fn write_if_absent(path: &Path, body: &str) -> io::Result<()> {
    if path.exists() {
        debug!(path = %path.display(), "keeping existing file");
        return Ok(());
    }
    fs::write(path, body)
}

/// Replace `link` with a symlink to `target` (a copy where symlinks are
/// unavailable).
fn link_manifest(target: &Path, link: &Path) -> io::Result<()> {
    if fs::symlink_metadata(link).is_ok() {
        fs::remove_file(link)?;
    }
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(not(unix))]
    {
        fs::copy(target, link).map(|_| ())
    }
}

fn workspace_readme(name: &str, emoji: &str, ws: &Path) -> String {
    format!(
        "# SPIRIT State for {emoji} {name}\n\n\
         ## Structure\n\
         - **.spirit-tracked**: Edit this to control what syncs (symlinked from the config dir)\n\
         - **IDENTITY.md, SOUL.md**: Agent identity\n\
         - **memory/**, **projects/**, **context/**: State directories\n\n\
         ## Sync\n\
         Files are mirrored from {ws} on every sync:\n  spirit sync\n",
        ws = ws.display()
    )
}

/// `spirit init [--name] [--emoji] [--email] [--workspace DIR]`
pub fn cmd_init(root: &Path, args: &InitArgs) -> anyhow::Result<()> {
    let report = init(root, args).context("init")?;
    let id = &report.config.identity;
    match &report.workspace {
        None => {
            println!("SPIRIT initialized for '{}' {}", id.name, id.emoji);
            println!("State directory: {}", report.root.display());
        }
        Some(ws) => {
            println!("SPIRIT initialized in workspace mode");
            println!("Workspace: {}", ws.display());
            println!(
                "Config symlink: {} -> {}",
                report.root.join(MANIFEST_FILE).display(),
                ws.join(MANIFEST_FILE).display()
            );
            println!("\nNext steps:");
            println!("1. Edit {} to configure files to sync", ws.join(MANIFEST_FILE).display());
            println!("2. Add a remote: git -C {} remote add origin <url>", report.root.display());
            println!("3. Run 'spirit sync'");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WORKSPACE_CONFIG_VERSION;
    use tempfile::tempdir;

    #[test]
    fn standard_layout() {
        let td = tempdir().unwrap();
        let root = td.path().join(".spirit");

        let report = init(&root, &InitArgs::default()).unwrap();

        for d in STATE_DIRS {
            assert!(root.join(d).is_dir(), "{}", d);
        }
        let manifest = TrackedManifest::load(&root.join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest.files, STANDARD_TRACKED);
        assert_eq!(report.config.identity.name, "agent");
        assert_eq!(report.config.identity.emoji, "🤖");
        assert!(report.config.workspace_dir().is_none());
        assert!(
            fs::read_to_string(root.join("README.md"))
                .unwrap()
                .contains("agent")
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(root.join("spirit.json"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[cfg(unix)]
    #[test]
    fn workspace_mode_links_manifest() {
        let td = tempdir().unwrap();
        let root = td.path().join(".spirit");
        let ws = td.path().join("ws");

        let args = InitArgs {
            name: Some("orion".into()),
            emoji: Some("🌌".into()),
            workspace: Some(ws.clone()),
            ..Default::default()
        };
        let report = init(&root, &args).unwrap();

        let link = root.join(MANIFEST_FILE);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), ws.join(MANIFEST_FILE));
        let manifest = TrackedManifest::load(&link).unwrap();
        assert!(manifest.files.iter().any(|f| f == "USER.md"));

        assert_eq!(report.config.version, WORKSPACE_CONFIG_VERSION);
        assert_eq!(report.config.workspace_dir(), Some(ws.clone()));
        assert!(
            fs::read_to_string(ws.join("IDENTITY.md"))
                .unwrap()
                .starts_with("# 🌌 orion")
        );
        for d in STATE_DIRS {
            assert!(ws.join(d).is_dir());
        }
    }

    #[cfg(unix)]
    #[test]
    fn workspace_init_keeps_existing_identity() {
        let td = tempdir().unwrap();
        let ws = td.path().join("ws");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("IDENTITY.md"), "hand written").unwrap();

        let args = InitArgs {
            workspace: Some(ws.clone()),
            ..Default::default()
        };
        init(&td.path().join(".spirit"), &args).unwrap();
        // Re-running replaces the manifest link but not the identity.
        init(&td.path().join(".spirit"), &args).unwrap();

        assert_eq!(fs::read_to_string(ws.join("IDENTITY.md")).unwrap(), "hand written");
    }
}
