use anyhow::Context as _;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::SpiritConfig;
use crate::context::Context;
use crate::error::{Result, SpiritError};
use crate::manifest::TrackedManifest;
use crate::mirror::{MirrorReport, mirror};
use crate::paths::Paths;
use crate::resolve::resolve;

/// Where a spirit lives, as written on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    GitHub(String),
    GitLab(String),
    S3(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(p) => write!(f, "local ({})", p.display()),
            Location::GitHub(r) => write!(f, "github ({})", r),
            Location::GitLab(r) => write!(f, "gitlab ({})", r),
            Location::S3(b) => write!(f, "s3 ({})", b),
        }
    }
}

/// Parse `current`, `.`, `github:<repo>`, `gitlab:<repo>`, `s3://<bucket>`
/// or a local path. `current` and `.` name `config_dir`.
pub fn parse_location(loc: &str, config_dir: &Path) -> Location {
    if loc == "current" || loc == "." {
        return Location::Local(config_dir.to_path_buf());
    }
    if let Some(r) = loc.strip_prefix("github:").filter(|r| !r.is_empty()) {
        return Location::GitHub(r.to_string());
    }
    if let Some(r) = loc.strip_prefix("gitlab:").filter(|r| !r.is_empty()) {
        return Location::GitLab(r.to_string());
    }
    if let Some(b) = loc.strip_prefix("s3://").filter(|b| !b.is_empty()) {
        return Location::S3(b.to_string());
    }
    Location::Local(PathBuf::from(loc))
}

fn local(loc: &Location) -> Result<&Path> {
    match loc {
        Location::Local(p) => Ok(p),
        Location::GitHub(_) => Err(SpiritError::UnsupportedLocation("github".into())),
        Location::GitLab(_) => Err(SpiritError::UnsupportedLocation("gitlab".into())),
        Location::S3(_) => Err(SpiritError::UnsupportedLocation("s3".into())),
    }
}

#[derive(Debug)]
pub struct MigrateReport {
    pub config: SpiritConfig,
    pub files: MirrorReport,
}

/// Copy a spirit from `source` to `dest`: `spirit.json`, the manifest and
/// every tracked file that exists.
///
/// # Errors
/// - [`SpiritError::UnsupportedLocation`] for remote locations.
/// - [`SpiritError::InvalidIdentity`] if the source identity has no name.
pub fn migrate(source: &Location, dest: &Location) -> Result<MigrateReport> {
    let src = Paths::new(local(source)?);
    let dst = Paths::new(local(dest)?);

    let config = SpiritConfig::load(&src.config)?;
    if config.identity.name.trim().is_empty() {
        return Err(SpiritError::InvalidIdentity);
    }

    fs::create_dir_all(&dst.root)?;
    for d in ["memory", "projects", "context"] {
        fs::create_dir_all(dst.root.join(d))?;
    }
    config.save(&dst.config)?;

    let manifest = TrackedManifest::load_or_default(&src.manifest);
    manifest.save(&dst.manifest)?;

    let files = resolve(&src.root, &manifest.files);
    let copied = mirror(&src.root, &dst.root, &files.present);
    info!(
        copied = copied.copied.len(),
        to = %dst.root.display(),
        "migrated spirit"
    );
    Ok(MigrateReport {
        config,
        files: copied,
    })
}

/// `spirit migrate <source> <dest>`
pub fn cmd_migrate(ctx: &Context, source: &str, dest: &str) -> anyhow::Result<()> {
    let src = parse_location(source, ctx.state.root());
    let dst = parse_location(dest, ctx.state.root());
    println!("Migrating SPIRIT from '{}' to '{}'\n", source, dest);
    println!("Source: {}", src);
    println!("Destination: {}\n", dst);

    let report = migrate(&src, &dst).context("migration failed")?;
    for (f, e) in &report.files.failed {
        println!("   ! {} ({})", f, e);
    }
    println!("Migration complete!");
    println!(
        "{} {} is now at: {} ({} files)",
        report.config.identity.emoji,
        report.config.identity.name,
        dest,
        report.files.copied.len()
    );
    println!("\nTo verify:\n  spirit --config-dir {} status", dest);
    Ok(())
}
