//! Workspace mirroring: copy resolved files from the live workspace into the
//! versioned config directory before they are staged.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use crate::paths::same_path;

/// Outcome of [`mirror`] and [`reconcile`]. Failures do not abort the batch.
#[derive(Debug, Default)]
pub struct MirrorReport {
    pub copied: Vec<String>,
    pub failed: Vec<(String, io::Error)>,
    /// Remote edits written back into the workspace by [`reconcile`].
    pub pulled: Vec<String>,
    /// Files edited on both sides since the [`Snapshot`]. When any exist,
    /// [`reconcile`] writes nothing.
    pub conflicts: Vec<String>,
}

impl MirrorReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Copy every relative path in `files` from `source` to `dest`, byte for
/// byte, creating parent directories as needed.
///
/// A file that cannot be copied is recorded in [`MirrorReport::failed`] and
/// skipped. When `source` and `dest` are the same directory nothing is
/// copied.
pub fn mirror<S: AsRef<str>>(source: &Path, dest: &Path, files: &[S]) -> MirrorReport {
    let mut report = MirrorReport::default();
    if same_path(source, dest) {
        debug!("source equals destination, nothing to mirror");
        return report;
    }

    for rel in files {
        let rel = rel.as_ref();
        match copy_one(&source.join(rel), &dest.join(rel)) {
            Ok(()) => report.copied.push(rel.to_string()),
            Err(e) => {
                warn!("skipping {}: {}", rel, e);
                report.failed.push((rel.to_string(), e));
            }
        }
    }

    debug!(
        copied = report.copied.len(),
        failed = report.failed.len(),
        "mirrored workspace files"
    );
    report
}

/// Contents of tracked files in the config directory, taken before a pull.
/// A file that does not exist is recorded as `None`.
#[derive(Debug, Default)]
pub struct Snapshot(BTreeMap<String, Option<Vec<u8>>>);

impl Snapshot {
    pub fn take<S: AsRef<str>>(dir: &Path, files: &[S]) -> Self {
        Self(
            files
                .iter()
                .map(|f| {
                    let f = f.as_ref();
                    (f.to_string(), fs::read(dir.join(f)).ok())
                })
                .collect(),
        )
    }

    fn get(&self, rel: &str) -> Option<&[u8]> {
        self.0.get(rel).and_then(|v| v.as_deref())
    }
}

enum Action {
    Publish,
    Pull(Vec<u8>),
}

/// Three-way mirror run after a pull, with `base` taken before it.
///
/// For each file, `source` (the workspace) and `dest` (the config directory,
/// now holding the remote version) are compared against `base`:
/// - only the workspace changed: copy it into `dest`
/// - only the remote changed: copy it back into the workspace
/// - both changed to different bytes: a conflict
///
/// A conflict on any file leaves both directories untouched.
pub fn reconcile<S: AsRef<str>>(
    source: &Path,
    dest: &Path,
    files: &[S],
    base: &Snapshot,
) -> MirrorReport {
    let mut report = MirrorReport::default();
    if same_path(source, dest) {
        return report;
    }

    let mut plan = Vec::new();
    for rel in files {
        let rel = rel.as_ref();
        let ours = match fs::read(source.join(rel)) {
            Ok(b) => b,
            Err(e) => {
                warn!("skipping {}: {}", rel, e);
                report.failed.push((rel.to_string(), e));
                continue;
            }
        };
        let theirs = fs::read(dest.join(rel)).ok();
        if theirs.as_deref() == Some(ours.as_slice()) {
            continue;
        }

        let before = base.get(rel);
        let local_changed = before != Some(ours.as_slice());
        let remote_changed = theirs.as_deref() != before;
        match theirs {
            Some(_) if local_changed && remote_changed => {
                report.conflicts.push(rel.to_string())
            }
            Some(t) if remote_changed => plan.push((rel, Action::Pull(t))),
            _ => plan.push((rel, Action::Publish)),
        }
    }

    if !report.conflicts.is_empty() {
        warn!(files = ?report.conflicts, "workspace and remote both changed");
        return report;
    }

    for (rel, action) in plan {
        let done = match &action {
            Action::Publish => copy_one(&source.join(rel), &dest.join(rel)),
            Action::Pull(data) => write_one(&source.join(rel), data),
        };
        match (done, action) {
            (Ok(()), Action::Publish) => report.copied.push(rel.to_string()),
            (Ok(()), Action::Pull(_)) => report.pulled.push(rel.to_string()),
            (Err(e), _) => {
                warn!("skipping {}: {}", rel, e);
                report.failed.push((rel.to_string(), e));
            }
        }
    }

    debug!(
        copied = report.copied.len(),
        pulled = report.pulled.len(),
        failed = report.failed.len(),
        "reconciled workspace files"
    );
    report
}

fn copy_one(src: &Path, dst: &Path) -> io::Result<()> {
    let data = fs::read(src)?;
    if dst.is_symlink() && same_path(src, dst) {
        return Ok(());
    }
    write_one(dst, &data)
}

fn write_one(dst: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    if dst.is_symlink() {
        // `init --workspace` links the manifest back into the workspace.
        fs::remove_file(dst)?;
    }
    fs::write(dst, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copies_bytes_verbatim_into_new_dirs() {
        let td = tempdir().unwrap();
        let src = td.path().join("ws");
        let dst = td.path().join("state");
        fs::create_dir_all(src.join("memory")).unwrap();
        fs::create_dir_all(&dst).unwrap();
        let content = b"line one\r\nline two\n\xF0\x9F\x8C\x8C no trailing newline";
        fs::write(src.join("memory/a.md"), content).unwrap();

        let report = mirror(&src, &dst, &["memory/a.md"]);
        assert!(report.is_clean());
        assert_eq!(report.copied, vec!["memory/a.md"]);
        assert_eq!(fs::read(dst.join("memory/a.md")).unwrap(), content);
    }

    #[test]
    fn failures_are_reported_and_skipped() {
        let td = tempdir().unwrap();
        let src = td.path().join("ws");
        let dst = td.path().join("state");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join("IDENTITY.md"), "me").unwrap();
        fs::write(src.join("SOUL.md"), "soul").unwrap();

        let report = mirror(&src, &dst, &["IDENTITY.md", "GONE.md", "SOUL.md"]);
        assert_eq!(report.copied, vec!["IDENTITY.md", "SOUL.md"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "GONE.md");
        assert_eq!(report.failed[0].1.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn same_directory_is_a_no_op() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("IDENTITY.md"), "me").unwrap();
        let report = mirror(td.path(), td.path(), &["IDENTITY.md"]);
        assert!(report.copied.is_empty());
        assert!(report.is_clean());
    }

    #[cfg(unix)]
    #[test]
    fn replaces_symlink_instead_of_writing_through() {
        let td = tempdir().unwrap();
        let src = td.path().join("ws");
        let dst = td.path().join("state");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join(".spirit-tracked"), "new").unwrap();
        let elsewhere = td.path().join("elsewhere");
        fs::write(&elsewhere, "old").unwrap();
        std::os::unix::fs::symlink(&elsewhere, dst.join(".spirit-tracked")).unwrap();

        mirror(&src, &dst, &[".spirit-tracked"]);
        assert_eq!(fs::read_to_string(&elsewhere).unwrap(), "old");
        assert_eq!(fs::read_to_string(dst.join(".spirit-tracked")).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn keeps_symlink_that_points_back_at_the_source() {
        let td = tempdir().unwrap();
        let src = td.path().join("ws");
        let dst = td.path().join("state");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join(".spirit-tracked"), "{}").unwrap();
        std::os::unix::fs::symlink(src.join(".spirit-tracked"), dst.join(".spirit-tracked"))
            .unwrap();

        let report = mirror(&src, &dst, &[".spirit-tracked"]);
        assert_eq!(report.copied, vec![".spirit-tracked"]);
        assert!(dst.join(".spirit-tracked").is_symlink());
    }

    fn pair() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let td = tempdir().unwrap();
        let ws = td.path().join("ws");
        let cfg = td.path().join("state");
        fs::create_dir_all(&ws).unwrap();
        fs::create_dir_all(&cfg).unwrap();
        (td, ws, cfg)
    }

    #[test]
    fn reconcile_publishes_workspace_edits() {
        let (_td, ws, cfg) = pair();
        fs::write(cfg.join("SOUL.md"), "base").unwrap();
        let base = Snapshot::take(&cfg, &["SOUL.md"]);
        fs::write(ws.join("SOUL.md"), "kinder").unwrap();

        let report = reconcile(&ws, &cfg, &["SOUL.md"], &base);
        assert_eq!(report.copied, vec!["SOUL.md"]);
        assert_eq!(fs::read_to_string(cfg.join("SOUL.md")).unwrap(), "kinder");
    }

    #[test]
    fn reconcile_brings_remote_edits_back() {
        let (_td, ws, cfg) = pair();
        fs::write(cfg.join("SOUL.md"), "base").unwrap();
        fs::write(ws.join("SOUL.md"), "base").unwrap();
        let base = Snapshot::take(&cfg, &["SOUL.md"]);
        fs::write(cfg.join("SOUL.md"), "edited elsewhere").unwrap();

        let report = reconcile(&ws, &cfg, &["SOUL.md"], &base);
        assert!(report.copied.is_empty());
        assert_eq!(report.pulled, vec!["SOUL.md"]);
        assert_eq!(
            fs::read_to_string(ws.join("SOUL.md")).unwrap(),
            "edited elsewhere"
        );
    }

    #[test]
    fn reconcile_reports_both_sides_changed_and_writes_nothing() {
        let (_td, ws, cfg) = pair();
        fs::write(cfg.join("SOUL.md"), "base").unwrap();
        fs::write(cfg.join("IDENTITY.md"), "id").unwrap();
        let base = Snapshot::take(&cfg, &["IDENTITY.md", "SOUL.md"]);
        fs::write(cfg.join("SOUL.md"), "edited by a").unwrap();
        fs::write(ws.join("SOUL.md"), "edited by b").unwrap();
        fs::write(ws.join("IDENTITY.md"), "new id").unwrap();

        let report = reconcile(&ws, &cfg, &["IDENTITY.md", "SOUL.md"], &base);
        assert_eq!(report.conflicts, vec!["SOUL.md"]);
        assert!(report.copied.is_empty());
        assert_eq!(fs::read_to_string(cfg.join("SOUL.md")).unwrap(), "edited by a");
        assert_eq!(fs::read_to_string(cfg.join("IDENTITY.md")).unwrap(), "id");
    }

    #[test]
    fn reconcile_accepts_identical_files_on_join() {
        let (_td, ws, cfg) = pair();
        let base = Snapshot::take(&cfg, &["SOUL.md", "IDENTITY.md"]);
        fs::write(cfg.join("SOUL.md"), "base").unwrap();
        fs::write(ws.join("SOUL.md"), "base").unwrap();
        fs::write(ws.join("IDENTITY.md"), "only here").unwrap();

        let report = reconcile(&ws, &cfg, &["SOUL.md", "IDENTITY.md"], &base);
        assert!(report.conflicts.is_empty());
        assert_eq!(report.copied, vec!["IDENTITY.md"]);
        assert!(report.pulled.is_empty());
    }
}
