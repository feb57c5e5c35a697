#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use spirit::{GitCli, TrackedManifest, Vcs};

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("LC_ALL", "C")
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

pub fn vcs() -> GitCli {
    GitCli::new(Duration::from_secs(60)).with_author("tester", "tester@example.com")
}

pub fn bare_remote(parent: &Path, name: &str) -> PathBuf {
    let path = parent.join(name);
    fs::create_dir_all(&path).unwrap();
    git(&path, &["init", "--bare", "--quiet"]);
    path
}

/// Config directory with a manifest, a repository and (optionally) `origin`.
pub fn state_dir(root: &Path, patterns: &[&str], remote: Option<&Path>) -> PathBuf {
    fs::create_dir_all(root).unwrap();
    TrackedManifest::new(patterns.iter().copied())
        .save(&root.join(".spirit-tracked"))
        .unwrap();
    vcs().ensure_repo(root).unwrap();
    if let Some(r) = remote {
        git(root, &["remote", "add", "origin", r.to_str().unwrap()]);
    }
    root.to_path_buf()
}

pub fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}
