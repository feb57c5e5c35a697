//! Tracked pattern resolution.
//!
//! Turns the manifest's pattern list into the concrete files that exist
//! right now. Absent files are expected (not every agent populates every
//! optional file) and are reported, never raised.

mod wildcard;

use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

pub use wildcard::has_wildcard;

/// Result of [`resolve`]: existing files and absent literal patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedFileSet {
    /// Relative paths of regular files, manifest order then match order.
    pub present: Vec<String>,
    /// Literal patterns with no file behind them.
    pub missing: Vec<String>,
}

impl ResolvedFileSet {
    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }
}

/// Resolve `patterns` against `base`.
///
/// - Wildcard patterns expand to every matching regular file; zero matches
///   contributes nothing to either list.
/// - Literal patterns land in `present` when `base/pattern` is a regular
///   file and in `missing` otherwise.
/// - A path matched by several patterns is listed once, at its first match.
pub fn resolve<S: AsRef<str>>(base: &Path, patterns: &[S]) -> ResolvedFileSet {
    let mut out = ResolvedFileSet::default();
    let mut seen: HashSet<String> = HashSet::new();

    for pattern in patterns {
        let pattern = pattern.as_ref().trim();
        if pattern.is_empty() {
            continue;
        }

        if has_wildcard(pattern) {
            for rel in wildcard::expand(base, pattern) {
                if seen.insert(rel.clone()) {
                    out.present.push(rel);
                }
            }
        } else if base.join(pattern).is_file() {
            if seen.insert(pattern.to_string()) {
                out.present.push(pattern.to_string());
            }
        } else {
            out.missing.push(pattern.to_string());
        }
    }

    debug!(
        base = %base.display(),
        present = out.present.len(),
        missing = out.missing.len(),
        "resolved tracked files"
    );
    out
}
