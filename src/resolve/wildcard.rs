use glob::{MatchOptions, Pattern};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const SEGMENT: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// True if `pat` contains a shell wildcard (`*`, `?` or `[`).
pub fn has_wildcard(pat: &str) -> bool {
    pat.contains(['*', '?', '['])
}

/// Expand `pattern` under `base`, one `/`-separated segment at a time.
///
/// Returns paths relative to `base` that name regular files, in
/// lexicographic order per directory level. Directories that cannot be
/// read simply contribute no matches, and so does a malformed segment.
pub fn expand(base: &Path, pattern: &str) -> Vec<String> {
    let segments: Vec<&str> = pattern
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<PathBuf> = vec![PathBuf::new()];
    for (idx, seg) in segments.iter().enumerate() {
        let last = idx + 1 == segments.len();
        let mut next = Vec::new();

        if has_wildcard(seg) {
            let matcher = match Pattern::new(seg) {
                Ok(p) => p,
                Err(e) => {
                    warn!("ignoring pattern {:?}: {}", pattern, e);
                    return Vec::new();
                }
            };
            for cand in &candidates {
                next.extend(
                    matching_names(&base.join(cand), &matcher)
                        .into_iter()
                        .map(|name| cand.join(name)),
                );
            }
        } else {
            for cand in &candidates {
                let p = cand.join(seg);
                if last || base.join(&p).is_dir() {
                    next.push(p);
                }
            }
        }

        candidates = next;
        if candidates.is_empty() {
            break;
        }
    }

    candidates
        .into_iter()
        .filter(|rel| base.join(rel).is_file())
        .filter_map(|rel| rel.to_str().map(|s| s.replace('\\', "/")))
        .collect()
}

/// Entry names in `dir` matched by `matcher`, sorted. A leading dot must be
/// spelled out in the segment.
fn matching_names(dir: &Path, matcher: &Pattern) -> Vec<String> {
    let Ok(rd) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = rd
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| matcher.matches_with(name, SEGMENT))
        .collect();
    names.sort();
    names
}
