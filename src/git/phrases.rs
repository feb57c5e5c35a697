//! Classification of git diagnostics.
//!
//! git reports several normal outcomes ("nothing to commit", "the remote has
//! no such branch yet") only as text on a failing exit status. All matching
//! against that text lives here so the table can follow git's wording
//! without touching the orchestrators. Output is produced under `LC_ALL=C`.

use regex::Regex;

/// The index matches HEAD; committing would record nothing.
const NOTHING_TO_COMMIT: &[&str] = &[
    "nothing to commit",
    "nothing added to commit",
    "no changes added to commit",
];

/// The requested branch does not exist on the remote (empty remote, first
/// push) or the ref could not be resolved.
const MISSING_REMOTE_REF: &[&str] = &[
    "couldn't find remote ref",
    "no such ref",
    "could not resolve",
];

/// A rebase finished but its autostash could not be reapplied cleanly.
const AUTOSTASH_CONFLICT: &[&str] = &[
    "applying autostash resulted in conflicts",
    "your changes are safe in the stash",
];

fn contains_any(output: &str, table: &[&str]) -> bool {
    let lower = output.to_lowercase();
    table.iter().any(|p| lower.contains(p))
}

pub fn nothing_to_commit(output: &str) -> bool {
    contains_any(output, NOTHING_TO_COMMIT)
}

pub fn missing_remote_ref(output: &str) -> bool {
    contains_any(output, MISSING_REMOTE_REF)
}

pub fn autostash_conflict(output: &str) -> bool {
    contains_any(output, AUTOSTASH_CONFLICT)
}

/// True if `output` names `branch` as a whole word.
pub fn mentions_branch(output: &str, branch: &str) -> bool {
    Regex::new(&format!(r"\b{}\b", regex::escape(branch)))
        .map(|re| re.is_match(output))
        .unwrap_or_else(|_| output.contains(branch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_nothing_to_commit_variants() {
        assert!(nothing_to_commit(
            "On branch main\nnothing to commit, working tree clean"
        ));
        assert!(nothing_to_commit(
            "On branch main\n\nInitial commit\n\nnothing added to commit but untracked files present"
        ));
        assert!(nothing_to_commit(
            "Changes not staged for commit:\n\tmodified: x\n\nno changes added to commit"
        ));
        assert!(!nothing_to_commit(
            "Author identity unknown\n\n*** Please tell me who you are."
        ));
    }

    #[test]
    fn recognises_missing_remote_refs() {
        assert!(missing_remote_ref("fatal: couldn't find remote ref main"));
        assert!(missing_remote_ref("fatal: Couldn't find remote ref master"));
        assert!(missing_remote_ref("error: no such ref: refs/heads/main"));
        assert!(!missing_remote_ref(
            "CONFLICT (content): Merge conflict in SOUL.md\nerror: could not apply 1a2b3c4... sync"
        ));
    }

    #[test]
    fn recognises_failed_autostash() {
        assert!(autostash_conflict(
            "Successfully rebased and updated refs/heads/main.\n\
             Applying autostash resulted in conflicts.\n\
             Your changes are safe in the stash.\n\
             You can run \"git stash pop\" or \"git stash drop\" at any time."
        ));
        assert!(!autostash_conflict(
            "Successfully rebased and updated refs/heads/main.\nApplied autostash."
        ));
    }

    #[test]
    fn branch_mentions_are_whole_words() {
        assert!(mentions_branch(
            "error: src refspec main does not match any",
            "main"
        ));
        assert!(mentions_branch(" ! [rejected]        main -> main (fetch first)", "main"));
        assert!(!mentions_branch(
            "fatal: unable to access 'https://example.domain/x.git/'",
            "main"
        ));
        assert!(!mentions_branch("remaining objects", "main"));
    }
}
