//! Gitignore reconciliation support (§4.H.1/H.3/H.4): fingerprinting, pattern diffing, and
//! the three reconciliation strategies the Coordinator dispatches to on an ignore-file
//! change. Uses the teacher's own `ignore` crate for pattern matching rather than
//! hand-rolled glob logic, so strategy decisions agree with what a real `.gitignore` means
//! (negation, directory-only patterns, etc.).

use std::path::Path;

use ignore::gitignore::GitignoreBuilder;
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};

use crate::error::GitignoreError;

const PRUNE_DIRS: &[&str] = &["node_modules", "vendor"];

/// True if any ancestor directory of `path` (relative to `root`, excluding the entry's own
/// final component) is hidden (dotfile-style) or in `PRUNE_DIRS`. A `.gitignore` file's own
/// name starts with `.` too, so only its *parents* are checked — the file itself is never
/// pruned by this rule.
fn has_pruned_ancestor(root: &Path, path: &Path) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut components: Vec<_> = rel.components().collect();
    components.pop();
    components.iter().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name.starts_with('.') || PRUNE_DIRS.contains(&name.as_ref())
    })
}

/// Walks the tree pruning hidden dirs / `node_modules` / `vendor`, collects every
/// `.gitignore`, sorts by path, and streams `<rel-path>:<file-bytes>\n` into SHA-256.
pub fn compute_gitignore_hash(root: &Path) -> Result<String, GitignoreError> {
    let mut builder = WalkBuilder::new(root);
    builder.hidden(false).git_ignore(false).git_exclude(false);

    let mut paths: Vec<std::path::PathBuf> = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if has_pruned_ancestor(root, entry.path()) {
            continue;
        }
        if entry.file_name() == ".gitignore" {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort();

    let mut hasher = Sha256::new();
    for path in paths {
        let rel = path.strip_prefix(root).unwrap_or(&path);
        let bytes = std::fs::read(&path).map_err(|source| GitignoreError::Read {
            path: rel.to_string_lossy().to_string(),
            source,
        })?;
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update(b":");
        hasher.update(&bytes);
        hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Strip blank/comment lines and trailing whitespace so a pure-comment edit diffs to
/// nothing (the pattern-diff no-op fast path).
fn normalize_patterns(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|l| l.trim_end())
        .filter(|l| {
            let trimmed = l.trim_start();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct PatternDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Line-level set difference between previous and current root-ignore-file content.
pub fn diff_patterns(previous: Option<&str>, current: &str) -> PatternDiff {
    let previous_set: std::collections::HashSet<String> =
        previous.map(normalize_patterns).unwrap_or_default().into_iter().collect();
    let current_set: std::collections::HashSet<String> = normalize_patterns(current).into_iter().collect();

    PatternDiff {
        added: current_set.difference(&previous_set).cloned().collect(),
        removed: previous_set.difference(&current_set).cloned().collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationStrategy {
    Full,
    Subtree { dir: String },
    PatternDiff { added: Vec<String> },
}

/// Decide which reconciliation strategy applies, per the §4.H.1 condition table.
pub fn decide_strategy(
    changed_path: &str,
    is_root: bool,
    previous_content: Option<&str>,
    current_content: Option<&str>,
) -> ReconciliationStrategy {
    if !is_root {
        let dir = Path::new(changed_path)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        return ReconciliationStrategy::Subtree { dir };
    }

    match (previous_content, current_content) {
        (None, _) => ReconciliationStrategy::Full,
        (Some(_), None) => ReconciliationStrategy::Full,
        (Some(previous), Some(current)) => {
            let diff = diff_patterns(Some(previous), current);
            if !diff.removed.is_empty() {
                ReconciliationStrategy::Full
            } else {
                ReconciliationStrategy::PatternDiff { added: diff.added }
            }
        }
    }
}

/// Build a matcher for a set of raw gitignore-syntax patterns (used by the pattern-diff
/// strategy to test indexed paths against newly added patterns).
pub fn build_matcher(root: &Path, patterns: &[String]) -> Result<ignore::gitignore::Gitignore, GitignoreError> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| GitignoreError::InvalidPattern(e.to_string()))?;
    }
    builder.build().map_err(|e| GitignoreError::InvalidPattern(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_comments_and_blank_lines() {
        let content = "# comment\n\n*.log\n  \ntarget/\n";
        assert_eq!(normalize_patterns(content), vec!["*.log", "target/"]);
    }

    #[test]
    fn diff_detects_added_and_removed() {
        let diff = diff_patterns(Some("*.log\ntarget/"), "*.log\nbuild/");
        assert_eq!(diff.added, vec!["build/".to_string()]);
        assert_eq!(diff.removed, vec!["target/".to_string()]);
    }

    #[test]
    fn comment_only_edit_diffs_to_nothing() {
        let diff = diff_patterns(Some("*.log\n# old comment"), "*.log\n# new comment");
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn nested_ignore_file_always_uses_subtree() {
        let strategy = decide_strategy("src/sub/.gitignore", false, Some("*.log"), Some("*.log\nbuild/"));
        assert_eq!(
            strategy,
            ReconciliationStrategy::Subtree {
                dir: "src/sub".to_string()
            }
        );
    }

    #[test]
    fn root_with_no_prior_content_is_full() {
        let strategy = decide_strategy(".gitignore", true, None, Some("*.log"));
        assert_eq!(strategy, ReconciliationStrategy::Full);
    }

    #[test]
    fn root_with_removed_patterns_is_full() {
        let strategy = decide_strategy(".gitignore", true, Some("*.log\ntarget/"), Some("*.log"));
        assert_eq!(strategy, ReconciliationStrategy::Full);
    }

    #[test]
    fn root_with_only_added_patterns_is_pattern_diff() {
        let strategy = decide_strategy(".gitignore", true, Some("*.log"), Some("*.log\nbuild/"));
        assert_eq!(
            strategy,
            ReconciliationStrategy::PatternDiff {
                added: vec!["build/".to_string()]
            }
        );
    }

    #[test]
    fn deleted_root_ignore_file_is_full() {
        let strategy = decide_strategy(".gitignore", true, Some("*.log"), None);
        assert_eq!(strategy, ReconciliationStrategy::Full);
    }

    #[test]
    fn hash_is_stable_across_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        let a = compute_gitignore_hash(dir.path()).unwrap();
        let b = compute_gitignore_hash(dir.path()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn hash_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        let before = compute_gitignore_hash(dir.path()).unwrap();
        std::fs::write(dir.path().join(".gitignore"), "*.log\nbuild/\n").unwrap();
        let after = compute_gitignore_hash(dir.path()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn hidden_directory_other_than_prune_list_is_excluded_from_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        let baseline = compute_gitignore_hash(dir.path()).unwrap();

        std::fs::create_dir(dir.path().join(".github")).unwrap();
        std::fs::write(dir.path().join(".github").join(".gitignore"), "build/\n").unwrap();
        let with_hidden_dir = compute_gitignore_hash(dir.path()).unwrap();

        assert_eq!(baseline, with_hidden_dir, "a .gitignore under a non-prune-listed hidden dir must not affect the hash");
    }

    #[test]
    fn nested_non_hidden_subdir_ignore_file_is_included_in_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        let baseline = compute_gitignore_hash(dir.path()).unwrap();

        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join(".gitignore"), "build/\n").unwrap();
        let with_nested = compute_gitignore_hash(dir.path()).unwrap();

        assert_ne!(baseline, with_nested, "a .gitignore in an ordinary subdirectory must be included in the hash");
    }

    #[test]
    fn matcher_respects_negation() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = build_matcher(dir.path(), &["*.log".to_string(), "!keep.log".to_string()]).unwrap();
        assert!(matcher.matched("a.log", false).is_ignore());
        assert!(!matcher.matched("keep.log", false).is_ignore());
    }
}
