//! Scanner contract (§6) and the reference `ignore`-crate-backed implementation.
//!
//! Grounded on the teacher's `Indexer::collect_files`, which drives an `ignore::WalkBuilder`
//! over the project root with hidden/vendor-dir filtering baked in. That walk is promoted
//! here to the full `Scanner` contract (subtree scans, language/content-type detection, a
//! cache-invalidation hook for the coordinator's reconciliation passes).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ignore::WalkBuilder;

use crate::model::ContentType;

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: String,
    pub size_bytes: u64,
    pub modified_at: std::time::SystemTime,
}

#[derive(Debug, Clone)]
pub struct ScanError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum ScanEvent {
    File(ScannedFile),
    Error(ScanError),
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        // Always excluded regardless of config, per the Runner's scan stage.
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: vec!["**/.amanmcp/**".to_string()],
        }
    }
}

impl ScanOptions {
    pub fn with_excludes(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.exclude_patterns.extend(patterns);
        self
    }
}

/// The tree-walking/ignore-filtering contract. Everything else in the crate (Runner,
/// Coordinator's reconciliation strategies) is written against this trait, not a concrete
/// walker, so a production scanner can be swapped in without touching the engine.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, root: &Path, opts: &ScanOptions) -> anyhow::Result<Vec<ScanEvent>>;
    async fn scan_subtree(&self, root: &Path, subtree: &Path, opts: &ScanOptions) -> anyhow::Result<Vec<ScanEvent>>;
    /// Invalidate any cached ignore-rule state; the coordinator calls this before every
    /// ignore-driven reconciliation pass.
    fn invalidate_gitignore_cache(&self);
    fn detect_language(&self, path: &Path) -> String;
    fn detect_content_type(&self, language: &str) -> ContentType;
}

const VENDOR_DIRS: &[&str] = &["node_modules", "vendor", "target", ".git", ".amanmcp"];

/// `ignore::WalkBuilder`-driven reference scanner. No ignore-rule caching happens to need
/// invalidating today (`WalkBuilder` re-reads `.gitignore` files fresh on every walk), so
/// `invalidate_gitignore_cache` is a documented no-op kept to satisfy the contract.
pub struct IgnoreScanner;

impl IgnoreScanner {
    pub fn new() -> Self {
        Self
    }

    fn walk(&self, root: &Path, subtree: Option<&Path>, opts: &ScanOptions) -> Vec<ScanEvent> {
        let walk_root = subtree.map(|s| root.join(s)).unwrap_or_else(|| root.to_path_buf());
        let mut builder = WalkBuilder::new(&walk_root);
        builder.hidden(false).git_ignore(true).git_exclude(true);

        // Exclude patterns use plain .gitignore glob syntax, so reuse the same
        // `GitignoreBuilder` the gitignore-reconciliation strategies match with, rather
        // than the `ignore` crate's separately-semantic (whitelist-by-default) overrides.
        let exclude_matcher = crate::gitignore::build_matcher(&walk_root, &opts.exclude_patterns).ok();

        let mut events = Vec::new();
        for entry in builder.build() {
            match entry {
                Ok(entry) => {
                    if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                        continue;
                    }
                    let path = entry.path();
                    if path
                        .components()
                        .any(|c| VENDOR_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
                    {
                        continue;
                    }
                    if let Some(matcher) = &exclude_matcher {
                        if matcher.matched(path, false).is_ignore() {
                            continue;
                        }
                    }
                    match entry.metadata() {
                        Ok(meta) => {
                            let rel = path.strip_prefix(root).unwrap_or(path).to_path_buf();
                            events.push(ScanEvent::File(ScannedFile {
                                path: rel.to_string_lossy().replace('\\', "/"),
                                size_bytes: meta.len(),
                                modified_at: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                            }));
                        }
                        Err(e) => events.push(ScanEvent::Error(ScanError {
                            path: path.to_string_lossy().to_string(),
                            message: e.to_string(),
                        })),
                    }
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();
                    events.push(ScanEvent::Error(ScanError {
                        path,
                        message: e.to_string(),
                    }));
                }
            }
        }
        events
    }
}

impl Default for IgnoreScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scanner for IgnoreScanner {
    async fn scan(&self, root: &Path, opts: &ScanOptions) -> anyhow::Result<Vec<ScanEvent>> {
        let root = root.to_path_buf();
        let opts = opts.clone();
        Ok(self.walk(&root, None, &opts))
    }

    async fn scan_subtree(&self, root: &Path, subtree: &Path, opts: &ScanOptions) -> anyhow::Result<Vec<ScanEvent>> {
        Ok(self.walk(root, Some(subtree), opts))
    }

    fn invalidate_gitignore_cache(&self) {}

    fn detect_language(&self, path: &Path) -> String {
        detect_language(path)
    }

    fn detect_content_type(&self, language: &str) -> ContentType {
        detect_content_type(language)
    }
}

/// Extension-based language detection. Out-of-scope for real multi-language support (a
/// proper chunker would want this too), but enough to route the content-type dispatch.
pub fn detect_language(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("js") | Some("mjs") | Some("cjs") => "javascript",
        Some("ts") | Some("tsx") => "typescript",
        Some("go") => "go",
        Some("java") => "java",
        Some("c") | Some("h") => "c",
        Some("cpp") | Some("cc") | Some("hpp") => "cpp",
        Some("md") | Some("markdown") => "markdown",
        Some("toml") => "toml",
        Some("yaml") | Some("yml") => "yaml",
        Some("json") => "json",
        Some("txt") => "text",
        _ => "unknown",
    }
    .to_string()
}

pub fn detect_content_type(language: &str) -> ContentType {
    match language {
        "markdown" => ContentType::Markdown,
        "toml" | "yaml" | "json" => ContentType::Config,
        "text" | "unknown" => ContentType::Text,
        _ => ContentType::Code,
    }
}

/// Detect a binary file via a null byte within the first 512 bytes, matching the
/// Coordinator's `indexFile` binary-detection rule.
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(512).any(|&b| b == 0)
}

pub fn path_display(path: &Path) -> String {
    let mut buf = PathBuf::new();
    buf.push(path);
    buf.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_languages() {
        assert_eq!(detect_language(Path::new("src/main.rs")), "rust");
        assert_eq!(detect_language(Path::new("README.md")), "markdown");
        assert_eq!(detect_language(Path::new("unknown.xyz")), "unknown");
    }

    #[test]
    fn content_type_follows_language() {
        assert_eq!(detect_content_type("rust"), ContentType::Code);
        assert_eq!(detect_content_type("markdown"), ContentType::Markdown);
        assert_eq!(detect_content_type("toml"), ContentType::Config);
        assert_eq!(detect_content_type("unknown"), ContentType::Text);
    }

    #[test]
    fn binary_detection_scans_first_512_bytes() {
        assert!(!looks_binary(b"hello world"));
        let mut with_null = vec![b'a'; 10];
        with_null.push(0);
        assert!(looks_binary(&with_null));

        let mut late_null = vec![b'a'; 600];
        late_null[550] = 0;
        assert!(!looks_binary(&late_null));
    }

    #[tokio::test]
    async fn scans_files_in_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/skip.js"), "ignored").unwrap();

        let scanner = IgnoreScanner::new();
        let events = scanner.scan(dir.path(), &ScanOptions::default()).await.unwrap();
        let files: Vec<_> = events
            .into_iter()
            .filter_map(|e| match e {
                ScanEvent::File(f) => Some(f.path),
                ScanEvent::Error(_) => None,
            })
            .collect();
        assert!(files.iter().any(|p| p == "a.rs"));
        assert!(!files.iter().any(|p| p.contains("node_modules")));
    }
}
