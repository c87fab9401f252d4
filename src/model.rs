//! Core data types shared by every stage of the indexing pipeline.
//!
//! These mirror the three persisted record kinds (`Project`, `File`, `Chunk`) plus the
//! small bookkeeping types (`IndexCheckpoint`, `State`) that make checkpoint/resume and
//! search-time mismatch detection possible.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A content-type classification used to dispatch chunking and to gate which files the
/// Coordinator and Runner will process at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Code,
    Markdown,
    Text,
    Config,
}

impl ContentType {
    /// Only code and markdown are ever chunked and indexed; text and config are scanned
    /// and recorded but skipped before chunking.
    pub fn is_indexable(self) -> bool {
        matches!(self, ContentType::Code | ContentType::Markdown)
    }
}

/// The kind of a declaration captured by `Symbol`. Left open-ended via `Other` since the
/// language-aware chunkers that produce these (out of scope here) may cover languages this
/// crate has no closed vocabulary for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Method,
    Struct,
    Enum,
    Trait,
    Impl,
    Module,
    Const,
    Other(String),
}

/// A single named declaration inside a chunk (a function, a struct, a markdown heading...).
/// A chunk may enclose more than one symbol, e.g. a small `impl` block with a few methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub line_range: (usize, usize),
    pub signature: Option<String>,
    pub doc_comment: Option<String>,
}

/// The atomic unit of indexing: a contiguous sub-region of a source file.
///
/// `id` is content-addressable — a hash of the canonical content, file path, and line
/// range — so re-chunking unchanged bytes always produces the same identifier (invariant
/// #5 / #3 in the spec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub file_id: String,
    pub file_path: String,
    pub language: String,
    pub content_type: ContentType,
    pub line_range: (usize, usize),
    /// Raw chunk content; used as the embedder input when no enrichment has happened yet.
    pub raw_content: String,
    /// Context prefix + raw content; this is what actually gets embedded and BM25-indexed
    /// once `EnrichChunkWithContext` has run.
    pub enriched_content: String,
    /// Per-file preamble (imports/section headers) captured at chunk time, independent of
    /// the per-chunk contextual description `ContextGenerator` produces later.
    pub file_context: Option<String>,
    pub symbols: Vec<Symbol>,
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Compute the content-addressable chunk ID from its defining inputs. Chunkers
    /// (out of scope) are expected to call this rather than mint their own IDs, so that
    /// the determinism invariant holds regardless of which chunker produced the chunk.
    pub fn compute_id(canonical_content: &str, file_path: &str, line_range: (usize, usize)) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonical_content.as_bytes());
        hasher.update(b"\0");
        hasher.update(file_path.as_bytes());
        hasher.update(b"\0");
        hasher.update(line_range.0.to_le_bytes());
        hasher.update(line_range.1.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A project file record. `id` is a hash of the owning project's ID and the relative path,
/// so it is stable across re-scans without needing a database-assigned surrogate key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub project_id: String,
    pub path: String,
    pub size_bytes: u64,
    /// Truncated to second precision: filesystem mtime resolution varies across platforms
    /// and this is also the precision `ReconcileFilesOnStartup` compares against.
    pub modified_at: SystemTime,
    pub content_hash: String,
    pub language: String,
    pub content_type: ContentType,
}

impl File {
    pub fn compute_id(project_id: &str, path: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(project_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(path.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Truncate a `SystemTime` to second precision, matching the comparison basis used by
    /// `ReconcileFilesOnStartup` and stored `modified_at` values.
    pub fn truncate_to_secs(t: SystemTime) -> SystemTime {
        match t.duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => std::time::UNIX_EPOCH + std::time::Duration::from_secs(d.as_secs()),
            Err(_) => std::time::UNIX_EPOCH,
        }
    }
}

/// Top-level container for an indexed project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub root_path: String,
    pub project_type: String,
    pub file_count: usize,
    pub chunk_count: usize,
    pub indexed_at: SystemTime,
    pub schema_version: u32,
}

impl Project {
    pub fn compute_id(root_path: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"project\0");
        hasher.update(root_path.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// The current schema version written into freshly created `Project` records.
pub const SCHEMA_VERSION: u32 = 1;

/// Resumable progress marker for the Runner's embed stage. Written after every embedding
/// batch and cleared on successful completion — the checkpoint *is* the resume contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexCheckpoint {
    pub stage: CheckpointStage,
    pub total_chunks: usize,
    pub embedded_count: usize,
    pub embedder_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointStage {
    Embedding,
    Indexing,
}

/// Well-known keys for the small key/value `State` map persisted in the metadata store.
pub mod state_keys {
    pub const GITIGNORE_HASH: &str = "gitignore_hash";
    pub const GITIGNORE_CONTENT: &str = "gitignore_content";
    pub const INDEX_DIMENSION: &str = "index_dimension";
    pub const INDEX_MODEL: &str = "index_model";
    pub const CHUNK_ID_VERSION: &str = "chunk_id_version";
}

/// Current chunk-ID scheme version, written to `state_keys::CHUNK_ID_VERSION` at the end
/// of a successful full index.
pub const CHUNK_ID_SCHEME_VERSION: &str = "1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic() {
        let a = Chunk::compute_id("fn foo() {}", "src/lib.rs", (1, 3));
        let b = Chunk::compute_id("fn foo() {}", "src/lib.rs", (1, 3));
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_id_changes_with_any_input() {
        let base = Chunk::compute_id("fn foo() {}", "src/lib.rs", (1, 3));
        assert_ne!(base, Chunk::compute_id("fn bar() {}", "src/lib.rs", (1, 3)));
        assert_ne!(base, Chunk::compute_id("fn foo() {}", "src/main.rs", (1, 3)));
        assert_ne!(base, Chunk::compute_id("fn foo() {}", "src/lib.rs", (1, 4)));
    }

    #[test]
    fn file_id_depends_on_project_and_path() {
        let a = File::compute_id("proj1", "src/lib.rs");
        let b = File::compute_id("proj2", "src/lib.rs");
        assert_ne!(a, b);
    }

    #[test]
    fn content_type_indexable() {
        assert!(ContentType::Code.is_indexable());
        assert!(ContentType::Markdown.is_indexable());
        assert!(!ContentType::Text.is_indexable());
        assert!(!ContentType::Config.is_indexable());
    }

    #[test]
    fn truncate_to_secs_drops_subsecond_part() {
        let t = std::time::UNIX_EPOCH + std::time::Duration::from_millis(1_500);
        let truncated = File::truncate_to_secs(t);
        assert_eq!(truncated, std::time::UNIX_EPOCH + std::time::Duration::from_secs(1));
    }
}
