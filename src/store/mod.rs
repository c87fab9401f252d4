//! Store contracts (§6) and the reference implementations that make the engine runnable
//! without a production metadata/BM25/vector backend wired in.
//!
//! Production backends for these three stores are explicitly out of scope for this crate
//! (see spec §1); what's specified here is the trait surface the core engine is written
//! against, plus one in-memory/on-disk-snapshot implementation of each so the Runner,
//! Coordinator, and search composition can be exercised end-to-end in tests.

pub mod bm25;
pub mod memory;
pub mod vector;

use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::model::{Chunk, File, IndexCheckpoint, Project};

/// A file record augmented with just the fields `ReconcileFilesOnStartup` needs to detect
/// content drift without re-reading every file's content hash.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub path: String,
    pub modified_at: SystemTime,
    pub size_bytes: u64,
}

/// The metadata store contract (§6): projects, files, chunks, embeddings, checkpoints, and
/// the small `State` key/value map, plus the reconciliation-support queries.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn save_project(&self, project: &Project) -> anyhow::Result<()>;
    async fn get_project(&self, id: &str) -> anyhow::Result<Option<Project>>;
    async fn refresh_project_stats(&self, project_id: &str) -> anyhow::Result<()>;

    async fn save_file(&self, file: &File) -> anyhow::Result<()>;
    async fn get_file(&self, id: &str) -> anyhow::Result<Option<File>>;
    async fn get_file_by_path(&self, project_id: &str, path: &str) -> anyhow::Result<Option<File>>;
    async fn list_files(&self, project_id: &str) -> anyhow::Result<Vec<File>>;
    async fn delete_file(&self, id: &str) -> anyhow::Result<()>;

    async fn save_chunks(&self, chunks: &[Chunk]) -> anyhow::Result<()>;
    async fn get_chunks_for_file(&self, file_id: &str) -> anyhow::Result<Vec<Chunk>>;
    async fn get_chunk(&self, id: &str) -> anyhow::Result<Option<Chunk>>;
    async fn delete_chunks(&self, ids: &[String]) -> anyhow::Result<()>;
    /// All chunk IDs currently recorded in metadata (ground truth for consistency checks).
    async fn all_chunk_ids(&self) -> anyhow::Result<Vec<String>>;

    async fn save_embedding(&self, chunk_id: &str, model: &str, vector: Vec<f32>) -> anyhow::Result<()>;
    async fn get_embedding(&self, chunk_id: &str, model: &str) -> anyhow::Result<Option<Vec<f32>>>;
    /// All chunk IDs that have a saved embedding under any model (ground truth for the
    /// consistency checker's invariant #1/#2).
    async fn all_embedded_chunk_ids(&self) -> anyhow::Result<Vec<String>>;

    async fn save_checkpoint(&self, project_id: &str, checkpoint: &IndexCheckpoint) -> anyhow::Result<()>;
    async fn load_checkpoint(&self, project_id: &str) -> anyhow::Result<Option<IndexCheckpoint>>;
    async fn clear_checkpoint(&self, project_id: &str) -> anyhow::Result<()>;

    async fn get_state(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set_state(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// All indexed files with mtime and size, for `ReconcileFilesOnStartup`.
    async fn get_files_for_reconciliation(&self, project_id: &str) -> anyhow::Result<HashMap<String, FileStat>>;
    /// Indexed file paths under a directory prefix, for subtree reconciliation.
    async fn list_file_paths_under(&self, project_id: &str, dir_prefix: &str) -> anyhow::Result<Vec<String>>;
    /// All indexed file paths for a project, for full reconciliation and pattern-diff.
    async fn get_file_paths_by_project(&self, project_id: &str) -> anyhow::Result<Vec<String>>;
}

/// BM25 store contract (§6).
#[async_trait]
pub trait BM25Store: Send + Sync {
    async fn index(&self, docs: &[(String, String)]) -> anyhow::Result<()>;
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<(String, f64, Vec<String>)>>;
    async fn delete(&self, ids: &[String]) -> anyhow::Result<()>;
    async fn all_ids(&self) -> anyhow::Result<Vec<String>>;
    async fn stats(&self) -> anyhow::Result<Bm25Stats>;
    async fn save(&self, path: &Path) -> anyhow::Result<()>;
    async fn load(&self, path: &Path) -> anyhow::Result<()>;
    async fn close(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct Bm25Stats {
    pub document_count: usize,
    pub term_count: usize,
    pub avg_doc_length: f64,
}

/// Vector store contract (§6).
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, ids: &[String], vectors: Vec<Vec<f32>>) -> anyhow::Result<()>;
    async fn search(&self, query_vector: &[f32], k: usize) -> anyhow::Result<Vec<(String, f32)>>;
    async fn delete(&self, ids: &[String]) -> anyhow::Result<()>;
    async fn all_ids(&self) -> anyhow::Result<Vec<String>>;
    async fn contains(&self, id: &str) -> anyhow::Result<bool>;
    async fn count(&self) -> anyhow::Result<usize>;
    async fn save(&self, path: &Path) -> anyhow::Result<()>;
    async fn load(&self, path: &Path) -> anyhow::Result<()>;
    async fn close(&self) -> anyhow::Result<()>;
}
