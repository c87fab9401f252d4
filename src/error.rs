//! Per-component error enums.
//!
//! Each component owns one `thiserror`-derived enum rather than sharing a grab-bag error
//! type, matching the split the teacher already uses between `ManifestError`,
//! `WatcherError`, and `EmbeddingError`. Call sites that only need to propagate use
//! `anyhow::Result` (see `indexer.rs`/`qdrant.rs` in the teacher for that convention).

use thiserror::Error;

/// Errors that can abort the Runner's full-project pipeline.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("missing required dependency: {0}")]
    MissingDependency(&'static str),

    #[error("scan stage failed: {0}")]
    Scan(#[source] anyhow::Error),

    #[error("store operation failed: {0}")]
    Store(#[source] anyhow::Error),

    #[error("embedding failed: {0}")]
    Embed(#[source] anyhow::Error),

    #[error(
        "embedder model mismatch on resume: checkpoint was built with '{checkpoint_model}', \
         current embedder is '{current_model}' — force a rebuild or restore the original embedder"
    )]
    ModelMismatch {
        checkpoint_model: String,
        current_model: String,
    },

    #[error("cancelled at {completed}/{total} chunks")]
    Cancelled { completed: usize, total: usize },
}

/// Errors surfaced by `HybridIndexer`. `Index` failures fail-fast and pass through the
/// first leg's raw error rather than wrapping it, since there can only ever be one.
#[derive(Debug, Error)]
pub enum HybridIndexError {
    #[error("bm25 index failed: {0}")]
    Bm25(#[source] anyhow::Error),

    #[error("vector index failed: {0}")]
    Vector(#[source] anyhow::Error),

    #[error("{count} operation(s) failed: {message}")]
    Joined { count: usize, message: String },

    #[error("indexer is closed")]
    Closed,
}

impl HybridIndexError {
    /// Build a `Joined` variant from the per-leg failures collected by a best-effort
    /// operation (`Delete`/`Clear`/`Close`); both legs are always attempted first.
    pub fn joined(errors: Vec<anyhow::Error>) -> Self {
        let message = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        HybridIndexError::Joined {
            count: errors.len(),
            message,
        }
    }
}

/// Errors surfaced by `FusionSearcher`.
#[derive(Debug, Error)]
pub enum FusionError {
    #[error("both searchers failed: bm25: {bm25}; vector: {vector}")]
    BothFailed {
        bm25: anyhow::Error,
        vector: anyhow::Error,
    },
}

/// Errors that can arise while computing or applying a gitignore reconciliation.
#[derive(Debug, Error)]
pub enum GitignoreError {
    #[error("failed to read ignore file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk project tree: {0}")]
    Walk(#[source] anyhow::Error),

    #[error("invalid gitignore pattern: {0}")]
    InvalidPattern(String),
}
