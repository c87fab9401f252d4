//! Indexer composition (§4.C–D): thin domain wrappers over the BM25/vector stores, fused
//! by `HybridIndexer` with the fail-fast-index / best-effort-delete policy.
//!
//! BM25 indexes chunks directly (it needs the enriched text); the vector side indexes
//! pre-computed `(id, vector)` pairs, since embedding generation is the Runner's job, not
//! the indexer's. The two therefore don't share a single `index` signature — only the
//! delete/clear/stats/close shape is common, captured in `IndexWriter`.

mod bm25_indexer;
mod hybrid_indexer;
mod vector_indexer;

pub use bm25_indexer::BM25Indexer;
pub use hybrid_indexer::HybridIndexer;
pub use vector_indexer::VectorIndexer;

use async_trait::async_trait;

use crate::model::Chunk;
use crate::store::Bm25Stats;

#[derive(Debug, Clone, Default)]
pub struct IndexerStats {
    pub document_count: usize,
    pub term_count: usize,
    pub avg_doc_length: f64,
}

impl From<Bm25Stats> for IndexerStats {
    fn from(s: Bm25Stats) -> Self {
        Self {
            document_count: s.document_count,
            term_count: s.term_count,
            avg_doc_length: s.avg_doc_length,
        }
    }
}

/// Shape shared by `BM25Indexer`/`VectorIndexer`/`HybridIndexer`: Delete/Clear are no-ops
/// on empty input where applicable, Close is idempotent and must fail subsequent writes.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    async fn delete(&self, ids: &[String]) -> anyhow::Result<()>;
    async fn clear(&self) -> anyhow::Result<()>;
    async fn stats(&self) -> anyhow::Result<IndexerStats>;
    async fn close(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ChunkIndexer: IndexWriter {
    async fn index(&self, chunks: &[Chunk]) -> anyhow::Result<()>;
}

#[async_trait]
pub trait VectorIndexWriter: IndexWriter {
    async fn index(&self, ids: &[String], vectors: Vec<Vec<f32>>) -> anyhow::Result<()>;
}
