use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{BM25Indexer, ChunkIndexer, IndexWriter, IndexerStats, VectorIndexWriter, VectorIndexer};
use crate::error::HybridIndexError;
use crate::model::Chunk;

/// Composes `BM25Indexer`/`VectorIndexer` with §4.C–D's policy: Index is sequential and
/// fail-fast (BM25 first — a partial write to vector without BM25 is never permitted);
/// Delete/Clear/Close are best-effort, both legs always attempted, errors joined.
pub struct HybridIndexer {
    bm25: BM25Indexer,
    vector: VectorIndexer,
    closed: Mutex<bool>,
    close_bm25_done: AtomicBool,
    close_vector_done: AtomicBool,
}

impl HybridIndexer {
    pub fn new(bm25: BM25Indexer, vector: VectorIndexer) -> Self {
        Self {
            bm25,
            vector,
            closed: Mutex::new(false),
            close_bm25_done: AtomicBool::new(false),
            close_vector_done: AtomicBool::new(false),
        }
    }

    /// BM25 happens-before vector; if BM25 fails, vector is never called.
    pub async fn index(&self, chunks: &[Chunk], embeddings: &HashMap<String, Vec<f32>>) -> anyhow::Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.bm25.index(chunks).await?;

        let mut ids = Vec::with_capacity(chunks.len());
        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if let Some(v) = embeddings.get(&chunk.id) {
                ids.push(chunk.id.clone());
                vectors.push(v.clone());
            }
        }
        self.vector.index(&ids, vectors).await
    }

    pub async fn delete(&self, ids: &[String]) -> Result<(), HybridIndexError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut errors = Vec::new();
        if let Err(e) = self.bm25.delete(ids).await {
            errors.push(e);
        }
        if let Err(e) = self.vector.delete(ids).await {
            errors.push(e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(HybridIndexError::joined(errors))
        }
    }

    pub async fn clear(&self) -> Result<(), HybridIndexError> {
        let mut errors = Vec::new();
        if let Err(e) = self.bm25.clear().await {
            errors.push(e);
        }
        if let Err(e) = self.vector.clear().await {
            errors.push(e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(HybridIndexError::joined(errors))
        }
    }

    pub async fn stats(&self) -> anyhow::Result<IndexerStats> {
        let bm25_stats = self.bm25.stats().await?;
        let vector_stats = self.vector.stats().await?;
        Ok(IndexerStats {
            document_count: bm25_stats.document_count.max(vector_stats.document_count),
            term_count: bm25_stats.term_count,
            avg_doc_length: bm25_stats.avg_doc_length,
        })
    }

    pub async fn close(&self) -> Result<(), HybridIndexError> {
        {
            let mut closed = self.closed.lock().unwrap();
            if *closed {
                return Ok(());
            }
            *closed = true;
        }
        let mut errors = Vec::new();
        if !self.close_bm25_done.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.bm25.close().await {
                errors.push(e);
            }
        }
        if !self.close_vector_done.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.vector.close().await {
                errors.push(e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(HybridIndexError::joined(errors))
        }
    }

    pub async fn save(&self, bm25_path: &std::path::Path, vector_path: &std::path::Path) -> anyhow::Result<()> {
        self.bm25.save(bm25_path).await?;
        self.vector.save(vector_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentType;
    use crate::store::bm25::Bm25Store;
    use crate::store::vector::BruteForceVectorStore;
    use std::sync::Arc;

    fn sample_chunk(id: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            file_id: "f1".to_string(),
            file_path: "a.rs".to_string(),
            language: "rust".to_string(),
            content_type: ContentType::Code,
            line_range: (1, 1),
            raw_content: "fn alpha() {}".to_string(),
            enriched_content: "fn alpha() {}".to_string(),
            file_context: None,
            symbols: vec![],
            metadata: Default::default(),
        }
    }

    fn make_indexer() -> HybridIndexer {
        HybridIndexer::new(
            BM25Indexer::new(Arc::new(Bm25Store::new())),
            VectorIndexer::new(Arc::new(BruteForceVectorStore::new())),
        )
    }

    #[tokio::test]
    async fn index_writes_both_stores() {
        let indexer = make_indexer();
        let mut embeddings = HashMap::new();
        embeddings.insert("c1".to_string(), vec![1.0, 0.0]);
        indexer.index(&[sample_chunk("c1")], &embeddings).await.unwrap();

        let stats = indexer.stats().await.unwrap();
        assert_eq!(stats.document_count, 1);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_only_closes_legs_once() {
        let indexer = make_indexer();
        indexer.close().await.unwrap();
        indexer.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_is_best_effort_on_empty_stores() {
        let indexer = make_indexer();
        indexer.delete(&["missing".to_string()]).await.unwrap();
    }
}
