use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{ChunkIndexer, IndexWriter, IndexerStats};
use crate::model::Chunk;
use crate::store::BM25Store;

pub struct BM25Indexer {
    store: Arc<dyn BM25Store>,
    closed: AtomicBool,
}

impl BM25Indexer {
    pub fn new(store: Arc<dyn BM25Store>) -> Self {
        Self {
            store,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.closed.load(Ordering::SeqCst), "bm25 indexer is closed");
        Ok(())
    }
}

#[async_trait]
impl ChunkIndexer for BM25Indexer {
    async fn index(&self, chunks: &[Chunk]) -> anyhow::Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.ensure_open()?;
        let docs: Vec<(String, String)> = chunks
            .iter()
            .map(|c| (c.id.clone(), c.enriched_content.clone()))
            .collect();
        self.store.index(&docs).await
    }
}

#[async_trait]
impl IndexWriter for BM25Indexer {
    async fn delete(&self, ids: &[String]) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store.delete(ids).await
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let ids = self.store.all_ids().await?;
        self.store.delete(&ids).await
    }

    async fn stats(&self) -> anyhow::Result<IndexerStats> {
        Ok(self.store.stats().await?.into())
    }

    async fn close(&self) -> anyhow::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.store.close().await
    }
}

impl BM25Indexer {
    pub async fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        self.store.save(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentType;
    use crate::store::bm25::Bm25Store;

    fn sample_chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            file_id: "f1".to_string(),
            file_path: "a.rs".to_string(),
            language: "rust".to_string(),
            content_type: ContentType::Code,
            line_range: (1, 1),
            raw_content: content.to_string(),
            enriched_content: content.to_string(),
            file_context: None,
            symbols: vec![],
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn index_and_clear_round_trip() {
        let indexer = BM25Indexer::new(Arc::new(Bm25Store::new()));
        indexer.index(&[sample_chunk("c1", "fn alpha() {}")]).await.unwrap();
        assert_eq!(indexer.stats().await.unwrap().document_count, 1);
        indexer.clear().await.unwrap();
        assert_eq!(indexer.stats().await.unwrap().document_count, 0);
    }

    #[tokio::test]
    async fn closed_indexer_rejects_index() {
        let indexer = BM25Indexer::new(Arc::new(Bm25Store::new()));
        indexer.close().await.unwrap();
        // Closing again is idempotent.
        indexer.close().await.unwrap();
        let result = indexer.index(&[sample_chunk("c1", "text")]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_input_is_noop() {
        let indexer = BM25Indexer::new(Arc::new(Bm25Store::new()));
        indexer.index(&[]).await.unwrap();
        indexer.delete(&[]).await.unwrap();
        assert_eq!(indexer.stats().await.unwrap().document_count, 0);
    }
}
