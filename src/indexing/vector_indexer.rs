use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{IndexWriter, IndexerStats, VectorIndexWriter};
use crate::store::VectorStore;

pub struct VectorIndexer {
    store: Arc<dyn VectorStore>,
    closed: AtomicBool,
}

impl VectorIndexer {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.closed.load(Ordering::SeqCst), "vector indexer is closed");
        Ok(())
    }
}

#[async_trait]
impl VectorIndexWriter for VectorIndexer {
    async fn index(&self, ids: &[String], vectors: Vec<Vec<f32>>) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.ensure_open()?;
        self.store.add(ids, vectors).await
    }
}

#[async_trait]
impl IndexWriter for VectorIndexer {
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
        Ok(IndexerStats {
            document_count: self.store.count().await?,
            term_count: 0,
            avg_doc_length: 0.0,
        })
    }

    async fn close(&self) -> anyhow::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.store.close().await
    }
}

impl VectorIndexer {
    pub async fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        self.store.save(path).await
    }
}
