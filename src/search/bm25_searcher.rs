use std::sync::Arc;

use super::SearchResult;
use crate::store::BM25Store;

pub struct BM25Searcher {
    store: Arc<dyn BM25Store>,
}

impl BM25Searcher {
    pub fn new(store: Arc<dyn BM25Store>) -> Self {
        Self { store }
    }

    pub async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SearchResult>> {
        let hits = self.store.search(query, limit).await?;
        Ok(hits
            .into_iter()
            .map(|(id, score, matched)| SearchResult {
                chunk_id: id,
                score,
                matched_terms: matched,
            })
            .collect())
    }
}
