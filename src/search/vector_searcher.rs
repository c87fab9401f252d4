use std::sync::Arc;

use super::SearchResult;
use crate::embedder::Embedder;
use crate::store::VectorStore;

/// Prefix applied to every query before embedding, producing asymmetric embeddings tuned
/// for query↔document retrieval rather than symmetric query↔query similarity.
const QUERY_INSTRUCTION_PREFIX: &str =
    "Instruct: Given a code search query, retrieve relevant code snippets that answer the query\nQuery: ";

pub struct VectorSearcher {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl VectorSearcher {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SearchResult>> {
        let prefixed = format!("{QUERY_INSTRUCTION_PREFIX}{query}");
        let vector = self
            .embedder
            .embed(&prefixed)
            .await
            .map_err(anyhow::Error::from)?;
        let hits = self.store.search(&vector, limit).await?;
        Ok(hits
            .into_iter()
            .map(|(id, score)| SearchResult {
                chunk_id: id,
                score: score as f64,
                matched_terms: Vec::new(),
            })
            .collect())
    }
}
