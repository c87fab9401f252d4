use std::collections::HashMap;

use super::{BM25Searcher, SearchResult, VectorSearcher};
use crate::error::FusionError;

#[derive(Debug, Clone)]
pub struct FusionConfig {
    pub bm25_weight: f64,
    pub semantic_weight: f64,
    pub k: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            bm25_weight: 0.35,
            semantic_weight: 0.65,
            k: 60.0,
        }
    }
}

/// Composes `BM25Searcher`/`VectorSearcher`, either of which may be absent (delegate
/// directly to the other with no RRF), via Reciprocal Rank Fusion with graceful
/// degradation on a single-leg failure.
pub struct FusionSearcher {
    bm25: Option<BM25Searcher>,
    vector: Option<VectorSearcher>,
    config: FusionConfig,
}

impl FusionSearcher {
    pub fn new(bm25: Option<BM25Searcher>, vector: Option<VectorSearcher>, config: FusionConfig) -> Self {
        Self { bm25, vector, config }
    }

    pub async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SearchResult>> {
        match (&self.bm25, &self.vector) {
            (Some(bm25), None) => bm25.search(query, limit).await,
            (None, Some(vector)) => vector.search(query, limit).await,
            (None, None) => Ok(Vec::new()),
            (Some(bm25), Some(vector)) => self.search_fused(bm25, vector, query, limit).await,
        }
    }

    async fn search_fused(
        &self,
        bm25: &BM25Searcher,
        vector: &VectorSearcher,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<SearchResult>> {
        let fetch = (2 * limit).max(20);
        let (bm25_result, vector_result) = tokio::join!(bm25.search(query, fetch), vector.search(query, fetch));

        match (bm25_result, vector_result) {
            (Err(bm25_err), Err(vector_err)) => Err(FusionError::BothFailed {
                bm25: bm25_err,
                vector: vector_err,
            }
            .into()),
            (Ok(bm25_hits), Err(_)) => Ok(truncate(bm25_hits, limit)),
            (Err(_), Ok(vector_hits)) => Ok(truncate(vector_hits, limit)),
            (Ok(bm25_hits), Ok(vector_hits)) => Ok(reciprocal_rank_fusion(
                &bm25_hits,
                &vector_hits,
                self.config.bm25_weight,
                self.config.semantic_weight,
                self.config.k,
                limit,
            )),
        }
    }
}

fn truncate(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.truncate(limit);
    results
}

/// `score = Σ w_i / (k + rank_i + 1)` over each result list, summed per chunk ID. Ties are
/// broken by ID ascending for a fully deterministic ordering given the same inputs.
/// `matched_terms` is taken from the BM25 side when present.
pub fn reciprocal_rank_fusion(
    bm25_results: &[SearchResult],
    vector_results: &[SearchResult],
    bm25_weight: f64,
    semantic_weight: f64,
    k: f64,
    limit: usize,
) -> Vec<SearchResult> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut matched_terms: HashMap<String, Vec<String>> = HashMap::new();

    for (rank, result) in bm25_results.iter().enumerate() {
        *scores.entry(result.chunk_id.clone()).or_insert(0.0) += bm25_weight / (k + rank as f64 + 1.0);
        matched_terms.insert(result.chunk_id.clone(), result.matched_terms.clone());
    }
    for (rank, result) in vector_results.iter().enumerate() {
        *scores.entry(result.chunk_id.clone()).or_insert(0.0) += semantic_weight / (k + rank as f64 + 1.0);
    }

    let mut fused: Vec<SearchResult> = scores
        .into_iter()
        .map(|(chunk_id, score)| {
            let matched = matched_terms.remove(&chunk_id).unwrap_or_default();
            SearchResult {
                chunk_id,
                score,
                matched_terms: matched,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    fused.truncate(limit);
    fused
}
