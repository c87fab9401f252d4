//! Flat brute-force cosine vector store.
//!
//! A production vector store (Qdrant, HNSW, ...) is out of scope for this crate — the
//! teacher's `qdrant.rs` specifies the shape (`Point`/`SearchHit`/`add`/`search`/`delete`)
//! that any real backend would need to satisfy. This reference implementation keeps the
//! contract honest with an O(n*d) scan, the same brute-force fallback the rest of the
//! retrieved pack reaches for when no ANN index is wired up.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::VectorStore;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct VectorState {
    vectors: HashMap<String, Vec<f32>>,
    closed: bool,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub struct BruteForceVectorStore {
    state: RwLock<VectorState>,
}

impl BruteForceVectorStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(VectorState::default()),
        }
    }
}

impl Default for BruteForceVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for BruteForceVectorStore {
    async fn add(&self, ids: &[String], vectors: Vec<Vec<f32>>) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        anyhow::ensure!(
            ids.len() == vectors.len(),
            "id/vector count mismatch: {} ids, {} vectors",
            ids.len(),
            vectors.len()
        );
        let mut state = self.state.write().unwrap();
        if state.closed {
            anyhow::bail!("vector store is closed");
        }
        for (id, vector) in ids.iter().zip(vectors) {
            state.vectors.insert(id.clone(), vector);
        }
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], k: usize) -> anyhow::Result<Vec<(String, f32)>> {
        let state = self.state.read().unwrap();
        let mut scored: Vec<(String, f32)> = state
            .vectors
            .iter()
            .map(|(id, v)| (id.clone(), cosine_similarity(query_vector, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete(&self, ids: &[String]) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().unwrap();
        for id in ids {
            state.vectors.remove(id);
        }
        Ok(())
    }

    async fn all_ids(&self) -> anyhow::Result<Vec<String>> {
        let state = self.state.read().unwrap();
        Ok(state.vectors.keys().cloned().collect())
    }

    async fn contains(&self, id: &str) -> anyhow::Result<bool> {
        let state = self.state.read().unwrap();
        Ok(state.vectors.contains_key(id))
    }

    async fn count(&self) -> anyhow::Result<usize> {
        let state = self.state.read().unwrap();
        Ok(state.vectors.len())
    }

    async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let state = self.state.read().unwrap();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*state)?;
        fs::write(path, json)?;
        Ok(())
    }

    async fn load(&self, path: &Path) -> anyhow::Result<()> {
        let json = fs::read_to_string(path)?;
        let loaded: VectorState = serde_json::from_str(&json)?;
        let mut state = self.state.write().unwrap();
        *state = loaded;
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        let mut state = self.state.write().unwrap();
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nearest_neighbor_ranks_closest_first() {
        let store = BruteForceVectorStore::new();
        store
            .add(
                &["a".into(), "b".into()],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].0, "a");
    }

    #[tokio::test]
    async fn contains_and_count() {
        let store = BruteForceVectorStore::new();
        store.add(&["a".into()], vec![vec![1.0]]).await.unwrap();
        assert!(store.contains("a").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mismatched_id_vector_counts_error() {
        let store = BruteForceVectorStore::new();
        let result = store.add(&["a".into(), "b".into()], vec![vec![1.0]]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");

        let store = BruteForceVectorStore::new();
        store.add(&["a".into()], vec![vec![1.0, 2.0]]).await.unwrap();
        store.save(&path).await.unwrap();

        let loaded = BruteForceVectorStore::new();
        loaded.load(&path).await.unwrap();
        assert_eq!(loaded.count().await.unwrap(), 1);
    }
}
