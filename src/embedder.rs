//! Embedder contract (§6) and a reference deterministic implementation.
//!
//! The trait surface mirrors the teacher's `EmbeddingProvider` (`embeddings/mod.rs`):
//! `embed`/`embed_batch`/`dimensions`/`model_name`, widened with the batch-index and
//! final-batch hints the Runner's embed stage needs for thermal-throttle-aware backends,
//! plus `close` for symmetry with the two store traits.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedder unavailable: {0}")]
    Unavailable(String),
    #[error("embed request failed: {0}")]
    Request(#[source] anyhow::Error),
    #[error("embedder is closed")]
    Closed,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
    fn dimensions(&self) -> usize;
    fn model_name(&self) -> &str;
    /// Cheap availability probe; real implementations bound this with a ~2s sub-timeout.
    async fn available(&self) -> bool;
    /// Hint: the index of the batch about to run, for throttle-aware backends.
    fn set_batch_index(&self, index: usize);
    /// Hint: whether the next `embed_batch` call is the last one in the run.
    fn set_final_batch(&self, is_final: bool);
    async fn close(&self) -> anyhow::Result<()>;
}

/// Hash-projected pseudo-embeddings: no network calls, fully deterministic, suitable for
/// tests and for exercising the engine without a real embedding provider wired in. Not a
/// semantically meaningful embedding — just stable enough that identical text always
/// produces identical vectors and distinct text produces distinct ones with overwhelming
/// probability.
pub struct DeterministicEmbedder {
    dimensions: usize,
    model_name: String,
    closed: AtomicBool,
    batch_index: AtomicUsize,
    final_batch: AtomicBool,
}

impl DeterministicEmbedder {
    pub fn new(dimensions: usize, model_name: impl Into<String>) -> Self {
        Self {
            dimensions,
            model_name: model_name.into(),
            closed: AtomicBool::new(false),
            batch_index: AtomicUsize::new(0),
            final_batch: AtomicBool::new(false),
        }
    }

    fn project(&self, text: &str) -> Vec<f32> {
        let mut out = vec![0.0f32; self.dimensions.max(1)];
        let mut counter: u32 = 0;
        while (counter as usize) * 8 < out.len() {
            let mut hasher = Sha256::new();
            hasher.update(counter.to_le_bytes());
            hasher.update(text.as_bytes());
            let digest = hasher.finalize();
            for (i, chunk) in digest.chunks(4).enumerate() {
                let idx = (counter as usize) * 8 + i;
                if idx >= out.len() {
                    break;
                }
                let mut buf = [0u8; 4];
                buf.copy_from_slice(chunk);
                out[idx] = i32::from_le_bytes(buf) as f32 / i32::MAX as f32;
            }
            counter += 1;
        }
        out.truncate(self.dimensions);
        let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut out {
                *v /= norm;
            }
        }
        out
    }
}

#[async_trait]
impl Embedder for DeterministicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Closed);
        }
        Ok(self.project(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Closed);
        }
        Ok(texts.iter().map(|t| self.project(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn available(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn set_batch_index(&self, index: usize) {
        self.batch_index.store(index, Ordering::SeqCst);
    }

    fn set_final_batch(&self, is_final: bool) {
        self.final_batch.store(is_final, Ordering::SeqCst);
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let embedder = DeterministicEmbedder::new(16, "det-v1");
        let a = embedder.embed("hello world").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn distinct_text_produces_distinct_vectors() {
        let embedder = DeterministicEmbedder::new(16, "det-v1");
        let a = embedder.embed("alpha").await.unwrap();
        let b = embedder.embed("beta").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn closed_embedder_rejects_embed() {
        let embedder = DeterministicEmbedder::new(8, "det-v1");
        embedder.close().await.unwrap();
        assert!(!embedder.available().await);
        assert!(matches!(embedder.embed("x").await, Err(EmbeddingError::Closed)));
    }

    #[tokio::test]
    async fn embed_batch_matches_individual_embed() {
        let embedder = DeterministicEmbedder::new(8, "det-v1");
        let batch = embedder
            .embed_batch(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        let single_one = embedder.embed("one").await.unwrap();
        assert_eq!(batch[0], single_one);
    }
}
