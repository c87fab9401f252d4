//! Cross-store consistency checking (§3 invariants #1/#2, §4.B).
//!
//! Metadata's embedded-chunks set is ground truth. `Check` computes four set differences
//! against it; `Repair` deletes orphans best-effort and only logs a warning for missing
//! entries, since regenerating them would require re-indexing — not something a consistency
//! pass should do silently.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::store::{BM25Store, MetadataStore, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InconsistencyKind {
    OrphanBm25,
    OrphanVector,
    MissingBm25,
    MissingVector,
}

#[derive(Debug, Clone)]
pub struct Inconsistency {
    pub kind: InconsistencyKind,
    pub chunk_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub checked: usize,
    pub inconsistencies: Vec<Inconsistency>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub orphans_removed: usize,
    pub missing_logged: usize,
}

pub struct ConsistencyChecker {
    metadata: Arc<dyn MetadataStore>,
    bm25: Arc<dyn BM25Store>,
    vector: Arc<dyn VectorStore>,
}

impl ConsistencyChecker {
    pub fn new(metadata: Arc<dyn MetadataStore>, bm25: Arc<dyn BM25Store>, vector: Arc<dyn VectorStore>) -> Self {
        Self { metadata, bm25, vector }
    }

    pub async fn check(&self) -> anyhow::Result<CheckReport> {
        let start = Instant::now();

        let metadata_ids: HashSet<String> = self.metadata.all_embedded_chunk_ids().await?.into_iter().collect();
        let bm25_ids: HashSet<String> = match self.bm25.all_ids().await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list bm25 ids during consistency check");
                HashSet::new()
            }
        };
        let vector_ids: HashSet<String> = match self.vector.all_ids().await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list vector ids during consistency check");
                HashSet::new()
            }
        };

        let mut inconsistencies = Vec::new();
        for id in bm25_ids.difference(&metadata_ids) {
            inconsistencies.push(Inconsistency {
                kind: InconsistencyKind::OrphanBm25,
                chunk_id: id.clone(),
            });
        }
        for id in vector_ids.difference(&metadata_ids) {
            inconsistencies.push(Inconsistency {
                kind: InconsistencyKind::OrphanVector,
                chunk_id: id.clone(),
            });
        }
        for id in metadata_ids.difference(&bm25_ids) {
            inconsistencies.push(Inconsistency {
                kind: InconsistencyKind::MissingBm25,
                chunk_id: id.clone(),
            });
        }
        for id in metadata_ids.difference(&vector_ids) {
            inconsistencies.push(Inconsistency {
                kind: InconsistencyKind::MissingVector,
                chunk_id: id.clone(),
            });
        }

        Ok(CheckReport {
            checked: metadata_ids.len(),
            inconsistencies,
            duration: start.elapsed(),
        })
    }

    pub async fn repair(&self, report: &CheckReport) -> anyhow::Result<RepairReport> {
        let mut orphans_removed = 0;
        let mut missing_logged = 0;

        for inconsistency in &report.inconsistencies {
            match inconsistency.kind {
                InconsistencyKind::OrphanBm25 => {
                    if let Err(e) = self.bm25.delete(&[inconsistency.chunk_id.clone()]).await {
                        tracing::warn!(chunk_id = %inconsistency.chunk_id, error = %e, "failed to remove orphan bm25 entry");
                    } else {
                        orphans_removed += 1;
                    }
                }
                InconsistencyKind::OrphanVector => {
                    if let Err(e) = self.vector.delete(&[inconsistency.chunk_id.clone()]).await {
                        tracing::warn!(chunk_id = %inconsistency.chunk_id, error = %e, "failed to remove orphan vector entry");
                    } else {
                        orphans_removed += 1;
                    }
                }
                InconsistencyKind::MissingBm25 | InconsistencyKind::MissingVector => {
                    tracing::warn!(
                        chunk_id = %inconsistency.chunk_id,
                        kind = ?inconsistency.kind,
                        "chunk missing from store; requires re-index, not auto-repaired"
                    );
                    missing_logged += 1;
                }
            }
        }

        Ok(RepairReport {
            orphans_removed,
            missing_logged,
        })
    }

    /// Cardinality-only comparison: consistent iff all three counts are equal.
    pub async fn quick_check(&self) -> anyhow::Result<bool> {
        let metadata_count = self.metadata.all_embedded_chunk_ids().await?.len();
        let bm25_count = self.bm25.stats().await?.document_count;
        let vector_count = self.vector.count().await?;
        Ok(metadata_count == bm25_count && bm25_count == vector_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::bm25::Bm25Store;
    use crate::store::memory::InMemoryMetadataStore;
    use crate::store::vector::BruteForceVectorStore;

    async fn make_checker() -> (ConsistencyChecker, Arc<dyn MetadataStore>, Arc<dyn BM25Store>, Arc<dyn VectorStore>) {
        let metadata: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let bm25: Arc<dyn BM25Store> = Arc::new(Bm25Store::new());
        let vector: Arc<dyn VectorStore> = Arc::new(BruteForceVectorStore::new());
        let checker = ConsistencyChecker::new(metadata.clone(), bm25.clone(), vector.clone());
        (checker, metadata, bm25, vector)
    }

    #[tokio::test]
    async fn quick_check_passes_when_all_empty() {
        let (checker, _, _, _) = make_checker().await;
        assert!(checker.quick_check().await.unwrap());
    }

    #[tokio::test]
    async fn detects_orphan_bm25_entry() {
        let (checker, _metadata, bm25, _vector) = make_checker().await;
        bm25.index(&[("orphan".to_string(), "text".to_string())]).await.unwrap();

        let report = checker.check().await.unwrap();
        assert_eq!(report.inconsistencies.len(), 1);
        assert_eq!(report.inconsistencies[0].kind, InconsistencyKind::OrphanBm25);
        assert!(!checker.quick_check().await.unwrap());
    }

    #[tokio::test]
    async fn detects_missing_vector_entry() {
        let (checker, metadata, bm25, _vector) = make_checker().await;
        metadata.save_embedding("c1", "model-a", vec![1.0]).await.unwrap();
        bm25.index(&[("c1".to_string(), "text".to_string())]).await.unwrap();

        let report = checker.check().await.unwrap();
        assert!(report
            .inconsistencies
            .iter()
            .any(|i| i.kind == InconsistencyKind::MissingVector && i.chunk_id == "c1"));
    }

    #[tokio::test]
    async fn repair_removes_orphans_and_logs_missing() {
        let (checker, metadata, bm25, _vector) = make_checker().await;
        bm25.index(&[("orphan".to_string(), "text".to_string())]).await.unwrap();
        metadata.save_embedding("missing-everywhere", "model-a", vec![1.0]).await.unwrap();

        let report = checker.check().await.unwrap();
        let repair = checker.repair(&report).await.unwrap();
        assert_eq!(repair.orphans_removed, 1);
        assert!(repair.missing_logged >= 1);
        assert!(bm25.all_ids().await.unwrap().is_empty());
    }
}
