//! Coordinator (§4.H): event-driven incremental updates plus startup reconciliation.
//!
//! Owns a single write mutex, matching the teacher's `Indexer`'s `Arc<RwLock<_>>`-guarded
//! mutation paths — except coalesced into one lock since every mutation here (index/remove
//! a file, reconcile) ultimately touches the same three stores together.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cancel::Cancellation;
use crate::embedder::Embedder;
use crate::gitignore::{self, ReconciliationStrategy};
use crate::indexing::HybridIndexer;
use crate::model::{state_keys, File};
use crate::runner::Chunker;
use crate::scanner::{looks_binary, ScanEvent, ScanOptions, Scanner};
use crate::store::MetadataStore;

const MAX_FILE_SIZE_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone)]
pub enum Event {
    Create { path: String },
    Modify { path: String },
    Delete { path: String },
    GitignoreChange { path: String, is_root: bool },
    ConfigChange,
}

#[derive(Debug, Clone)]
pub struct EventOutcome {
    pub path: Option<String>,
    pub error: Option<String>,
}

pub struct CoordinatorConfig {
    pub root: std::path::PathBuf,
    pub project_id: String,
    pub max_file_size_bytes: u64,
}

pub struct Coordinator {
    config: CoordinatorConfig,
    metadata: Arc<dyn MetadataStore>,
    indexer: Arc<HybridIndexer>,
    scanner: Arc<dyn Scanner>,
    code_chunker: Arc<dyn Chunker>,
    markdown_chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    write_lock: Mutex<()>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        metadata: Arc<dyn MetadataStore>,
        indexer: Arc<HybridIndexer>,
        scanner: Arc<dyn Scanner>,
        code_chunker: Arc<dyn Chunker>,
        markdown_chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            config,
            metadata,
            indexer,
            scanner,
            code_chunker,
            markdown_chunker,
            embedder,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn handle_events(&self, events: Vec<Event>) -> Vec<EventOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut outcomes = Vec::with_capacity(events.len());
        let mut any_succeeded = false;

        for event in events {
            let outcome = match event {
                Event::Create { path } | Event::Modify { path } => match self.index_file_locked(&path).await {
                    Ok(()) => {
                        any_succeeded = true;
                        EventOutcome { path: Some(path), error: None }
                    }
                    Err(e) => EventOutcome {
                        path: Some(path),
                        error: Some(e.to_string()),
                    },
                },
                Event::Delete { path } => match self.remove_file_locked(&path).await {
                    Ok(()) => {
                        any_succeeded = true;
                        EventOutcome { path: Some(path), error: None }
                    }
                    Err(e) => EventOutcome {
                        path: Some(path),
                        error: Some(e.to_string()),
                    },
                },
                Event::GitignoreChange { path, is_root } => match self.handle_gitignore_change(&path, is_root).await {
                    Ok(()) => {
                        any_succeeded = true;
                        EventOutcome { path: Some(path), error: None }
                    }
                    Err(e) => EventOutcome {
                        path: Some(path),
                        error: Some(e.to_string()),
                    },
                },
                Event::ConfigChange => match self.handle_config_change().await {
                    Ok(()) => {
                        any_succeeded = true;
                        EventOutcome { path: None, error: None }
                    }
                    Err(e) => EventOutcome { path: None, error: Some(e.to_string()) },
                },
            };
            if let Some(err) = &outcome.error {
                tracing::warn!(path = ?outcome.path, error = %err, "event processing failed, continuing batch");
            }
            outcomes.push(outcome);
        }

        if any_succeeded {
            if let Err(e) = self.metadata.refresh_project_stats(&self.config.project_id).await {
                tracing::warn!(error = %e, "failed to refresh project stats after event batch");
            }
        }
        outcomes
    }

    pub async fn index_file(&self, path: &str) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        self.index_file_locked(path).await
    }

    async fn index_file_locked(&self, path: &str) -> anyhow::Result<()> {
        let full_path = self.config.root.join(path);

        let symlink_meta = std::fs::symlink_metadata(&full_path)?;
        if symlink_meta.file_type().is_symlink() {
            anyhow::bail!("skipping symlink: {path}");
        }
        if symlink_meta.len() > self.config.max_file_size_bytes {
            tracing::warn!(path, size = symlink_meta.len(), "skipping oversized file");
            return Ok(());
        }

        let bytes = std::fs::read(&full_path)?;
        if looks_binary(&bytes) {
            // Binary files are skipped silently per spec — no warning.
            return Ok(());
        }

        let language = self.scanner.detect_language(Path::new(path));
        let content_type = self.scanner.detect_content_type(&language);
        if !content_type.is_indexable() {
            return Ok(());
        }

        // Best-effort: a modification replaces cleanly by removing stale chunks first.
        let _ = self.remove_file_locked(path).await;

        let file_id = File::compute_id(&self.config.project_id, path);
        let content = String::from_utf8_lossy(&bytes).to_string();
        let file = File {
            id: file_id,
            project_id: self.config.project_id.clone(),
            path: path.to_string(),
            size_bytes: symlink_meta.len(),
            modified_at: File::truncate_to_secs(symlink_meta.modified()?),
            content_hash: sha256_hex(&bytes),
            language,
            content_type,
        };
        self.metadata.save_file(&file).await?;

        let chunker = if content_type == crate::model::ContentType::Markdown {
            &self.markdown_chunker
        } else {
            &self.code_chunker
        };
        let chunks = chunker.chunk(&file, &content)?;
        self.metadata.save_chunks(&chunks).await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.enriched_content.clone()).collect();
        let mut embeddings = std::collections::HashMap::new();
        if !texts.is_empty() {
            match self.embedder.embed_batch(&texts).await {
                Ok(vectors) => {
                    for (chunk, vector) in chunks.iter().zip(vectors.into_iter()) {
                        if let Err(e) = self
                            .metadata
                            .save_embedding(&chunk.id, self.embedder.model_name(), vector.clone())
                            .await
                        {
                            tracing::warn!(path, chunk_id = %chunk.id, error = %e, "failed to persist embedding");
                        }
                        embeddings.insert(chunk.id.clone(), vector);
                    }
                }
                Err(e) => {
                    tracing::warn!(path, error = %e, "embedding generation failed, indexing into bm25 only");
                }
            }
        }
        self.indexer.index(&chunks, &embeddings).await?;
        Ok(())
    }

    pub async fn remove_file(&self, path: &str) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        self.remove_file_locked(path).await
    }

    async fn remove_file_locked(&self, path: &str) -> anyhow::Result<()> {
        let file_id = File::compute_id(&self.config.project_id, path);
        let chunks = self.metadata.get_chunks_for_file(&file_id).await?;

        if chunks.is_empty() {
            if let Err(e) = self.metadata.delete_file(&file_id).await {
                tracing::warn!(path, error = %e, "failed to delete file record with no chunks");
            }
            return Ok(());
        }

        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        if let Err(e) = self.indexer.delete(&chunk_ids).await {
            tracing::warn!(path, error = %e, "failed to delete chunks from bm25/vector stores");
        }
        self.metadata.delete_file(&file_id).await?;
        Ok(())
    }

    async fn handle_gitignore_change(&self, changed_path: &str, is_root: bool) -> anyhow::Result<()> {
        self.scanner.invalidate_gitignore_cache();

        let previous_content = self.metadata.get_state(state_keys::GITIGNORE_CONTENT).await?;
        let full_path = self.config.root.join(changed_path);
        let current_content = std::fs::read_to_string(&full_path).ok();

        let strategy = gitignore::decide_strategy(
            changed_path,
            is_root,
            previous_content.as_deref(),
            current_content.as_deref(),
        );

        match strategy {
            ReconciliationStrategy::Subtree { dir } => self.reconcile_subtree(&dir).await?,
            ReconciliationStrategy::Full => self.reconcile_full().await?,
            ReconciliationStrategy::PatternDiff { added } => self.reconcile_pattern_diff(&added).await?,
        }

        if is_root {
            if let Some(content) = &current_content {
                self.metadata.set_state(state_keys::GITIGNORE_CONTENT, content).await?;
            }
        }
        let hash = gitignore::compute_gitignore_hash(&self.config.root)?;
        self.metadata.set_state(state_keys::GITIGNORE_HASH, &hash).await?;
        Ok(())
    }

    async fn handle_config_change(&self) -> anyhow::Result<()> {
        self.scanner.invalidate_gitignore_cache();
        self.reconcile_full().await
    }

    async fn reconcile_pattern_diff(&self, added_patterns: &[String]) -> anyhow::Result<()> {
        if added_patterns.is_empty() {
            return Ok(());
        }
        let matcher = gitignore::build_matcher(&self.config.root, added_patterns)?;
        let paths = self.metadata.get_file_paths_by_project(&self.config.project_id).await?;
        for path in paths {
            if matcher.matched(&path, false).is_ignore() {
                if let Err(e) = self.remove_file_locked(&path).await {
                    tracing::warn!(path, error = %e, "failed to remove newly-ignored file");
                }
            }
        }
        Ok(())
    }

    async fn reconcile_subtree(&self, dir: &str) -> anyhow::Result<()> {
        let indexed = self
            .metadata
            .list_file_paths_under(&self.config.project_id, dir)
            .await?;
        let indexed: std::collections::HashSet<String> = indexed.into_iter().collect();

        let scanned = self
            .scanner
            .scan_subtree(&self.config.root, Path::new(dir), &ScanOptions::default())
            .await?;
        let scanned_paths = self.indexable_paths(scanned).await;

        for path in indexed.difference(&scanned_paths) {
            if let Err(e) = self.remove_file_locked(path).await {
                tracing::warn!(path, error = %e, "failed to remove stale file during subtree reconciliation");
            }
        }
        for path in scanned_paths.difference(&indexed) {
            if let Err(e) = self.index_file_locked(path).await {
                tracing::warn!(path, error = %e, "failed to index new file during subtree reconciliation");
            }
        }
        Ok(())
    }

    async fn reconcile_full(&self) -> anyhow::Result<()> {
        let indexed: std::collections::HashSet<String> = self
            .metadata
            .get_file_paths_by_project(&self.config.project_id)
            .await?
            .into_iter()
            .collect();

        let scanned = self.scanner.scan(&self.config.root, &ScanOptions::default()).await?;
        let scanned_paths = self.indexable_paths(scanned).await;

        for path in indexed.difference(&scanned_paths) {
            if let Err(e) = self.remove_file_locked(path).await {
                tracing::warn!(path, error = %e, "failed to remove stale file during full reconciliation");
            }
        }
        for path in scanned_paths.difference(&indexed) {
            if let Err(e) = self.index_file_locked(path).await {
                tracing::warn!(path, error = %e, "failed to index new file during full reconciliation");
            }
        }
        Ok(())
    }

    async fn indexable_paths(&self, events: Vec<ScanEvent>) -> std::collections::HashSet<String> {
        let mut set = std::collections::HashSet::new();
        for event in events {
            if let ScanEvent::File(f) = event {
                let language = self.scanner.detect_language(Path::new(&f.path));
                if self.scanner.detect_content_type(&language).is_indexable() {
                    set.insert(f.path);
                }
            }
        }
        set
    }

    /// ReconcileOnStartup: ignore-rule drift. Skip if the persisted hash matches a
    /// freshly computed one and is non-empty; otherwise a full reconciliation.
    pub async fn reconcile_on_startup(&self) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let persisted = self.metadata.get_state(state_keys::GITIGNORE_HASH).await?;
        let current = gitignore::compute_gitignore_hash(&self.config.root)?;

        if persisted.as_deref() == Some(current.as_str()) && !current.is_empty() {
            return Ok(());
        }
        self.reconcile_full().await?;
        self.metadata.set_state(state_keys::GITIGNORE_HASH, &current).await?;
        Ok(())
    }

    /// ReconcileFilesOnStartup: content drift while offline, detected via mtime/size.
    /// Deletions first, then modifications, then additions, each sorted by path
    /// ascending; cancellation is checked before every file operation.
    pub async fn reconcile_files_on_startup(&self, cancel: &Cancellation) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;

        let indexed = self
            .metadata
            .get_files_for_reconciliation(&self.config.project_id)
            .await?;
        let scanned = self.scanner.scan(&self.config.root, &ScanOptions::default()).await?;

        let mut scanned_map = std::collections::HashMap::new();
        for event in scanned {
            if let ScanEvent::File(f) = event {
                scanned_map.insert(f.path.clone(), f);
            }
        }

        let mut deleted: Vec<String> = Vec::new();
        let mut modified: Vec<String> = Vec::new();
        let mut added: Vec<String> = Vec::new();

        for (path, stat) in &indexed {
            match scanned_map.get(path) {
                None => deleted.push(path.clone()),
                Some(current) => {
                    let truncated = File::truncate_to_secs(current.modified_at);
                    if truncated != stat.modified_at || current.size_bytes != stat.size_bytes {
                        modified.push(path.clone());
                    }
                }
            }
        }
        for path in scanned_map.keys() {
            if !indexed.contains_key(path) {
                added.push(path.clone());
            }
        }

        deleted.sort();
        modified.sort();
        added.sort();

        for path in deleted.into_iter().chain(modified).chain(added) {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let is_delete = !scanned_map.contains_key(&path) && indexed.contains_key(&path);
            let result = if is_delete {
                self.remove_file_locked(&path).await
            } else {
                self.index_file_locked(&path).await
            };
            if let Err(e) = result {
                tracing::warn!(path, error = %e, "failed to apply reconciliation change");
            }
        }

        Ok(())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::DeterministicEmbedder;
    use crate::indexing::{BM25Indexer, VectorIndexer};
    use crate::runner::LineChunker;
    use crate::scanner::IgnoreScanner;
    use crate::store::bm25::Bm25Store;
    use crate::store::memory::InMemoryMetadataStore;
    use crate::store::vector::BruteForceVectorStore;

    fn make_coordinator(root: &Path) -> Coordinator {
        Coordinator::new(
            CoordinatorConfig {
                root: root.to_path_buf(),
                project_id: "p1".to_string(),
                max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            },
            Arc::new(InMemoryMetadataStore::new()),
            Arc::new(HybridIndexer::new(
                BM25Indexer::new(Arc::new(Bm25Store::new())),
                VectorIndexer::new(Arc::new(BruteForceVectorStore::new())),
            )),
            Arc::new(IgnoreScanner::new()),
            Arc::new(LineChunker::default()),
            Arc::new(LineChunker::default()),
            Arc::new(DeterministicEmbedder::new(16, "det-v1")),
        )
    }

    #[tokio::test]
    async fn index_then_remove_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn alpha() {}\n").unwrap();
        let coordinator = make_coordinator(dir.path());

        coordinator.index_file("a.rs").await.unwrap();
        let stats = coordinator.indexer.stats().await.unwrap();
        assert!(stats.document_count > 0);

        coordinator.remove_file("a.rs").await.unwrap();
        let stats = coordinator.indexer.stats().await.unwrap();
        assert_eq!(stats.document_count, 0);
    }

    #[tokio::test]
    async fn handle_events_never_aborts_on_per_event_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn alpha() {}\n").unwrap();
        let coordinator = make_coordinator(dir.path());

        let outcomes = coordinator
            .handle_events(vec![
                Event::Create { path: "missing.rs".to_string() },
                Event::Create { path: "a.rs".to_string() },
            ])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].error.is_some());
        assert!(outcomes[1].error.is_none());
    }

    #[tokio::test]
    async fn oversized_file_is_skipped_cleanly_not_as_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), vec![b'a'; 1024]).unwrap();
        let coordinator = Coordinator::new(
            CoordinatorConfig {
                root: dir.path().to_path_buf(),
                project_id: "p1".to_string(),
                max_file_size_bytes: 10,
            },
            Arc::new(InMemoryMetadataStore::new()),
            Arc::new(HybridIndexer::new(
                BM25Indexer::new(Arc::new(Bm25Store::new())),
                VectorIndexer::new(Arc::new(BruteForceVectorStore::new())),
            )),
            Arc::new(IgnoreScanner::new()),
            Arc::new(LineChunker::default()),
            Arc::new(LineChunker::default()),
            Arc::new(DeterministicEmbedder::new(16, "det-v1")),
        );

        let outcomes = coordinator
            .handle_events(vec![Event::Create { path: "a.rs".to_string() }])
            .await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].error.is_none(), "oversized file must be a clean skip, not an error outcome");

        let file_id = File::compute_id("p1", "a.rs");
        assert!(coordinator.metadata.get_file(&file_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn binary_file_is_skipped_silently() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), [b'a', b'b', 0u8, b'c']).unwrap();
        let coordinator = make_coordinator(dir.path());

        let outcomes = coordinator
            .handle_events(vec![Event::Create { path: "a.bin".to_string() }])
            .await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].error.is_none());

        let file_id = File::compute_id("p1", "a.bin");
        assert!(coordinator.metadata.get_file(&file_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn index_file_populates_vector_store_not_just_bm25() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn alpha() {}\n").unwrap();
        let coordinator = make_coordinator(dir.path());

        coordinator.index_file("a.rs").await.unwrap();

        let file_id = File::compute_id("p1", "a.rs");
        let chunks = coordinator.metadata.get_chunks_for_file(&file_id).await.unwrap();
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            let embedding = coordinator.metadata.get_embedding(&chunk.id, "det-v1").await.unwrap();
            assert!(embedding.is_some());
        }
    }

    #[tokio::test]
    async fn reconcile_on_startup_skips_when_hash_matches() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = make_coordinator(dir.path());
        let hash = gitignore::compute_gitignore_hash(dir.path()).unwrap();
        coordinator
            .metadata
            .set_state(state_keys::GITIGNORE_HASH, &hash)
            .await
            .unwrap();

        coordinator.reconcile_on_startup().await.unwrap();
    }
}
