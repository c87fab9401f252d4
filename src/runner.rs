//! Runner (§4.G): the full-project indexing pipeline with checkpoint/resume.
//!
//! Mirrors the teacher's `Indexer::index_all`/`embed_and_upsert` shape — a sequence of
//! stages, each timed, with the embed stage batched and checkpointed — generalized to the
//! five named stages (scan, chunk, context, embed, index) and the reference-collaborator
//! trait objects instead of a concrete `EmbeddingProvider`/`QdrantClient` pair.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::cancel::Cancellation;
use crate::context::{
    enrich_chunk_with_context, extract_document_context, group_chunks_by_file, ContextGenerator,
};
use crate::embedder::Embedder;
use crate::error::RunnerError;
use crate::indexing::HybridIndexer;
use crate::model::{
    state_keys, CheckpointStage, Chunk, ContentType, File, IndexCheckpoint, Project, CHUNK_ID_SCHEME_VERSION,
    SCHEMA_VERSION,
};
use crate::renderer::{CompletionStats, ErrorEvent, ProgressEvent, Renderer, StageTiming};
use crate::scanner::{looks_binary, ScanEvent, ScanOptions, Scanner};
use crate::store::MetadataStore;

pub const EMBED_BATCH_SIZE: usize = 32;
const AMANMCP_EXCLUDE: &str = "**/.amanmcp/**";

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub project_name: String,
    pub project_type: String,
    pub data_dir: std::path::PathBuf,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub inter_batch_cooldown: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            project_name: "project".to_string(),
            project_type: "unknown".to_string(),
            data_dir: std::path::PathBuf::from(".index-data"),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            inter_batch_cooldown: Duration::from_millis(0),
        }
    }
}

/// A chunker contract kept deliberately minimal: given a file's path, content, and
/// detected language, produce chunks. Real code/markdown chunkers (tree-sitter-backed)
/// are out of scope; this is the seam the Runner calls through.
pub trait Chunker: Send + Sync {
    fn chunk(&self, file: &File, content: &str) -> anyhow::Result<Vec<Chunk>>;
}

/// A line/paragraph splitter good enough to exercise the pipeline end-to-end without a
/// real language-aware chunker.
pub struct LineChunker {
    pub max_lines: usize,
}

impl Default for LineChunker {
    fn default() -> Self {
        Self { max_lines: 60 }
    }
}

impl Chunker for LineChunker {
    fn chunk(&self, file: &File, content: &str) -> anyhow::Result<Vec<Chunk>> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Ok(Vec::new());
        }
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < lines.len() {
            let end = (start + self.max_lines).min(lines.len());
            let raw = lines[start..end].join("\n");
            let line_range = (start + 1, end);
            let id = Chunk::compute_id(&raw, &file.path, line_range);
            chunks.push(Chunk {
                id,
                file_id: file.id.clone(),
                file_path: file.path.clone(),
                language: file.language.clone(),
                content_type: file.content_type,
                line_range,
                raw_content: raw.clone(),
                enriched_content: raw,
                file_context: None,
                symbols: Vec::new(),
                metadata: Default::default(),
            });
            start = end;
        }
        Ok(chunks)
    }
}

pub struct RunnerDeps {
    pub renderer: Option<Arc<dyn Renderer>>,
    pub metadata: Option<Arc<dyn MetadataStore>>,
    pub indexer: Option<Arc<HybridIndexer>>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub scanner: Option<Arc<dyn Scanner>>,
    pub code_chunker: Option<Arc<dyn Chunker>>,
    pub markdown_chunker: Option<Arc<dyn Chunker>>,
    pub context_generator: Option<Arc<dyn ContextGenerator>>,
}

impl Default for RunnerDeps {
    fn default() -> Self {
        Self {
            renderer: None,
            metadata: None,
            indexer: None,
            embedder: None,
            scanner: None,
            code_chunker: None,
            markdown_chunker: None,
            context_generator: None,
        }
    }
}

pub struct Runner {
    renderer: Arc<dyn Renderer>,
    metadata: Arc<dyn MetadataStore>,
    indexer: Arc<HybridIndexer>,
    embedder: Arc<dyn Embedder>,
    scanner: Arc<dyn Scanner>,
    code_chunker: Arc<dyn Chunker>,
    markdown_chunker: Arc<dyn Chunker>,
    context_generator: Arc<dyn ContextGenerator>,
    config: RunnerConfig,
}

macro_rules! require_dep {
    ($deps:expr, $field:ident, $name:literal) => {
        $deps.$field.take().ok_or(RunnerError::MissingDependency($name))?
    };
}

impl Runner {
    pub fn new(config: RunnerConfig, mut deps: RunnerDeps) -> Result<Self, RunnerError> {
        Ok(Self {
            renderer: require_dep!(deps, renderer, "renderer"),
            metadata: require_dep!(deps, metadata, "metadata store"),
            indexer: require_dep!(deps, indexer, "indexer"),
            embedder: require_dep!(deps, embedder, "embedder"),
            scanner: require_dep!(deps, scanner, "scanner"),
            code_chunker: require_dep!(deps, code_chunker, "code chunker"),
            markdown_chunker: require_dep!(deps, markdown_chunker, "markdown chunker"),
            context_generator: require_dep!(deps, context_generator, "context generator"),
            config,
        })
    }

    fn scan_options(&self) -> ScanOptions {
        ScanOptions::default()
            .with_excludes(self.config.exclude_patterns.clone())
            .with_excludes(std::iter::once(AMANMCP_EXCLUDE.to_string()))
    }

    pub async fn run(&self, root: &Path, cancel: &Cancellation) -> Result<CompletionStats, RunnerError> {
        self.renderer.start().await;
        let total_start = Instant::now();
        let mut timings = Vec::new();
        let mut warnings = 0usize;
        let mut errors = 0usize;

        let project_id = Project::compute_id(&root.to_string_lossy());
        let project = Project {
            id: project_id.clone(),
            name: self.config.project_name.clone(),
            root_path: root.to_string_lossy().to_string(),
            project_type: self.config.project_type.clone(),
            file_count: 0,
            chunk_count: 0,
            indexed_at: SystemTime::now(),
            schema_version: SCHEMA_VERSION,
        };
        self.metadata
            .save_project(&project)
            .await
            .map_err(RunnerError::Store)?;

        let scan_start = Instant::now();
        let files = self.scan_stage(root, &project_id, &mut warnings).await?;
        timings.push(StageTiming {
            stage: "scan".to_string(),
            duration: scan_start.elapsed(),
        });

        let chunk_start = Instant::now();
        let mut chunks = self.chunk_stage(root, &project_id, &files, &mut warnings).await?;
        timings.push(StageTiming {
            stage: "chunk".to_string(),
            duration: chunk_start.elapsed(),
        });

        let context_start = Instant::now();
        self.context_stage(&mut chunks, &mut warnings).await;
        timings.push(StageTiming {
            stage: "context".to_string(),
            duration: context_start.elapsed(),
        });

        let embed_start = Instant::now();
        let embeddings = self.embed_stage(&project_id, &chunks, cancel).await?;
        timings.push(StageTiming {
            stage: "embed".to_string(),
            duration: embed_start.elapsed(),
        });

        let index_start = Instant::now();
        self.index_stage(&project_id, &chunks, embeddings).await?;
        timings.push(StageTiming {
            stage: "index".to_string(),
            duration: index_start.elapsed(),
        });

        self.finalize(root, &project_id, files.len(), chunks.len(), &mut errors).await;

        let stats = CompletionStats {
            files: files.len(),
            chunks: chunks.len(),
            duration: total_start.elapsed(),
            errors,
            warnings,
            stage_timings: timings,
            embedder_model: self.embedder.model_name().to_string(),
            embedder_dimensions: self.embedder.dimensions(),
        };
        self.renderer.complete(stats.clone()).await;
        Ok(stats)
    }

    async fn scan_stage(
        &self,
        root: &Path,
        project_id: &str,
        warnings: &mut usize,
    ) -> Result<Vec<File>, RunnerError> {
        let events = self
            .scanner
            .scan(root, &self.scan_options())
            .await
            .map_err(RunnerError::Scan)?;

        let mut files = Vec::new();
        for event in events {
            match event {
                ScanEvent::File(scanned) => {
                    let language = self.scanner.detect_language(Path::new(&scanned.path));
                    let content_type = self.scanner.detect_content_type(&language);
                    let file = File {
                        id: File::compute_id(project_id, &scanned.path),
                        project_id: project_id.to_string(),
                        path: scanned.path,
                        size_bytes: scanned.size_bytes,
                        modified_at: File::truncate_to_secs(scanned.modified_at),
                        content_hash: String::new(),
                        language,
                        content_type,
                    };
                    files.push(file);
                }
                ScanEvent::Error(e) => {
                    *warnings += 1;
                    self.renderer
                        .add_error(ErrorEvent {
                            file: Some(e.path),
                            error: e.message,
                            is_warning: true,
                        })
                        .await;
                }
            }
        }
        Ok(files)
    }

    async fn chunk_stage(
        &self,
        root: &Path,
        _project_id: &str,
        files: &[File],
        warnings: &mut usize,
    ) -> Result<Vec<Chunk>, RunnerError> {
        let mut all_chunks = Vec::new();
        for file in files {
            self.renderer
                .update_progress(ProgressEvent {
                    stage: "chunk".to_string(),
                    current: all_chunks.len(),
                    total: files.len(),
                    message: "chunking".to_string(),
                    file: Some(file.path.clone()),
                })
                .await;

            if !file.content_type.is_indexable() {
                let mut saved = file.clone();
                self.hash_and_save(root, &mut saved, warnings).await;
                continue;
            }

            let full_path = root.join(&file.path);
            let bytes = match std::fs::read(&full_path) {
                Ok(b) => b,
                Err(e) => {
                    *warnings += 1;
                    self.renderer
                        .add_error(ErrorEvent {
                            file: Some(file.path.clone()),
                            error: e.to_string(),
                            is_warning: true,
                        })
                        .await;
                    continue;
                }
            };
            if looks_binary(&bytes) {
                continue;
            }
            let content = String::from_utf8_lossy(&bytes).to_string();

            let mut saved_file = file.clone();
            saved_file.content_hash = sha256_hex(&bytes);
            if let Err(e) = self.metadata.save_file(&saved_file).await {
                *warnings += 1;
                self.renderer
                    .add_error(ErrorEvent {
                        file: Some(file.path.clone()),
                        error: e.to_string(),
                        is_warning: true,
                    })
                    .await;
                continue;
            }

            let chunker: &Arc<dyn Chunker> = match file.content_type {
                ContentType::Markdown => &self.markdown_chunker,
                _ => &self.code_chunker,
            };
            match chunker.chunk(&saved_file, &content) {
                Ok(chunks) => {
                    if let Err(e) = self.metadata.save_chunks(&chunks).await {
                        *warnings += 1;
                        self.renderer
                            .add_error(ErrorEvent {
                                file: Some(file.path.clone()),
                                error: e.to_string(),
                                is_warning: true,
                            })
                            .await;
                        continue;
                    }
                    all_chunks.extend(chunks);
                }
                Err(e) => {
                    *warnings += 1;
                    self.renderer
                        .add_error(ErrorEvent {
                            file: Some(file.path.clone()),
                            error: e.to_string(),
                            is_warning: true,
                        })
                        .await;
                }
            }
        }
        Ok(all_chunks)
    }

    async fn hash_and_save(&self, root: &Path, file: &mut File, warnings: &mut usize) {
        let full_path = root.join(&file.path);
        match std::fs::read(&full_path) {
            Ok(bytes) => {
                file.content_hash = sha256_hex(&bytes);
                if let Err(e) = self.metadata.save_file(file).await {
                    *warnings += 1;
                    self.renderer
                        .add_error(ErrorEvent {
                            file: Some(file.path.clone()),
                            error: e.to_string(),
                            is_warning: true,
                        })
                        .await;
                }
            }
            Err(e) => {
                *warnings += 1;
                self.renderer
                    .add_error(ErrorEvent {
                        file: Some(file.path.clone()),
                        error: e.to_string(),
                        is_warning: true,
                    })
                    .await;
            }
        }
    }

    /// Skipped on resume (callers entering mid-embedding never reach this — `run` always
    /// starts from scan; a dedicated `resume` entry point would skip straight to `embed_stage`).
    async fn context_stage(&self, chunks: &mut [Chunk], warnings: &mut usize) {
        let owned = chunks.to_vec();
        let groups = group_chunks_by_file(owned);
        let mut enriched_by_id: HashMap<String, String> = HashMap::new();

        for (path, group) in groups {
            let content_type = group.first().map(|c| c.content_type).unwrap_or(ContentType::Code);
            let mut ordered = group.clone();
            ordered.sort_by_key(|c| c.line_range.0);
            let reconstructed = ordered.iter().map(|c| c.raw_content.as_str()).collect::<Vec<_>>().join("\n");
            let document_context = extract_document_context(&path, &reconstructed, content_type);
            match self.context_generator.generate_batch(&group, &document_context).await {
                Ok(contexts) => {
                    for (chunk, ctx) in group.iter().zip(contexts) {
                        enriched_by_id.insert(chunk.id.clone(), ctx);
                    }
                }
                Err(e) => {
                    *warnings += 1;
                    tracing::warn!(file = %path, error = %e, "context generation failed, continuing with raw content");
                }
            }
        }

        for chunk in chunks.iter_mut() {
            if let Some(ctx) = enriched_by_id.get(&chunk.id) {
                enrich_chunk_with_context(chunk, ctx);
            }
        }
        if let Err(e) = self.metadata.save_chunks(chunks).await {
            *warnings += 1;
            tracing::warn!(error = %e, "failed to re-save enriched chunks");
        }
    }

    async fn embed_stage(
        &self,
        project_id: &str,
        chunks: &[Chunk],
        cancel: &Cancellation,
    ) -> Result<HashMap<String, Vec<f32>>, RunnerError> {
        let mut embeddings = HashMap::new();
        if chunks.is_empty() {
            return Ok(embeddings);
        }

        let checkpoint = self
            .metadata
            .load_checkpoint(project_id)
            .await
            .map_err(RunnerError::Store)?;

        let resume_from = if let Some(checkpoint) = &checkpoint {
            if checkpoint.embedder_model != self.embedder.model_name() {
                return Err(RunnerError::ModelMismatch {
                    checkpoint_model: checkpoint.embedder_model.clone(),
                    current_model: self.embedder.model_name().to_string(),
                });
            }
            checkpoint.embedded_count
        } else {
            0
        };

        let total = chunks.len();
        let mut batch_index = resume_from / EMBED_BATCH_SIZE;
        let mut position = resume_from;

        while position < total {
            if cancel.is_cancelled() {
                return Err(RunnerError::Cancelled {
                    completed: position,
                    total,
                });
            }

            let end = (position + EMBED_BATCH_SIZE).min(total);
            let batch = &chunks[position..end];
            let is_final = end >= total;

            self.embedder.set_batch_index(batch_index);
            self.embedder.set_final_batch(is_final);

            let texts: Vec<String> = batch.iter().map(|c| c.enriched_content.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| RunnerError::Embed(anyhow::Error::from(e)))?;

            for (chunk, vector) in batch.iter().zip(vectors) {
                self.metadata
                    .save_embedding(&chunk.id, self.embedder.model_name(), vector.clone())
                    .await
                    .map_err(RunnerError::Store)?;
                embeddings.insert(chunk.id.clone(), vector);
            }

            position = end;
            self.metadata
                .save_checkpoint(
                    project_id,
                    &IndexCheckpoint {
                        stage: CheckpointStage::Embedding,
                        total_chunks: total,
                        embedded_count: position,
                        embedder_model: self.embedder.model_name().to_string(),
                    },
                )
                .await
                .map_err(RunnerError::Store)?;

            self.renderer
                .update_progress(ProgressEvent {
                    stage: "embed".to_string(),
                    current: position,
                    total,
                    message: "embedding".to_string(),
                    file: None,
                })
                .await;

            batch_index += 1;
            if !is_final && !self.config.inter_batch_cooldown.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.inter_batch_cooldown) => {},
                    _ = cancel.cancelled() => {
                        return Err(RunnerError::Cancelled { completed: position, total });
                    }
                }
            }
        }

        Ok(embeddings)
    }

    async fn index_stage(
        &self,
        project_id: &str,
        chunks: &[Chunk],
        mut embeddings: HashMap<String, Vec<f32>>,
    ) -> Result<(), RunnerError> {
        let mut missing: Vec<&Chunk> = Vec::new();
        for chunk in chunks {
            if embeddings.contains_key(&chunk.id) {
                continue;
            }
            match self.metadata.get_embedding(&chunk.id, self.embedder.model_name()).await {
                Ok(Some(vector)) => {
                    embeddings.insert(chunk.id.clone(), vector);
                }
                Ok(None) => missing.push(chunk),
                Err(e) => {
                    tracing::warn!(chunk_id = %chunk.id, error = %e, "failed to load persisted embedding, regenerating");
                    missing.push(chunk);
                }
            }
        }
        if !missing.is_empty() {
            tracing::warn!(count = missing.len(), "chunks missing embeddings at index time, regenerating");
            let texts: Vec<String> = missing.iter().map(|c| c.enriched_content.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| RunnerError::Embed(anyhow::Error::from(e)))?;
            for (chunk, vector) in missing.iter().zip(vectors) {
                self.metadata
                    .save_embedding(&chunk.id, self.embedder.model_name(), vector.clone())
                    .await
                    .map_err(RunnerError::Store)?;
                embeddings.insert(chunk.id.clone(), vector);
            }
        }

        self.indexer
            .index(chunks, &embeddings)
            .await
            .map_err(RunnerError::Store)?;

        let bm25_path = self.config.data_dir.join("bm25").join("index.json");
        let vector_path = self.config.data_dir.join("vectors.hnsw");
        // Saving both stores is best-effort-logged here; a failed snapshot doesn't
        // invalidate the in-memory index this run just built.
        if let Err(e) = self.indexer.save(&bm25_path, &vector_path).await {
            tracing::warn!(error = %e, "failed to persist stores to disk");
        }

        let _ = project_id;
        Ok(())
    }

    async fn finalize(&self, root: &Path, project_id: &str, file_count: usize, chunk_count: usize, errors: &mut usize) {
        if let Err(e) = self.metadata.refresh_project_stats(project_id).await {
            *errors += 1;
            tracing::warn!(error = %e, "failed to refresh project stats");
        }
        let _ = (file_count, chunk_count);

        if let Err(e) = self.metadata.clear_checkpoint(project_id).await {
            tracing::warn!(error = %e, "failed to clear checkpoint");
        }

        if let Err(e) = self
            .metadata
            .set_state(state_keys::CHUNK_ID_VERSION, CHUNK_ID_SCHEME_VERSION)
            .await
        {
            tracing::warn!(error = %e, "failed to write chunk id version state");
        }
        if let Err(e) = self
            .metadata
            .set_state(state_keys::INDEX_MODEL, self.embedder.model_name())
            .await
        {
            tracing::warn!(error = %e, "failed to write index model state");
        }
        if let Err(e) = self
            .metadata
            .set_state(state_keys::INDEX_DIMENSION, &self.embedder.dimensions().to_string())
            .await
        {
            tracing::warn!(error = %e, "failed to write index dimension state");
        }

        match crate::gitignore::compute_gitignore_hash(root) {
            Ok(hash) => {
                if let Err(e) = self.metadata.set_state(state_keys::GITIGNORE_HASH, &hash).await {
                    tracing::warn!(error = %e, "failed to write gitignore hash state");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to compute gitignore hash at finalization"),
        }
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
    use crate::context::{ContextConfig, PatternContextGenerator};
    use crate::embedder::DeterministicEmbedder;
    use crate::indexing::{BM25Indexer, VectorIndexer};
    use crate::renderer::LoggingRenderer;
    use crate::scanner::IgnoreScanner;
    use crate::store::bm25::Bm25Store;
    use crate::store::memory::InMemoryMetadataStore;
    use crate::store::vector::BruteForceVectorStore;

    fn make_runner(data_dir: &Path) -> Runner {
        let config = RunnerConfig {
            data_dir: data_dir.to_path_buf(),
            ..Default::default()
        };
        let deps = RunnerDeps {
            renderer: Some(Arc::new(LoggingRenderer::new())),
            metadata: Some(Arc::new(InMemoryMetadataStore::new())),
            indexer: Some(Arc::new(HybridIndexer::new(
                BM25Indexer::new(Arc::new(Bm25Store::new())),
                VectorIndexer::new(Arc::new(BruteForceVectorStore::new())),
            ))),
            embedder: Some(Arc::new(DeterministicEmbedder::new(16, "det-v1"))),
            scanner: Some(Arc::new(IgnoreScanner::new())),
            code_chunker: Some(Arc::new(LineChunker::default())),
            markdown_chunker: Some(Arc::new(LineChunker::default())),
            context_generator: Some(Arc::new(PatternContextGenerator::new(ContextConfig::default()))),
        };
        Runner::new(config, deps).unwrap()
    }

    #[tokio::test]
    async fn construction_fails_on_missing_dependency() {
        let deps = RunnerDeps::default();
        let result = Runner::new(RunnerConfig::default(), deps);
        assert!(matches!(result, Err(RunnerError::MissingDependency(_))));
    }

    #[tokio::test]
    async fn full_run_indexes_files_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn alpha() {}\nfn beta() {}\n").unwrap();
        std::fs::write(dir.path().join("b.md"), "# Title\nSome docs.\n").unwrap();

        let runner = make_runner(dir.path());
        let cancel = Cancellation::new();
        let stats = runner.run(dir.path(), &cancel).await.unwrap();

        assert_eq!(stats.files, 2);
        assert!(stats.chunks >= 2);
        assert_eq!(stats.stage_timings.len(), 5);
    }

    #[tokio::test]
    async fn embed_stage_resume_detects_model_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let runner = make_runner(dir.path());
        let project_id = Project::compute_id(&dir.path().to_string_lossy());

        runner
            .metadata
            .save_checkpoint(
                &project_id,
                &IndexCheckpoint {
                    stage: CheckpointStage::Embedding,
                    total_chunks: 10,
                    embedded_count: 5,
                    embedder_model: "some-other-model".to_string(),
                },
            )
            .await
            .unwrap();

        let chunk = Chunk {
            id: "c1".to_string(),
            file_id: "f1".to_string(),
            file_path: "a.rs".to_string(),
            language: "rust".to_string(),
            content_type: ContentType::Code,
            line_range: (1, 1),
            raw_content: "fn a() {}".to_string(),
            enriched_content: "fn a() {}".to_string(),
            file_context: None,
            symbols: vec![],
            metadata: Default::default(),
        };
        let cancel = Cancellation::new();
        let result = runner.embed_stage(&project_id, &[chunk], &cancel).await;
        assert!(matches!(result, Err(RunnerError::ModelMismatch { .. })));
    }

    #[tokio::test]
    async fn embed_stage_cancellation_preserves_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let runner = make_runner(dir.path());
        let project_id = Project::compute_id(&dir.path().to_string_lossy());

        let chunks: Vec<Chunk> = (0..40)
            .map(|i| Chunk {
                id: format!("c{i}"),
                file_id: "f1".to_string(),
                file_path: "a.rs".to_string(),
                language: "rust".to_string(),
                content_type: ContentType::Code,
                line_range: (1, 1),
                raw_content: format!("fn f{i}() {{}}"),
                enriched_content: format!("fn f{i}() {{}}"),
                file_context: None,
                symbols: vec![],
                metadata: Default::default(),
            })
            .collect();

        let cancel = Cancellation::new();
        cancel.cancel();
        let result = runner.embed_stage(&project_id, &chunks, &cancel).await;
        assert!(matches!(result, Err(RunnerError::Cancelled { .. })));

        let checkpoint = runner.metadata.load_checkpoint(&project_id).await.unwrap();
        assert!(checkpoint.is_none(), "no batch completed yet, so nothing should be persisted");
    }
}
