//! Renderer contract (§6): progress/error/completion reporting, decoupled from any
//! concrete terminal UI (out of scope). The reference implementation routes everything
//! through `tracing`, following the teacher's `tracing::{debug,info,warn,error}` style.

use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: String,
    pub current: usize,
    pub total: usize,
    pub message: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub file: Option<String>,
    pub error: String,
    pub is_warning: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StageTiming {
    pub stage: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionStats {
    pub files: usize,
    pub chunks: usize,
    pub duration: Duration,
    pub errors: usize,
    pub warnings: usize,
    pub stage_timings: Vec<StageTiming>,
    pub embedder_model: String,
    pub embedder_dimensions: usize,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn start(&self);
    async fn update_progress(&self, event: ProgressEvent);
    async fn add_error(&self, event: ErrorEvent);
    async fn complete(&self, stats: CompletionStats);
    async fn stop(&self);
}

pub struct LoggingRenderer;

impl LoggingRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Renderer for LoggingRenderer {
    async fn start(&self) {
        tracing::info!("indexing started");
    }

    async fn update_progress(&self, event: ProgressEvent) {
        tracing::debug!(
            stage = %event.stage,
            current = event.current,
            total = event.total,
            file = event.file.as_deref().unwrap_or(""),
            "{}",
            event.message
        );
    }

    async fn add_error(&self, event: ErrorEvent) {
        if event.is_warning {
            tracing::warn!(file = event.file.as_deref().unwrap_or(""), "{}", event.error);
        } else {
            tracing::error!(file = event.file.as_deref().unwrap_or(""), "{}", event.error);
        }
    }

    async fn complete(&self, stats: CompletionStats) {
        let chunks_per_sec = if stats.duration.as_secs_f64() > 0.0 {
            stats.chunks as f64 / stats.duration.as_secs_f64()
        } else {
            0.0
        };
        tracing::info!(
            files = stats.files,
            chunks = stats.chunks,
            errors = stats.errors,
            warnings = stats.warnings,
            chunks_per_sec,
            embedder_model = %stats.embedder_model,
            "indexing complete"
        );
        for timing in &stats.stage_timings {
            tracing::debug!(stage = %timing.stage, duration_ms = timing.duration.as_millis(), "stage timing");
        }
    }

    async fn stop(&self) {
        tracing::info!("indexing stopped");
    }
}
