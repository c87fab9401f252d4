//! ContextGenerator (§4.A): per-chunk contextual descriptions, Pattern/LLM/Hybrid variants.
//!
//! The LLM variant's transport reuses the teacher's `OpenRouterEmbeddings::send_request`
//! shape: a `reqwest::Client`, exponential backoff on 429, and a typed JSON response — but
//! unlike the embeddings client, every failure here is swallowed rather than surfaced, so
//! the Hybrid variant can fall back silently.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::model::{Chunk, ContentType};

#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub model_name: String,
    pub endpoint: String,
    pub per_chunk_timeout: Duration,
    pub batch_size: usize,
    pub fallback_only: bool,
    pub code_chunks_enabled: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            model_name: "local-context-model".to_string(),
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            per_chunk_timeout: Duration::from_secs(10),
            batch_size: 8,
            fallback_only: false,
            code_chunks_enabled: true,
        }
    }
}

/// Metadata key under which `EnrichChunkWithContext` records the raw generated context.
pub const CONTEXTUAL_CONTEXT_KEY: &str = "contextual_context";

#[async_trait]
pub trait ContextGenerator: Send + Sync {
    /// Generate context for a single chunk. Never errors: on nil/skip conditions returns
    /// `Ok(String::new())`; on transport failure the Hybrid/LLM variants fall back
    /// internally rather than propagate.
    async fn generate_one(&self, chunk: &Chunk, document_context: &str) -> anyhow::Result<String>;
    async fn generate_batch(&self, chunks: &[Chunk], document_context: &str) -> anyhow::Result<Vec<String>>;
    async fn available(&self) -> bool;
    fn model_name(&self) -> &str;
}

/// Deterministic fallback: always available, never calls out.
pub struct PatternContextGenerator {
    config: ContextConfig,
}

impl PatternContextGenerator {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }
}

fn strip_doc_comment(doc: &str) -> String {
    doc.lines()
        .map(|l| l.trim_start_matches(['/', '*', '#']).trim())
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_sentence(text: &str) -> String {
    let trimmed = text.trim();
    let end = trimmed.find(". ").map(|i| i + 1).unwrap_or(trimmed.len());
    let sentence = &trimmed[..end];
    if sentence.chars().count() > 100 {
        let truncated: String = sentence.chars().take(97).collect();
        format!("{truncated}...")
    } else {
        sentence.to_string()
    }
}

fn pattern_context(chunk: &Chunk) -> String {
    let leading_symbol = chunk.symbols.first();
    let mut parts = vec![chunk.file_path.clone()];
    if let Some(symbol) = leading_symbol {
        parts.push(format!("{:?} {}", symbol.kind, symbol.name));
        if let Some(doc) = &symbol.doc_comment {
            let cleaned = strip_doc_comment(doc);
            if !cleaned.is_empty() {
                parts.push(first_sentence(&cleaned));
            }
        }
    }
    parts.push(chunk.language.clone());
    parts.join(" — ")
}

#[async_trait]
impl ContextGenerator for PatternContextGenerator {
    async fn generate_one(&self, chunk: &Chunk, _document_context: &str) -> anyhow::Result<String> {
        if chunk.content_type == ContentType::Code && !self.config.code_chunks_enabled {
            return Ok(String::new());
        }
        Ok(pattern_context(chunk))
    }

    async fn generate_batch(&self, chunks: &[Chunk], document_context: &str) -> anyhow::Result<Vec<String>> {
        let mut out = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            out.push(self.generate_one(chunk, document_context).await?);
        }
        Ok(out)
    }

    async fn available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

const MAX_CHUNK_CHARS: usize = 1500;
const TRUNCATION_MARKER: &str = "... [truncated]";

fn truncate_chunk_content(content: &str) -> String {
    if content.chars().count() <= MAX_CHUNK_CHARS {
        return content.to_string();
    }
    let head: String = content.chars().take(MAX_CHUNK_CHARS).collect();
    format!("{head}{TRUNCATION_MARKER}")
}

fn build_prompt(chunk: &Chunk, document_context: &str) -> String {
    let content = truncate_chunk_content(&chunk.raw_content);
    match chunk.content_type {
        ContentType::Markdown => format!(
            "You are annotating a documentation excerpt.\n{document_context}\n\nExcerpt:\n{content}\n\nContext:"
        ),
        _ => format!(
            "You are annotating a code excerpt.\n{document_context}\n\nCode:\n{content}\n\nContext:"
        ),
    }
}

fn strip_context_preamble(text: &str) -> String {
    text.trim()
        .strip_prefix("Context:")
        .unwrap_or(text.trim())
        .trim()
        .to_string()
}

/// LLM-backed generator. Any transport failure, non-2xx status, or empty completion is
/// converted into `Ok(None)` by `try_generate` so the Hybrid variant can fall back — this
/// is the one place in the crate where an HTTP failure is deliberately not an `Err`.
pub struct LlmContextGenerator {
    client: reqwest::Client,
    config: ContextConfig,
}

impl LlmContextGenerator {
    pub fn new(config: ContextConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.per_chunk_timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    async fn try_generate(&self, chunk: &Chunk, document_context: &str) -> Option<String> {
        let prompt = build_prompt(chunk, document_context);
        let body = serde_json::json!({
            "model": self.config.model_name,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 100,
        });

        let mut delay = Duration::from_secs(1);
        for attempt in 0..3 {
            let response = self.client.post(&self.config.endpoint).json(&body).send().await;
            let response = match response {
                Ok(r) => r,
                Err(_) => return None,
            };
            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS && attempt < 2 {
                tokio::time::sleep(delay.min(self.config.per_chunk_timeout)).await;
                delay *= 2;
                continue;
            }
            if !response.status().is_success() {
                return None;
            }
            let parsed: ChatCompletionResponse = match response.json().await {
                Ok(p) => p,
                Err(_) => return None,
            };
            let text = parsed.choices.first()?.message.content.clone();
            let cleaned = strip_context_preamble(&text);
            return if cleaned.is_empty() { None } else { Some(cleaned) };
        }
        None
    }
}

#[async_trait]
impl ContextGenerator for LlmContextGenerator {
    async fn generate_one(&self, chunk: &Chunk, document_context: &str) -> anyhow::Result<String> {
        if chunk.content_type == ContentType::Code && !self.config.code_chunks_enabled {
            return Ok(String::new());
        }
        Ok(self.try_generate(chunk, document_context).await.unwrap_or_default())
    }

    async fn generate_batch(&self, chunks: &[Chunk], document_context: &str) -> anyhow::Result<Vec<String>> {
        let mut out = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            out.push(self.generate_one(chunk, document_context).await?);
        }
        Ok(out)
    }

    async fn available(&self) -> bool {
        let probe = tokio::time::timeout(Duration::from_secs(2), self.client.get(&self.config.endpoint).send()).await;
        matches!(probe, Ok(Ok(_)))
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// Tries LLM when available, falls back to Pattern on error or empty result.
pub struct HybridContextGenerator {
    llm: LlmContextGenerator,
    pattern: PatternContextGenerator,
    fallback_only: bool,
}

impl HybridContextGenerator {
    pub fn new(config: ContextConfig) -> Self {
        let fallback_only = config.fallback_only;
        Self {
            llm: LlmContextGenerator::new(config.clone()),
            pattern: PatternContextGenerator::new(config),
            fallback_only,
        }
    }
}

#[async_trait]
impl ContextGenerator for HybridContextGenerator {
    async fn generate_one(&self, chunk: &Chunk, document_context: &str) -> anyhow::Result<String> {
        if self.fallback_only || !self.llm.available().await {
            return self.pattern.generate_one(chunk, document_context).await;
        }
        let from_llm = self.llm.generate_one(chunk, document_context).await.unwrap_or_default();
        if from_llm.is_empty() {
            self.pattern.generate_one(chunk, document_context).await
        } else {
            Ok(from_llm)
        }
    }

    async fn generate_batch(&self, chunks: &[Chunk], document_context: &str) -> anyhow::Result<Vec<String>> {
        let mut out = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            out.push(self.generate_one(chunk, document_context).await?);
        }
        Ok(out)
    }

    async fn available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        self.llm.model_name()
    }
}

/// Per-file preamble: `"File: <path>\n<imports>"` for code, `"Document: <path>\n<headers>"`
/// for markdown (up to five leading section headers, ellipsis if more).
pub fn extract_document_context(path: &str, content: &str, content_type: ContentType) -> String {
    match content_type {
        ContentType::Markdown => {
            let headers: Vec<&str> = content
                .lines()
                .filter(|l| l.trim_start().starts_with('#'))
                .take(6)
                .collect();
            let mut shown: Vec<String> = headers.iter().take(5).map(|h| h.trim().to_string()).collect();
            if headers.len() > 5 {
                shown.push("...".to_string());
            }
            format!("Document: {path}\n{}", shown.join("\n"))
        }
        _ => {
            let imports: Vec<&str> = content
                .lines()
                .take_while(|l| {
                    let t = l.trim();
                    t.starts_with("use ")
                        || t.starts_with("import ")
                        || t.starts_with("from ")
                        || t.starts_with("package ")
                        || t.is_empty()
                })
                .filter(|l| !l.trim().is_empty())
                .collect();
            format!("File: {path}\n{}", imports.join("\n"))
        }
    }
}

/// Groups chunks by file, preserving input order within each group (prompt-cache affinity).
pub fn group_chunks_by_file(chunks: Vec<Chunk>) -> Vec<(String, Vec<Chunk>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Chunk>> = HashMap::new();
    for chunk in chunks {
        if !groups.contains_key(&chunk.file_path) {
            order.push(chunk.file_path.clone());
        }
        groups.entry(chunk.file_path.clone()).or_default().push(chunk);
    }
    order.into_iter().map(|path| (path.clone(), groups.remove(&path).unwrap())).collect()
}

/// Prepends `"<context>\n\n<raw>"` into `enriched_content` and records the raw context
/// under `contextual_context`.
pub fn enrich_chunk_with_context(chunk: &mut Chunk, generated_context: &str) {
    if generated_context.is_empty() {
        chunk.enriched_content = chunk.raw_content.clone();
        return;
    }
    chunk.enriched_content = format!("{generated_context}\n\n{}", chunk.raw_content);
    chunk
        .metadata
        .insert(CONTEXTUAL_CONTEXT_KEY.to_string(), generated_context.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Symbol, SymbolKind};

    fn sample_chunk() -> Chunk {
        Chunk {
            id: "c1".to_string(),
            file_id: "f1".to_string(),
            file_path: "src/lib.rs".to_string(),
            language: "rust".to_string(),
            content_type: ContentType::Code,
            line_range: (1, 5),
            raw_content: "fn foo() {}".to_string(),
            enriched_content: String::new(),
            file_context: None,
            symbols: vec![Symbol {
                name: "foo".to_string(),
                kind: SymbolKind::Function,
                line_range: (1, 5),
                signature: Some("fn foo()".to_string()),
                doc_comment: Some("/// Does a thing. And more.".to_string()),
            }],
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn pattern_generator_includes_symbol_and_doc_sentence() {
        let generator = PatternContextGenerator::new(ContextConfig::default());
        let context = generator.generate_one(&sample_chunk(), "").await.unwrap();
        assert!(context.contains("foo"));
        assert!(context.contains("Does a thing."));
    }

    #[tokio::test]
    async fn pattern_generator_skips_code_when_disabled() {
        let mut config = ContextConfig::default();
        config.code_chunks_enabled = false;
        let generator = PatternContextGenerator::new(config);
        let context = generator.generate_one(&sample_chunk(), "").await.unwrap();
        assert!(context.is_empty());
    }

    #[test]
    fn truncation_marker_applied_over_limit() {
        let long = "a".repeat(2000);
        let truncated = truncate_chunk_content(&long);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncated.chars().count(), MAX_CHUNK_CHARS + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn strip_preamble_removes_leading_context_label() {
        assert_eq!(strip_context_preamble("Context: handles parsing"), "handles parsing");
        assert_eq!(strip_context_preamble("no preamble"), "no preamble");
    }

    #[test]
    fn document_context_for_markdown_caps_headers_at_five() {
        let content = "# H1\n## H2\n### H3\n#### H4\n##### H5\n###### H6\ntext";
        let ctx = extract_document_context("README.md", content, ContentType::Markdown);
        assert!(ctx.contains("Document: README.md"));
        assert!(ctx.contains("..."));
    }

    #[test]
    fn enrich_prepends_context_and_records_metadata() {
        let mut chunk = sample_chunk();
        enrich_chunk_with_context(&mut chunk, "handles parsing");
        assert!(chunk.enriched_content.starts_with("handles parsing\n\n"));
        assert_eq!(chunk.metadata.get(CONTEXTUAL_CONTEXT_KEY).unwrap(), "handles parsing");
    }

    #[test]
    fn group_chunks_preserves_order_within_file() {
        let mut c1 = sample_chunk();
        c1.id = "a".to_string();
        let mut c2 = sample_chunk();
        c2.id = "b".to_string();
        let mut other = sample_chunk();
        other.id = "c".to_string();
        other.file_path = "src/main.rs".to_string();

        let groups = group_chunks_by_file(vec![c1, other, c2]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "src/lib.rs");
        assert_eq!(groups[0].1[0].id, "a");
        assert_eq!(groups[0].1[1].id, "b");
    }
}
