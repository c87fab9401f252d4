//! Local code-intelligence indexing: walks a project tree, chunks source and documentation
//! files, produces BM25 lexical and dense-vector semantic representations, persists them
//! across three stores (metadata, BM25, vector), and serves hybrid search via reciprocal
//! rank fusion. Stays in sync with the filesystem through an event-driven coordinator plus
//! startup and gitignore-change reconciliation passes.

pub mod cancel;
pub mod consistency;
pub mod context;
pub mod coordinator;
pub mod embedder;
pub mod error;
pub mod gitignore;
pub mod indexing;
pub mod model;
pub mod renderer;
pub mod runner;
pub mod scanner;
pub mod search;
pub mod store;

// Re-exports for the entry points a consumer of this crate reaches for first.
pub use cancel::Cancellation;
pub use consistency::{CheckReport, ConsistencyChecker, Inconsistency, InconsistencyKind, RepairReport};
pub use context::{ContextConfig, ContextGenerator, HybridContextGenerator, LlmContextGenerator, PatternContextGenerator};
pub use coordinator::{Coordinator, CoordinatorConfig, Event, EventOutcome};
pub use embedder::{DeterministicEmbedder, Embedder, EmbeddingError};
pub use error::{FusionError, GitignoreError, HybridIndexError, RunnerError};
pub use indexing::{BM25Indexer, HybridIndexer, IndexerStats, VectorIndexer};
pub use model::{Chunk, ContentType, File, IndexCheckpoint, Project, Symbol, SymbolKind, SCHEMA_VERSION};
pub use renderer::{LoggingRenderer, Renderer};
pub use runner::{Chunker, LineChunker, Runner, RunnerConfig, RunnerDeps};
pub use scanner::{IgnoreScanner, ScanEvent, ScanOptions, Scanner};
pub use search::{BM25Searcher, FusionConfig, FusionSearcher, SearchResult, VectorSearcher};
pub use store::{BM25Store, MetadataStore, VectorStore};

/// Default dense-vector embedding dimensionality for the reference `DeterministicEmbedder`.
pub const DEFAULT_DIMENSIONS: usize = 768;
