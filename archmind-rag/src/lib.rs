//! archmind-rag: Document indexing and retrieval for retrieval-augmented generation
//!
//! This crate turns raw documents into searchable chunks: it splits text,
//! embeds the chunks through a pluggable provider, stores everything in
//! SQLite, and answers vector, keyword, and hybrid queries over the result.
//!
//! ## Key Modules
//!
//! - **[`engine`]**: Processing engine that owns the document lifecycle and retries
//! - **[`pipeline`]**: Split → store → embed → store pipeline for one document
//! - **[`retriever`]**: Vector, keyword, and hybrid search with rank fusion
//! - **[`storage`]**: Storage traits and the SQLite implementation
//! - **[`queue`]**: Task queue feeding the engine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use archmind_rag::engine::{ProcessingEngine, ProcessingEngineConfig};
//! use archmind_rag::storage::document_index::DocumentIndex;
//! use archmind_embed::{EmbedConfig, create_adapter};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let index = Arc::new(DocumentIndex::open(std::path::Path::new(".")).await?);
//! let adapter = create_adapter(&EmbedConfig::openai("sk-..."))?;
//! let engine = ProcessingEngine::new(
//!     ProcessingEngineConfig::default(),
//!     index,
//!     adapter,
//! ).await?;
//!
//! engine.submit_document("doc-1", "Notes", "SQLite is a small SQL engine.").await?;
//! engine.process_pending_tasks().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Documents → TextSplitter → EmbeddingAdapter → SQLite Storage
//!    ↑                                              ↓
//! ProcessingEngine ← ProcessingQueue          RagRetriever
//! ```

pub mod engine;
pub mod pipeline;
pub mod queue;
pub mod retriever;
pub mod storage;

pub use engine::{ProcessingEngine, ProcessingEngineConfig, ProcessingStats};
pub use pipeline::{DocumentProcessingPipeline, PipelineOptions, ProcessResult};
pub use retriever::{HybridOptions, RagRetriever, RetrievalOptions, RetrievedChunk};
