//! Storage abstraction layer for archmind-rag
//!
//! This module defines the trait seams between the RAG core and its durable
//! collaborators. The pipeline and the retriever only ever see these traits;
//! [`DocumentIndex`](document_index::DocumentIndex) is the SQLite
//! implementation of all of them.
//!
//! ## Key Components
//!
//! - **DocumentStore**: Document records and their processing lifecycle
//! - **ChunkStore**: Chunk persistence keyed by document
//! - **VectorStore**: Embedding persistence and cosine similarity search
//! - **FullTextIndex**: Keyword search with relevance ranking
//! - **ProcessingLogSink**: Append-only, best-effort stage logging
//! - **RagStore**: Blanket trait combining all of the above
//!
//! ## Architecture
//!
//! ```text
//! DocumentStore ─┐
//! ChunkStore ────┤
//! VectorStore ───┼─ RagStore ── DocumentIndex (SQLite implementation)
//! FullTextIndex ─┤
//! ProcessingLogSink ─┘
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod document_index;

/// Database ID for a stored chunk.
pub type ChunkId = i64;

/// A chunk about to be persisted; IDs are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewChunk {
    /// Position within the document, contiguous from 0.
    pub chunk_index: usize,
    pub content: String,
    /// Free-form provenance data carried alongside the content.
    pub metadata: serde_json::Value,
}

/// A persisted chunk.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// An embedding for one chunk under one model. At most one vector exists per
/// `(chunk_id, model_name)` pair.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk_id: ChunkId,
    pub embedding: Vec<f32>,
    pub model_name: String,
    pub model_provider: String,
    pub dimensions: usize,
}

/// One hit from a similarity search: higher score is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub chunk_id: ChunkId,
    pub score: f32,
}

/// One hit from a keyword search, already joined with its document title.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub chunk_id: ChunkId,
    pub document_id: String,
    pub document_title: String,
    pub content: String,
    pub score: f32,
}

/// The processing lifecycle of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ProcessingStatus::Pending),
            "processing" => Some(ProcessingStatus::Processing),
            "completed" => Some(ProcessingStatus::Completed),
            "failed" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

/// A document as the store remembers it. Content is kept so a failed
/// document can be retried without the caller re-supplying it.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    pub processing_status: ProcessingStatus,
    pub error: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Pipeline stage names used in processing logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    Chunk,
    Embed,
    Store,
    Complete,
    Error,
}

impl LogStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStage::Chunk => "chunk",
            LogStage::Embed => "embed",
            LogStage::Store => "store",
            LogStage::Complete => "complete",
            LogStage::Error => "error",
        }
    }
}

/// Progress markers within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Start,
    Progress,
    Complete,
    Error,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Start => "start",
            LogStatus::Progress => "progress",
            LogStatus::Complete => "complete",
            LogStatus::Error => "error",
        }
    }
}

/// One append-only processing log record.
#[derive(Debug, Clone)]
pub struct ProcessingLogEntry {
    pub document_id: String,
    pub stage: LogStage,
    pub status: LogStatus,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
    pub duration_ms: Option<u64>,
}

/// Identity of an embedding model registered with the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingModelRecord {
    pub model_name: String,
    pub provider: String,
    pub dimensions: usize,
}

/// Row counts across the index.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStats {
    pub documents_count: usize,
    pub chunks_count: usize,
    pub vectors_count: usize,
    pub models_count: usize,
}

/// Document records and their processing lifecycle.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or update a document, resetting it to pending.
    async fn upsert_document(&self, id: &str, title: &str, content: &str) -> Result<()>;

    /// Get a document by ID
    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>>;

    /// Move a document to a new status, recording the error message for
    /// failures and clearing it otherwise.
    async fn set_document_status(
        &self,
        id: &str,
        status: ProcessingStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Increment and return the document's retry count.
    async fn bump_retry_count(&self, id: &str) -> Result<u32>;

    /// Delete a document; its chunks and vectors go with it.
    async fn delete_document(&self, id: &str) -> Result<()>;
}

/// Chunk persistence keyed by document.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Atomically replace a document's chunks with a new generation and
    /// return the new IDs in `chunk_index` order. Vectors attached to the
    /// old generation are removed with it.
    async fn replace_document_chunks(
        &self,
        document_id: &str,
        chunks: Vec<NewChunk>,
    ) -> Result<Vec<ChunkId>>;

    /// Fetch chunks by ID; missing IDs are simply absent from the result.
    async fn get_chunks_by_ids(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>>;

    /// Get all chunks of a document ordered by `chunk_index`.
    async fn get_document_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// Count the chunks of a document.
    async fn count_document_chunks(&self, document_id: &str) -> Result<usize>;
}

/// Embedding persistence and similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk-insert vectors. Each record's embedding length must equal its
    /// declared dimensionality.
    ///
    /// Returns no ids: vectors are keyed by `(chunk_id, model_name)`, which
    /// the caller already holds, so there is no surrogate key to hand back.
    async fn add_vectors(&self, vectors: Vec<VectorRecord>) -> Result<()>;

    /// Cosine similarity search over the vectors of one model: the named
    /// one, or the registered default when `model` is `None`. Results are
    /// filtered to `score >= threshold`, sorted descending, truncated to
    /// `top_k`.
    async fn similarity_search(
        &self,
        query: &[f32],
        top_k: usize,
        threshold: f32,
        model: Option<&str>,
    ) -> Result<Vec<SimilarityMatch>>;

    /// Count all stored vectors.
    async fn count_vectors(&self) -> Result<usize>;

    /// Register a model and make it the default for searches.
    async fn register_default_model(&self, model: &EmbeddingModelRecord) -> Result<()>;

    /// The current default model, if one has been registered.
    async fn default_model(&self) -> Result<Option<EmbeddingModelRecord>>;
}

/// Keyword search with relevance ranking.
#[async_trait]
pub trait FullTextIndex: Send + Sync {
    /// Full-text search over chunk content; hits come back ranked by
    /// relevance, best first.
    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>>;
}

/// Append-only processing log. Writes are best-effort; callers are expected
/// to swallow failures rather than abort the work being logged.
#[async_trait]
pub trait ProcessingLogSink: Send + Sync {
    async fn append_log(&self, entry: ProcessingLogEntry) -> Result<()>;
}

/// Everything the pipeline and retriever need from durable storage.
pub trait RagStore:
    DocumentStore + ChunkStore + VectorStore + FullTextIndex + ProcessingLogSink
{
}

impl<T> RagStore for T where
    T: DocumentStore + ChunkStore + VectorStore + FullTextIndex + ProcessingLogSink
{
}
