//! The document processing pipeline: split, persist, embed, persist.
//!
//! One call to [`DocumentProcessingPipeline::process`] takes a document's
//! text all the way to searchable vectors, logging each stage to the
//! [`ProcessingLogSink`] as it goes. Log writes are best-effort: a failed
//! insert is warned about and otherwise ignored, so observability problems
//! never fail the document.
//!
//! There is no retry inside the pipeline. An embedding or storage error
//! aborts the run and surfaces to the caller, which owns the document's
//! failure bookkeeping (see [`ProcessingEngine`](crate::engine::ProcessingEngine)).

use crate::storage::{LogStage, LogStatus, NewChunk, ProcessingLogEntry, RagStore};
use anyhow::Result;
use archmind_context::TextSplitter;
use archmind_embed::EmbeddingAdapter;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Configuration for the processing pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Outcome of processing one document.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub document_id: String,
    pub chunks_created: usize,
    pub vectors_added: usize,
    pub processing_time: Duration,
}

/// Splits a document, persists the chunks, embeds them, and persists the
/// vectors.
pub struct DocumentProcessingPipeline {
    splitter: TextSplitter,
    adapter: Arc<dyn EmbeddingAdapter>,
    store: Arc<dyn RagStore>,
}

impl DocumentProcessingPipeline {
    pub fn new(
        options: PipelineOptions,
        adapter: Arc<dyn EmbeddingAdapter>,
        store: Arc<dyn RagStore>,
    ) -> Self {
        Self {
            splitter: TextSplitter::new(options.chunk_size, options.chunk_overlap),
            adapter,
            store,
        }
    }

    /// Process a document end to end.
    ///
    /// Content that splits into zero chunks short-circuits: an error entry
    /// is logged and a zero-valued result returned without touching chunk or
    /// vector storage. Any later failure is logged as an error stage and
    /// returned to the caller; chunks already persisted stay in place and
    /// are replaced wholesale on the next attempt.
    pub async fn process(&self, document_id: &str, content: &str) -> Result<ProcessResult> {
        let start_time = Instant::now();
        match self.process_inner(document_id, content, start_time).await {
            Ok(result) => Ok(result),
            Err(error) => {
                error!(document_id, %error, "pipeline failed");
                self.log_stage(
                    document_id,
                    LogStage::Error,
                    LogStatus::Error,
                    &error.to_string(),
                    Some(json!({ "error": format!("{error:#}") })),
                    None,
                )
                .await;
                Err(error)
            }
        }
    }

    async fn process_inner(
        &self,
        document_id: &str,
        content: &str,
        start_time: Instant,
    ) -> Result<ProcessResult> {
        self.log_stage(
            document_id,
            LogStage::Chunk,
            LogStatus::Start,
            "Starting document processing",
            None,
            None,
        )
        .await;

        // 1. Split
        let chunk_start = Instant::now();
        let chunks = self.splitter.split(content);
        let chunk_duration = chunk_start.elapsed();

        self.log_stage(
            document_id,
            LogStage::Chunk,
            LogStatus::Complete,
            &format!("Split document into {} chunks", chunks.len()),
            Some(json!({
                "chunksCount": chunks.len(),
                "contentLength": content.len(),
            })),
            Some(chunk_duration),
        )
        .await;

        info!(document_id, chunks = chunks.len(), "split document");

        if chunks.is_empty() {
            self.log_stage(
                document_id,
                LogStage::Error,
                LogStatus::Error,
                "No chunks generated from content",
                None,
                None,
            )
            .await;

            return Ok(ProcessResult {
                document_id: document_id.to_string(),
                chunks_created: 0,
                vectors_added: 0,
                processing_time: start_time.elapsed(),
            });
        }

        // 2. Persist chunk records
        self.log_stage(
            document_id,
            LogStage::Store,
            LogStatus::Start,
            "Storing document chunks",
            None,
            None,
        )
        .await;

        let store_start = Instant::now();
        let new_chunks: Vec<NewChunk> = chunks
            .iter()
            .enumerate()
            .map(|(chunk_index, content)| NewChunk {
                chunk_index,
                content: content.clone(),
                metadata: json!({
                    "source": "document_chunk",
                    "length": content.len(),
                }),
            })
            .collect();
        let chunk_ids = self
            .store
            .replace_document_chunks(document_id, new_chunks)
            .await?;
        let store_duration = store_start.elapsed();

        self.log_stage(
            document_id,
            LogStage::Store,
            LogStatus::Complete,
            &format!("Stored {} chunk records", chunk_ids.len()),
            Some(json!({ "chunksStored": chunk_ids.len() })),
            Some(store_duration),
        )
        .await;

        // 3. Embed
        let model_info = self.adapter.model_info();
        self.log_stage(
            document_id,
            LogStage::Embed,
            LogStatus::Start,
            &format!("Generating embeddings for {} chunks", chunks.len()),
            Some(json!({ "provider": model_info.provider })),
            None,
        )
        .await;

        let embed_start = Instant::now();
        let embeddings = self.adapter.embed_many(&chunks).await?;
        let embed_duration = embed_start.elapsed();

        self.log_stage(
            document_id,
            LogStage::Embed,
            LogStatus::Complete,
            &format!("Generated {} embeddings", embeddings.len()),
            Some(json!({
                "embeddingsCount": embeddings.len(),
                "modelInfo": {
                    "modelId": model_info.model_id,
                    "dimensions": model_info.dimensions,
                    "provider": model_info.provider,
                },
            })),
            Some(embed_duration),
        )
        .await;

        // 4. Persist vectors
        self.log_stage(
            document_id,
            LogStage::Store,
            LogStatus::Start,
            "Storing vectors",
            None,
            None,
        )
        .await;

        let vector_start = Instant::now();
        let vectors: Vec<crate::storage::VectorRecord> = chunk_ids
            .iter()
            .zip(embeddings)
            .map(|(&chunk_id, embedding)| crate::storage::VectorRecord {
                chunk_id,
                embedding,
                model_name: model_info.model_id.clone(),
                model_provider: model_info.provider.to_string(),
                dimensions: model_info.dimensions,
            })
            .collect();
        let vectors_added = vectors.len();
        self.store.add_vectors(vectors).await?;
        let vector_duration = vector_start.elapsed();

        self.log_stage(
            document_id,
            LogStage::Store,
            LogStatus::Complete,
            &format!("Stored {vectors_added} vectors"),
            Some(json!({ "vectorsStored": vectors_added })),
            Some(vector_duration),
        )
        .await;

        let total_duration = start_time.elapsed();
        self.log_stage(
            document_id,
            LogStage::Complete,
            LogStatus::Complete,
            "Processing completed successfully",
            Some(json!({
                "chunksCreated": chunk_ids.len(),
                "vectorsAdded": vectors_added,
                "totalDuration": total_duration.as_millis() as u64,
            })),
            Some(total_duration),
        )
        .await;

        info!(
            document_id,
            chunks_created = chunk_ids.len(),
            vectors_added,
            duration_ms = total_duration.as_millis() as u64,
            "document processed"
        );

        Ok(ProcessResult {
            document_id: document_id.to_string(),
            chunks_created: chunk_ids.len(),
            vectors_added,
            processing_time: total_duration,
        })
    }

    /// Appends a processing log entry, swallowing sink failures.
    async fn log_stage(
        &self,
        document_id: &str,
        stage: LogStage,
        status: LogStatus,
        message: &str,
        metadata: Option<serde_json::Value>,
        duration: Option<Duration>,
    ) {
        let entry = ProcessingLogEntry {
            document_id: document_id.to_string(),
            stage,
            status,
            message: message.to_string(),
            metadata,
            duration_ms: duration.map(|d| d.as_millis() as u64),
        };
        if let Err(error) = self.store.append_log(entry).await {
            warn!(document_id, %error, "failed to log processing stage");
        }
    }
}
