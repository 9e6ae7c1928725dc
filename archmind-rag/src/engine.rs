//! High-level engine that owns the document processing lifecycle.
//!
//! The engine ties the pieces together: it accepts documents, records them
//! as pending, queues them, and drains the queue through the
//! [`DocumentProcessingPipeline`], moving each document through
//! `pending → processing → completed | failed` as it goes. Failures record
//! the error on the document and re-enqueue the task while its retry budget
//! lasts, so a flaky embedding provider degrades to delayed processing
//! instead of lost documents.
//!
//! ## Pipeline Flow
//!
//! ```text
//! submit_document → DocumentIndex (pending) → ProcessingQueue
//!                                                   ↓
//!        completed/failed ← DocumentIndex ← DocumentProcessingPipeline
//! ```

use crate::pipeline::{DocumentProcessingPipeline, PipelineOptions};
use crate::queue::{DocumentTask, ProcessingQueue, TaskType};
use crate::storage::{
    DocumentStore, EmbeddingModelRecord, IndexStats, ProcessingStatus, VectorStore,
    document_index::DocumentIndex,
};
use anyhow::Result;
use archmind_embed::EmbeddingAdapter;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Configuration for the processing engine
#[derive(Debug, Clone)]
pub struct ProcessingEngineConfig {
    /// Splitting parameters handed to the pipeline
    pub pipeline: PipelineOptions,
}

impl Default for ProcessingEngineConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineOptions::default(),
        }
    }
}

impl ProcessingEngineConfig {
    /// Set the chunk size (builder style)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.pipeline.chunk_size = chunk_size;
        self
    }

    /// Set the chunk overlap (builder style)
    pub fn with_chunk_overlap(mut self, chunk_overlap: usize) -> Self {
        self.pipeline.chunk_overlap = chunk_overlap;
        self
    }
}

/// Session counters for the engine.
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub documents_processed: usize,
    pub documents_removed: usize,
    pub chunks_created: usize,
    pub vectors_added: usize,
    pub errors: usize,
}

/// Orchestrates document submission, queueing, and processing.
pub struct ProcessingEngine {
    index: Arc<DocumentIndex>,
    pipeline: DocumentProcessingPipeline,
    queue: ProcessingQueue,
    stats: RwLock<ProcessingStats>,
}

impl ProcessingEngine {
    /// Creates an engine and registers the adapter's model as the index
    /// default, so retrieval resolves to the same model documents are
    /// embedded with.
    pub async fn new(
        config: ProcessingEngineConfig,
        index: Arc<DocumentIndex>,
        adapter: Arc<dyn EmbeddingAdapter>,
    ) -> Result<Self> {
        let model_info = adapter.model_info();
        index
            .register_default_model(&EmbeddingModelRecord {
                model_name: model_info.model_id.clone(),
                provider: model_info.provider.to_string(),
                dimensions: model_info.dimensions,
            })
            .await?;
        info!(
            model = %model_info.model_id,
            provider = model_info.provider,
            dimensions = model_info.dimensions,
            "processing engine initialized"
        );

        let pipeline = DocumentProcessingPipeline::new(config.pipeline, adapter, index.clone());

        Ok(Self {
            index,
            pipeline,
            queue: ProcessingQueue::new(),
            stats: RwLock::new(ProcessingStats::default()),
        })
    }

    /// Records a document as pending and queues it for processing.
    pub async fn submit_document(&self, id: &str, title: &str, content: &str) -> Result<()> {
        self.index.upsert_document(id, title, content).await?;
        self.queue
            .submit_task(DocumentTask::process_document(id))
            .map_err(|e| anyhow::anyhow!("failed to queue document '{id}': {e}"))?;
        debug!(document_id = id, "document submitted");
        Ok(())
    }

    /// Queues a failed document for another attempt. The task is labelled
    /// high priority for bookkeeping; the queue itself remains FIFO.
    pub async fn retry_document(&self, id: &str) -> Result<()> {
        let Some(document) = self.index.get_document(id).await? else {
            anyhow::bail!("document '{id}' not found");
        };
        if document.processing_status != ProcessingStatus::Failed {
            anyhow::bail!(
                "document '{id}' is {}, only failed documents can be retried",
                document.processing_status.as_str()
            );
        }
        self.index
            .set_document_status(id, ProcessingStatus::Pending, None)
            .await?;
        self.queue
            .submit_task(DocumentTask::process_document_high_priority(id))
            .map_err(|e| anyhow::anyhow!("failed to queue document '{id}': {e}"))?;
        Ok(())
    }

    /// Queues a document for removal.
    pub fn remove_document(&self, id: &str) -> Result<()> {
        self.queue
            .submit_task(DocumentTask::remove_document(id))
            .map_err(|e| anyhow::anyhow!("failed to queue removal of '{id}': {e}"))?;
        Ok(())
    }

    /// Process all currently pending tasks from the queue.
    ///
    /// Tasks are processed sequentially. Individual failures are recorded on
    /// the document and retried while the task's budget lasts; they do not
    /// abort the batch.
    pub async fn process_pending_tasks(&self) -> Result<()> {
        let max_tasks_per_batch = 100; // Safety limit to prevent infinite loops
        let mut tasks_processed = 0;

        while let Ok(task) = self.queue.try_recv_task() {
            match &task.task_type {
                TaskType::ProcessDocument { document_id } => {
                    self.process_document_task(&task, document_id).await;
                }
                TaskType::RemoveDocument { document_id } => {
                    match self.index.delete_document(document_id).await {
                        Ok(()) => {
                            debug!(document_id, "document removed");
                            self.stats.write().await.documents_removed += 1;
                        }
                        Err(e) => {
                            error!(document_id, error = %e, "failed to remove document");
                            self.stats.write().await.errors += 1;
                        }
                    }
                }
            }

            tasks_processed += 1;
            if tasks_processed >= max_tasks_per_batch {
                debug!(
                    "Reached max tasks per batch ({}), stopping to prevent hanging",
                    max_tasks_per_batch
                );
                break;
            }
        }

        debug!("Processed {} tasks in this batch", tasks_processed);
        Ok(())
    }

    async fn process_document_task(&self, task: &DocumentTask, document_id: &str) {
        let document = match self.index.get_document(document_id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                warn!(document_id, "queued document no longer exists, skipping");
                return;
            }
            Err(e) => {
                error!(document_id, error = %e, "failed to load document");
                self.stats.write().await.errors += 1;
                return;
            }
        };

        if let Err(e) = self
            .index
            .set_document_status(document_id, ProcessingStatus::Processing, None)
            .await
        {
            error!(document_id, error = %e, "failed to mark document processing");
            self.stats.write().await.errors += 1;
            return;
        }

        match self.pipeline.process(document_id, &document.content).await {
            Ok(result) => {
                if let Err(e) = self
                    .index
                    .set_document_status(document_id, ProcessingStatus::Completed, None)
                    .await
                {
                    error!(document_id, error = %e, "failed to mark document completed");
                }
                let mut stats = self.stats.write().await;
                stats.documents_processed += 1;
                stats.chunks_created += result.chunks_created;
                stats.vectors_added += result.vectors_added;
            }
            Err(e) => {
                error!(document_id, error = %e, "processing failed");
                let message = format!("{e:#}");
                if let Err(status_err) = self
                    .index
                    .set_document_status(document_id, ProcessingStatus::Failed, Some(&message))
                    .await
                {
                    error!(document_id, error = %status_err, "failed to mark document failed");
                }
                if let Err(bump_err) = self.index.bump_retry_count(document_id).await {
                    error!(document_id, error = %bump_err, "failed to bump retry count");
                }
                self.stats.write().await.errors += 1;

                let mut retry = task.clone();
                retry.increment_retry();
                if retry.should_retry() {
                    debug!(
                        document_id,
                        retry_count = retry.retry_count,
                        "re-queueing failed document"
                    );
                    if let Err(send_err) = self.queue.submit_task(retry) {
                        error!(document_id, error = %send_err, "failed to re-queue document");
                    }
                } else {
                    warn!(document_id, "retry budget exhausted, document stays failed");
                }
            }
        }
    }

    /// Get current session statistics
    pub async fn get_stats(&self) -> ProcessingStats {
        self.stats.read().await.clone()
    }

    /// Get row counts from the underlying index
    pub async fn get_index_stats(&self) -> Result<IndexStats> {
        self.index.get_index_stats().await
    }

    /// Number of tasks waiting in the queue
    pub fn queue_size(&self) -> usize {
        self.queue.queue_size()
    }

    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.index
    }
}
