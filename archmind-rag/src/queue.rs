//! Task queue for document processing.
//!
//! Documents are not processed on the submitting call; they are enqueued as
//! [`DocumentTask`]s and drained by the
//! [`ProcessingEngine`](crate::engine::ProcessingEngine). Delivery is
//! at-least-once: a failed task is re-enqueued until its retries run out,
//! which is safe because processing replaces a document's chunks wholesale.

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Priority labels for processing tasks.
///
/// Informational only: the queue itself is FIFO, so priority does not
/// reorder dequeueing. The label records why a task was enqueued and shows
/// up in logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TaskPriority {
    /// Background work, e.g. bulk backfills
    Background = 0,
    /// Normal priority, e.g. freshly submitted documents
    #[default]
    Normal = 1,
    /// High priority, e.g. user-triggered retries
    High = 2,
}

/// Types of processing tasks
#[derive(Debug, Clone)]
pub enum TaskType {
    /// Run a document through the processing pipeline
    ProcessDocument { document_id: String },
    /// Remove a document and everything derived from it
    RemoveDocument { document_id: String },
}

/// A task in the processing queue
#[derive(Debug, Clone)]
pub struct DocumentTask {
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub created_at: u64, // Unix timestamp in seconds
    pub retry_count: u32,
}

impl DocumentTask {
    pub fn new(task_type: TaskType, priority: TaskPriority) -> Self {
        Self {
            task_type,
            priority,
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            retry_count: 0,
        }
    }

    /// Create a normal-priority task for processing a document
    pub fn process_document(document_id: impl Into<String>) -> Self {
        Self::new(
            TaskType::ProcessDocument {
                document_id: document_id.into(),
            },
            TaskPriority::Normal,
        )
    }

    /// Create a task for reprocessing a document, labelled high priority
    pub fn process_document_high_priority(document_id: impl Into<String>) -> Self {
        Self::new(
            TaskType::ProcessDocument {
                document_id: document_id.into(),
            },
            TaskPriority::High,
        )
    }

    /// Create a task for removing a document
    pub fn remove_document(document_id: impl Into<String>) -> Self {
        Self::new(
            TaskType::RemoveDocument {
                document_id: document_id.into(),
            },
            TaskPriority::High,
        )
    }

    pub fn document_id(&self) -> &str {
        match &self.task_type {
            TaskType::ProcessDocument { document_id } => document_id,
            TaskType::RemoveDocument { document_id } => document_id,
        }
    }

    /// Increment retry count
    pub fn increment_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Check if task should be retried (max 3 retries)
    pub fn should_retry(&self) -> bool {
        self.retry_count < 3
    }

    /// Get a description of the task for logging
    pub fn description(&self) -> String {
        match &self.task_type {
            TaskType::ProcessDocument { document_id } => {
                format!("Process document: {document_id}")
            }
            TaskType::RemoveDocument { document_id } => {
                format!("Remove document: {document_id}")
            }
        }
    }
}

/// Unbounded FIFO channel of processing tasks.
pub struct ProcessingQueue {
    sender: flume::Sender<DocumentTask>,
    receiver: flume::Receiver<DocumentTask>,
}

impl ProcessingQueue {
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }

    /// Submit a task to the queue
    pub fn submit_task(&self, task: DocumentTask) -> Result<(), flume::SendError<DocumentTask>> {
        debug!("Submitting task: {}", task.description());
        self.sender.send(task)
    }

    /// Pull the next task without blocking
    pub fn try_recv_task(&self) -> Result<DocumentTask, flume::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Get the current queue size
    pub fn queue_size(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for ProcessingQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_delivers_in_order() {
        let queue = ProcessingQueue::new();
        queue
            .submit_task(DocumentTask::process_document("doc-1"))
            .unwrap();
        queue
            .submit_task(DocumentTask::remove_document("doc-2"))
            .unwrap();
        assert_eq!(queue.queue_size(), 2);

        let first = queue.try_recv_task().unwrap();
        assert_eq!(first.document_id(), "doc-1");
        assert!(matches!(first.task_type, TaskType::ProcessDocument { .. }));

        let second = queue.try_recv_task().unwrap();
        assert_eq!(second.document_id(), "doc-2");
        assert!(matches!(second.task_type, TaskType::RemoveDocument { .. }));

        assert!(queue.try_recv_task().is_err());
    }

    #[test]
    fn test_retry_budget() {
        let mut task = DocumentTask::process_document("doc-1");
        assert!(task.should_retry());
        task.increment_retry();
        task.increment_retry();
        assert!(task.should_retry());
        task.increment_retry();
        assert!(!task.should_retry());
    }

    #[test]
    fn test_priorities() {
        assert!(TaskPriority::High > TaskPriority::Normal);
        assert!(TaskPriority::Normal > TaskPriority::Background);
        assert_eq!(
            DocumentTask::process_document_high_priority("d").priority,
            TaskPriority::High
        );
    }
}
