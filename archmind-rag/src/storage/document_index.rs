//! SQLite implementation of the RAG storage traits.
//!
//! ## Database Schema
//!
//! ```sql
//! -- Documents table: source documents and their processing lifecycle
//! CREATE TABLE documents (
//!     id TEXT PRIMARY KEY,
//!     title TEXT,
//!     content TEXT,                    -- kept so failed documents can be retried
//!     processing_status TEXT,          -- pending | processing | completed | failed
//!     error TEXT,                      -- last failure message
//!     retry_count INTEGER,
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
//! );
//!
//! -- Chunks table: one generation of split content per document
//! CREATE TABLE chunks (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     document_id TEXT REFERENCES documents(id),
//!     chunk_index INTEGER,             -- contiguous from 0
//!     content TEXT,
//!     metadata TEXT,                   -- JSON provenance bag
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
//! );
//!
//! -- Vectors table: one embedding per (chunk, model)
//! CREATE TABLE vectors (
//!     chunk_id INTEGER REFERENCES chunks(id),
//!     model_name TEXT,
//!     model_provider TEXT,
//!     dimensions INTEGER,
//!     embedding BLOB,                  -- f32 little-endian
//!     PRIMARY KEY (chunk_id, model_name)
//! );
//! ```
//!
//! A contentless-delete FTS5 table (`chunks_fts`) mirrors `chunks.content`
//! via triggers and backs [`FullTextIndex::keyword_search`] with bm25
//! ranking. `embedding_models` plus a one-row `settings` entry track which
//! model similarity searches resolve to by default.
//!
//! ## SQLite Optimizations
//!
//! - **WAL mode**: Better concurrency for read/write operations
//! - **Large page size** (64KB): Optimized for embedding blob storage
//! - **Auto-vacuum**: Keeps database size manageable
//! - **Foreign keys**: Chunk and vector rows follow their document

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use super::{
    Chunk, ChunkId, ChunkStore, DocumentRecord, DocumentStore, EmbeddingModelRecord,
    FullTextIndex, IndexStats, KeywordHit, NewChunk, ProcessingLogEntry, ProcessingLogSink,
    ProcessingStatus, SimilarityMatch, VectorRecord, VectorStore,
};

const DEFAULT_MODEL_KEY: &str = "default_model";

/// SQLite-backed document, chunk, and vector store.
///
/// Implements every storage trait the RAG core consumes, so one
/// `Arc<DocumentIndex>` can be handed to the pipeline, the retriever, and
/// the engine alike.
#[derive(Clone, Debug)]
pub struct DocumentIndex {
    pool: SqlitePool,
}

impl DocumentIndex {
    /// Opens the index with persistent SQLite storage under `base`.
    pub async fn open(base: &Path) -> Result<Self> {
        let db_path = base.join("archmind-rag.db");

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true)
                .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::Full)
                .page_size(1 << 16)
                .optimize_on_close(true, 1 << 10),
        )
        .await?;
        Self::new_with_pool(pool).await
    }

    /// Opens the index with in-memory SQLite storage for testing.
    pub async fn open_memory() -> Result<Self> {
        // A single connection so every query sees the same memory database.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                SqliteConnectOptions::new()
                    .in_memory(true)
                    .foreign_keys(true),
            )
            .await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                processing_status TEXT NOT NULL DEFAULT 'pending',
                error TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT unique_chunk UNIQUE(document_id, chunk_index),
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vectors (
                chunk_id INTEGER NOT NULL,
                model_name TEXT NOT NULL,
                model_provider TEXT NOT NULL,
                dimensions INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (chunk_id, model_name),
                FOREIGN KEY (chunk_id) REFERENCES chunks(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embedding_models (
                model_name TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                dimensions INTEGER NOT NULL,
                registered_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processing_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT NOT NULL,
                metadata TEXT,
                duration_ms INTEGER,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_model ON vectors(model_name)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_logs_document ON processing_logs(document_id)")
            .execute(pool)
            .await?;

        // External-content FTS over chunks, kept in sync by triggers. The
        // delete trigger also covers chunk rows removed when a document's
        // chunks are replaced.
        sqlx::query(
            "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(content, content='chunks', content_rowid='id')",
        )
        .execute(pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS chunks_fts_insert AFTER INSERT ON chunks BEGIN
                INSERT INTO chunks_fts(rowid, content) VALUES (new.id, new.content);
            END
            "#,
        )
        .execute(pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS chunks_fts_delete AFTER DELETE ON chunks BEGIN
                INSERT INTO chunks_fts(chunks_fts, rowid, content)
                VALUES ('delete', old.id, old.content);
            END
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Get row counts across the index.
    pub async fn get_index_stats(&self) -> Result<IndexStats> {
        let documents_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let chunks_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let vectors_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await?;
        let models_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embedding_models")
            .fetch_one(&self.pool)
            .await?;

        Ok(IndexStats {
            documents_count: documents_count as usize,
            chunks_count: chunks_count as usize,
            vectors_count: vectors_count as usize,
            models_count: models_count as usize,
        })
    }

    fn chunk_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Chunk> {
        let metadata_text: String = row.get("metadata");
        let metadata = serde_json::from_str(&metadata_text)
            .with_context(|| format!("invalid chunk metadata: {metadata_text}"))?;
        Ok(Chunk {
            id: row.get("id"),
            document_id: row.get("document_id"),
            chunk_index: row.get::<i64, _>("chunk_index") as usize,
            content: row.get("content"),
            metadata,
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        })
    }

    /// Which model a similarity search should run against.
    async fn resolve_model(&self, model: Option<&str>) -> Result<EmbeddingModelRecord> {
        let name = match model {
            Some(name) => name.to_string(),
            None => self
                .default_model()
                .await?
                .map(|m| m.model_name)
                .ok_or_else(|| {
                    anyhow::anyhow!("no model given and no default model registered")
                })?,
        };

        let row = sqlx::query(
            "SELECT model_name, provider, dimensions FROM embedding_models WHERE model_name = ?1",
        )
        .bind(&name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(EmbeddingModelRecord {
                model_name: row.get("model_name"),
                provider: row.get("provider"),
                dimensions: row.get::<i64, _>("dimensions") as usize,
            }),
            None => bail!("embedding model '{name}' is not registered"),
        }
    }
}

#[async_trait]
impl DocumentStore for DocumentIndex {
    async fn upsert_document(&self, id: &str, title: &str, content: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, content, processing_status, error, retry_count)
            VALUES (?1, ?2, ?3, 'pending', NULL, 0)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                processing_status = 'pending',
                error = NULL
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(
            "SELECT id, title, content, processing_status, error, retry_count, created_at
             FROM documents WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status_text: String = row.get("processing_status");
        let processing_status = ProcessingStatus::parse(&status_text)
            .with_context(|| format!("unknown processing status: {status_text}"))?;

        Ok(Some(DocumentRecord {
            id: row.get("id"),
            title: row.get("title"),
            content: row.get("content"),
            processing_status,
            error: row.get("error"),
            retry_count: row.get::<i64, _>("retry_count") as u32,
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        }))
    }

    async fn set_document_status(
        &self,
        id: &str,
        status: ProcessingStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE documents SET processing_status = ?1, error = ?2 WHERE id = ?3",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            bail!("document '{id}' not found");
        }
        Ok(())
    }

    async fn bump_retry_count(&self, id: &str) -> Result<u32> {
        let retry_count: i64 = sqlx::query_scalar(
            "UPDATE documents SET retry_count = retry_count + 1 WHERE id = ?1 RETURNING retry_count",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(retry_count as u32)
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        // Chunks are deleted explicitly so the FTS delete trigger fires;
        // vectors follow their chunks via the foreign key.
        sqlx::query("DELETE FROM chunks WHERE document_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for DocumentIndex {
    async fn replace_document_chunks(
        &self,
        document_id: &str,
        chunks: Vec<NewChunk>,
    ) -> Result<Vec<ChunkId>> {
        // One transaction: a crash mid-replace can never leave the document
        // with the old generation half-deleted.
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let metadata_text = serde_json::to_string(&chunk.metadata)?;
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO chunks (document_id, chunk_index, content, metadata)
                VALUES (?1, ?2, ?3, ?4)
                RETURNING id
                "#,
            )
            .bind(document_id)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.content)
            .bind(&metadata_text)
            .fetch_one(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn get_chunks_by_ids(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT id, document_id, chunk_index, content, metadata, created_at
             FROM chunks WHERE id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::chunk_from_row).collect()
    }

    async fn get_document_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, content, metadata, created_at
             FROM chunks WHERE document_id = ?1 ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::chunk_from_row).collect()
    }

    async fn count_document_chunks(&self, document_id: &str) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = ?1")
                .bind(document_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }
}

#[async_trait]
impl VectorStore for DocumentIndex {
    async fn add_vectors(&self, vectors: Vec<VectorRecord>) -> Result<()> {
        for vector in &vectors {
            if vector.embedding.len() != vector.dimensions {
                bail!(
                    "vector for chunk {} has {} values but declares {} dimensions",
                    vector.chunk_id,
                    vector.embedding.len(),
                    vector.dimensions
                );
            }
        }

        let mut tx = self.pool.begin().await?;
        for vector in &vectors {
            let embedding_bytes = bytemuck::cast_slice::<f32, u8>(&vector.embedding);
            sqlx::query(
                r#"
                INSERT INTO vectors (chunk_id, model_name, model_provider, dimensions, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(chunk_id, model_name) DO UPDATE SET
                    model_provider = excluded.model_provider,
                    dimensions = excluded.dimensions,
                    embedding = excluded.embedding
                "#,
            )
            .bind(vector.chunk_id)
            .bind(&vector.model_name)
            .bind(&vector.model_provider)
            .bind(vector.dimensions as i64)
            .bind(embedding_bytes)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        top_k: usize,
        threshold: f32,
        model: Option<&str>,
    ) -> Result<Vec<SimilarityMatch>> {
        let model = self.resolve_model(model).await?;
        if query.len() != model.dimensions {
            bail!(
                "query has {} dimensions but model '{}' produces {}",
                query.len(),
                model.model_name,
                model.dimensions
            );
        }

        let rows = sqlx::query(
            "SELECT chunk_id, dimensions, embedding FROM vectors WHERE model_name = ?1",
        )
        .bind(&model.model_name)
        .fetch_all(&self.pool)
        .await?;

        let mut matches: Vec<SimilarityMatch> = Vec::new();
        for row in rows {
            let dimensions: i64 = row.get("dimensions");
            // Rows of the wrong shape are skipped, never averaged in.
            if dimensions as usize != query.len() {
                continue;
            }
            let embedding_bytes: Vec<u8> = row.get("embedding");
            let embedding = bytemuck::cast_slice::<u8, f32>(&embedding_bytes);
            let score = cosine_similarity(query, embedding);
            if score >= threshold {
                matches.push(SimilarityMatch {
                    chunk_id: row.get("chunk_id"),
                    score,
                });
            }
        }

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn count_vectors(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn register_default_model(&self, model: &EmbeddingModelRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO embedding_models (model_name, provider, dimensions)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(model_name) DO UPDATE SET
                provider = excluded.provider,
                dimensions = excluded.dimensions
            "#,
        )
        .bind(&model.model_name)
        .bind(&model.provider)
        .bind(model.dimensions as i64)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(DEFAULT_MODEL_KEY)
        .bind(&model.model_name)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn default_model(&self) -> Result<Option<EmbeddingModelRecord>> {
        let name: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
                .bind(DEFAULT_MODEL_KEY)
                .fetch_optional(&self.pool)
                .await?;
        let Some(name) = name else {
            return Ok(None);
        };

        let row = sqlx::query(
            "SELECT model_name, provider, dimensions FROM embedding_models WHERE model_name = ?1",
        )
        .bind(&name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| EmbeddingModelRecord {
            model_name: row.get("model_name"),
            provider: row.get("provider"),
            dimensions: row.get::<i64, _>("dimensions") as usize,
        }))
    }
}

#[async_trait]
impl FullTextIndex for DocumentIndex {
    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>> {
        let match_query = sanitize_fts_query(query);
        if match_query.is_empty() {
            return Ok(Vec::new());
        }

        // bm25 is lower-is-better; negate so higher means more relevant.
        let rows = sqlx::query(
            r#"
            SELECT c.id AS chunk_id, c.document_id, d.title, c.content,
                   -bm25(chunks_fts) AS score
            FROM chunks_fts
            JOIN chunks c ON c.id = chunks_fts.rowid
            JOIN documents d ON d.id = c.document_id
            WHERE chunks_fts MATCH ?1
            ORDER BY bm25(chunks_fts)
            LIMIT ?2
            "#,
        )
        .bind(&match_query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| KeywordHit {
                chunk_id: row.get("chunk_id"),
                document_id: row.get("document_id"),
                document_title: row.get("title"),
                content: row.get("content"),
                score: row.get::<f64, _>("score") as f32,
            })
            .collect())
    }
}

#[async_trait]
impl ProcessingLogSink for DocumentIndex {
    async fn append_log(&self, entry: ProcessingLogEntry) -> Result<()> {
        let metadata_text = entry
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            r#"
            INSERT INTO processing_logs (document_id, stage, status, message, metadata, duration_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&entry.document_id)
        .bind(entry.stage.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.message)
        .bind(metadata_text)
        .bind(entry.duration_ms.map(|ms| ms as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Quotes each whitespace-separated term so user input cannot inject FTS5
/// query syntax.
fn sanitize_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cosine similarity between two f32 vectors; 0.0 for mismatched or zero
/// vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x.powi(2)).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x.powi(2)).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LogStage, LogStatus};

    async fn index_with_document(id: &str) -> DocumentIndex {
        let index = DocumentIndex::open_memory().await.unwrap();
        index
            .upsert_document(id, "Test Document", "full text")
            .await
            .unwrap();
        index
    }

    fn new_chunk(chunk_index: usize, content: &str) -> NewChunk {
        NewChunk {
            chunk_index,
            content: content.to_string(),
            metadata: serde_json::json!({}),
        }
    }

    fn vector(chunk_id: ChunkId, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            chunk_id,
            dimensions: embedding.len(),
            embedding,
            model_name: "test-model".to_string(),
            model_provider: "test".to_string(),
        }
    }

    async fn register_test_model(index: &DocumentIndex, dimensions: usize) {
        index
            .register_default_model(&EmbeddingModelRecord {
                model_name: "test-model".to_string(),
                provider: "test".to_string(),
                dimensions,
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_sanitize_fts_query() {
        assert_eq!(sanitize_fts_query("hello world"), "\"hello\" \"world\"");
        assert_eq!(sanitize_fts_query("a\"b"), "\"a\"\"b\"");
        assert_eq!(sanitize_fts_query("  "), "");
    }

    #[tokio::test]
    async fn test_replace_chunks_round_trip() {
        let index = index_with_document("doc-1").await;

        let ids = index
            .replace_document_chunks(
                "doc-1",
                vec![new_chunk(0, "first chunk"), new_chunk(1, "second chunk")],
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let chunks = index.get_document_chunks("doc-1").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].content, "first chunk");
        assert_eq!(chunks[1].chunk_index, 1);

        let by_ids = index.get_chunks_by_ids(&ids).await.unwrap();
        assert_eq!(by_ids.len(), 2);

        assert_eq!(index.count_document_chunks("doc-1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replace_chunks_removes_old_generation() {
        let index = index_with_document("doc-1").await;
        register_test_model(&index, 2).await;

        let old_ids = index
            .replace_document_chunks("doc-1", vec![new_chunk(0, "old content")])
            .await
            .unwrap();
        index
            .add_vectors(vec![vector(old_ids[0], vec![1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(index.count_vectors().await.unwrap(), 1);

        let new_ids = index
            .replace_document_chunks("doc-1", vec![new_chunk(0, "new content")])
            .await
            .unwrap();
        assert_ne!(old_ids, new_ids);

        // The old chunk and its vector are gone.
        assert_eq!(index.count_document_chunks("doc-1").await.unwrap(), 1);
        assert_eq!(index.count_vectors().await.unwrap(), 0);
        assert!(index.get_chunks_by_ids(&old_ids).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_similarity_search_orders_and_filters() {
        let index = index_with_document("doc-1").await;
        register_test_model(&index, 2).await;

        let ids = index
            .replace_document_chunks(
                "doc-1",
                vec![new_chunk(0, "a"), new_chunk(1, "b"), new_chunk(2, "c")],
            )
            .await
            .unwrap();
        index
            .add_vectors(vec![
                vector(ids[0], vec![1.0, 0.0]),
                vector(ids[1], vec![0.8, 0.6]),
                vector(ids[2], vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let matches = index
            .similarity_search(&[1.0, 0.0], 10, 0.5, None)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].chunk_id, ids[0]);
        assert!((matches[0].score - 1.0).abs() < 1e-5);
        assert_eq!(matches[1].chunk_id, ids[1]);
        assert!(matches[0].score >= matches[1].score);

        // top_k truncation
        let matches = index
            .similarity_search(&[1.0, 0.0], 1, 0.0, None)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].chunk_id, ids[0]);
    }

    #[tokio::test]
    async fn test_similarity_search_rejects_wrong_dimensions() {
        let index = index_with_document("doc-1").await;
        register_test_model(&index, 2).await;

        let result = index.similarity_search(&[1.0, 0.0, 0.0], 5, 0.0, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_similarity_search_needs_a_model() {
        let index = index_with_document("doc-1").await;
        let result = index.similarity_search(&[1.0, 0.0], 5, 0.0, None).await;
        assert!(result.is_err());

        let result = index
            .similarity_search(&[1.0, 0.0], 5, 0.0, Some("unregistered"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_add_vectors_validates_shape() {
        let index = index_with_document("doc-1").await;
        let ids = index
            .replace_document_chunks("doc-1", vec![new_chunk(0, "a")])
            .await
            .unwrap();

        let mut bad = vector(ids[0], vec![1.0, 0.0]);
        bad.dimensions = 3;
        assert!(index.add_vectors(vec![bad]).await.is_err());
    }

    #[tokio::test]
    async fn test_keyword_search_ranks_matches() {
        let index = index_with_document("doc-1").await;
        index
            .replace_document_chunks(
                "doc-1",
                vec![
                    new_chunk(0, "the quick brown fox jumps over the lazy dog"),
                    new_chunk(1, "an unrelated paragraph about databases"),
                    new_chunk(2, "fox fox fox"),
                ],
            )
            .await
            .unwrap();

        let hits = index.keyword_search("fox", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "fox fox fox");
        assert_eq!(hits[0].document_title, "Test Document");
        assert!(hits[0].score >= hits[1].score);

        assert!(index.keyword_search("zebra", 10).await.unwrap().is_empty());
        assert!(index.keyword_search("   ", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keyword_search_survives_quoted_input() {
        let index = index_with_document("doc-1").await;
        index
            .replace_document_chunks("doc-1", vec![new_chunk(0, "nothing to see")])
            .await
            .unwrap();

        // FTS operators in user input must not be interpreted.
        assert!(index.keyword_search("fox\" OR \"dog", 10).await.is_ok());
        assert!(index.keyword_search("NEAR(a b)", 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_document_lifecycle() {
        let index = index_with_document("doc-1").await;

        let doc = index.get_document("doc-1").await.unwrap().unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Pending);
        assert_eq!(doc.retry_count, 0);
        assert!(doc.error.is_none());

        index
            .set_document_status("doc-1", ProcessingStatus::Failed, Some("boom"))
            .await
            .unwrap();
        let doc = index.get_document("doc-1").await.unwrap().unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Failed);
        assert_eq!(doc.error.as_deref(), Some("boom"));

        assert_eq!(index.bump_retry_count("doc-1").await.unwrap(), 1);
        assert_eq!(index.bump_retry_count("doc-1").await.unwrap(), 2);

        // Re-upserting resets to pending and clears the error.
        index
            .upsert_document("doc-1", "Test Document", "new text")
            .await
            .unwrap();
        let doc = index.get_document("doc-1").await.unwrap().unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Pending);
        assert!(doc.error.is_none());
        assert_eq!(doc.content, "new text");

        assert!(
            index
                .set_document_status("missing", ProcessingStatus::Completed, None)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_delete_document_cascades() {
        let index = index_with_document("doc-1").await;
        register_test_model(&index, 2).await;
        let ids = index
            .replace_document_chunks("doc-1", vec![new_chunk(0, "searchable words")])
            .await
            .unwrap();
        index
            .add_vectors(vec![vector(ids[0], vec![1.0, 0.0])])
            .await
            .unwrap();

        index.delete_document("doc-1").await.unwrap();

        assert!(index.get_document("doc-1").await.unwrap().is_none());
        assert_eq!(index.count_document_chunks("doc-1").await.unwrap(), 0);
        assert_eq!(index.count_vectors().await.unwrap(), 0);
        assert!(index.keyword_search("searchable", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_model_registration() {
        let index = DocumentIndex::open_memory().await.unwrap();
        assert!(index.default_model().await.unwrap().is_none());

        register_test_model(&index, 8).await;
        let model = index.default_model().await.unwrap().unwrap();
        assert_eq!(model.model_name, "test-model");
        assert_eq!(model.dimensions, 8);

        // Registering another model switches the default.
        index
            .register_default_model(&EmbeddingModelRecord {
                model_name: "other-model".to_string(),
                provider: "test".to_string(),
                dimensions: 4,
            })
            .await
            .unwrap();
        let model = index.default_model().await.unwrap().unwrap();
        assert_eq!(model.model_name, "other-model");
    }

    #[tokio::test]
    async fn test_processing_log_append() {
        let index = index_with_document("doc-1").await;
        index
            .append_log(ProcessingLogEntry {
                document_id: "doc-1".to_string(),
                stage: LogStage::Chunk,
                status: LogStatus::Complete,
                message: "split into 3 chunks".to_string(),
                metadata: Some(serde_json::json!({"chunksCount": 3})),
                duration_ms: Some(12),
            })
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processing_logs")
            .fetch_one(index.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_index_stats() {
        let index = index_with_document("doc-1").await;
        register_test_model(&index, 2).await;
        let ids = index
            .replace_document_chunks("doc-1", vec![new_chunk(0, "a"), new_chunk(1, "b")])
            .await
            .unwrap();
        index
            .add_vectors(vec![vector(ids[0], vec![1.0, 0.0])])
            .await
            .unwrap();

        let stats = index.get_index_stats().await.unwrap();
        assert_eq!(stats.documents_count, 1);
        assert_eq!(stats.chunks_count, 2);
        assert_eq!(stats.vectors_count, 1);
        assert_eq!(stats.models_count, 1);
    }
}
