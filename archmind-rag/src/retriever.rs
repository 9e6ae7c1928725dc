//! Query-time retrieval: vector, keyword, and hybrid search.
//!
//! [`RagRetriever`] answers queries three ways:
//!
//! - `retrieve`: embed the query, cosine similarity over stored vectors
//! - `keyword_search`: full-text search with relevance ranking
//! - `hybrid_search`: both, fused with Reciprocal Rank Fusion
//!
//! All three return [`RetrievedChunk`]s hydrated with their document titles.
//! Chunks whose document has disappeared are dropped silently; storage
//! errors are logged and raised.

use crate::storage::{ChunkId, RagStore};
use anyhow::Result;
use archmind_embed::EmbeddingAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// RRF constant; dampens the influence of rank differences deep in a list.
const RRF_K: f64 = 60.0;

/// Per-call overrides for `retrieve`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalOptions {
    pub top_k: Option<usize>,
    pub threshold: Option<f32>,
}

/// Per-call overrides for `hybrid_search`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridOptions {
    pub top_k: Option<usize>,
    pub threshold: Option<f32>,
    pub keyword_weight: Option<f64>,
    pub vector_weight: Option<f64>,
}

/// A chunk returned from retrieval, with its document title and a relevance
/// score. For vector retrieval the score is cosine similarity; for keyword
/// and hybrid retrieval it is the ranking score of that mode.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub id: ChunkId,
    pub document_id: String,
    pub document_title: String,
    pub content: String,
    pub similarity: f32,
}

/// Retrieves relevant chunks for a query.
pub struct RagRetriever {
    adapter: Arc<dyn EmbeddingAdapter>,
    store: Arc<dyn RagStore>,
    top_k: usize,
    threshold: f32,
}

impl RagRetriever {
    pub fn new(adapter: Arc<dyn EmbeddingAdapter>, store: Arc<dyn RagStore>) -> Self {
        Self {
            adapter,
            store,
            top_k: 5,
            threshold: 0.7,
        }
    }

    /// Override the default result count (builder style)
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Override the default similarity threshold (builder style)
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Vector retrieval: embed the query and search stored vectors.
    pub async fn retrieve(
        &self,
        query: &str,
        options: RetrievalOptions,
    ) -> Result<Vec<RetrievedChunk>> {
        let top_k = options.top_k.unwrap_or(self.top_k);
        let threshold = options.threshold.unwrap_or(self.threshold);

        let result = self.retrieve_inner(query, top_k, threshold).await;
        if let Err(error) = &result {
            error!(%error, "vector retrieval failed");
        }
        result
    }

    async fn retrieve_inner(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievedChunk>> {
        let query_embedding = self.adapter.embed(query).await?;

        let matches = self
            .store
            .similarity_search(&query_embedding, top_k, threshold, None)
            .await?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_ids: Vec<ChunkId> = matches.iter().map(|m| m.chunk_id).collect();
        let chunks = self.store.get_chunks_by_ids(&chunk_ids).await?;
        let similarity_by_id: HashMap<ChunkId, f32> =
            matches.iter().map(|m| (m.chunk_id, m.score)).collect();

        let mut retrieved = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            // A chunk whose document has been deleted underneath us is
            // stale; drop it rather than fail the query.
            let Some(document) = self.store.get_document(&chunk.document_id).await? else {
                debug!(
                    chunk_id = chunk.id,
                    document_id = %chunk.document_id,
                    "dropping chunk with missing document"
                );
                continue;
            };
            retrieved.push(RetrievedChunk {
                id: chunk.id,
                document_id: chunk.document_id,
                document_title: document.title,
                content: chunk.content,
                similarity: similarity_by_id.get(&chunk.id).copied().unwrap_or(0.0),
            });
        }

        retrieved.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(retrieved)
    }

    /// Keyword retrieval over the full-text index.
    pub async fn keyword_search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let hits = match self.store.keyword_search(query, top_k).await {
            Ok(hits) => hits,
            Err(error) => {
                error!(%error, "keyword search failed");
                return Err(error);
            }
        };

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                id: hit.chunk_id,
                document_id: hit.document_id,
                document_title: hit.document_title,
                content: hit.content,
                similarity: hit.score,
            })
            .collect())
    }

    /// Hybrid retrieval: keyword and vector results fused with RRF.
    ///
    /// Each leg over-fetches `2 * top_k` candidates so the fusion has
    /// material to reorder, then the fused list is cut back to `top_k`.
    pub async fn hybrid_search(
        &self,
        query: &str,
        options: HybridOptions,
    ) -> Result<Vec<RetrievedChunk>> {
        let top_k = options.top_k.unwrap_or(self.top_k);
        let threshold = options.threshold.unwrap_or(self.threshold);
        let keyword_weight = options.keyword_weight.unwrap_or(0.3);
        let vector_weight = options.vector_weight.unwrap_or(0.7);

        let keyword_results = self.keyword_search(query, top_k * 2).await?;
        let vector_results = self
            .retrieve(
                query,
                RetrievalOptions {
                    top_k: Some(top_k * 2),
                    threshold: Some(threshold),
                },
            )
            .await?;

        let mut fused = reciprocal_rank_fusion(
            keyword_results,
            vector_results,
            keyword_weight,
            vector_weight,
        );
        fused.truncate(top_k);
        Ok(fused)
    }

    /// Formats retrieval results into one context string for prompting.
    pub fn summarize_results(&self, results: &[RetrievedChunk]) -> String {
        results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("[Document {}: {}]\n{}\n", i + 1, r.document_title, r.content))
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

/// Reciprocal Rank Fusion.
///
/// `score(d) = Σ w_i / (k + rank_i(d) + 1)` with 0-based ranks and `k = 60`.
/// A chunk appearing in both lists sums its contributions; the fused score
/// replaces the chunk's similarity. Deterministic for fixed inputs: ties in
/// fused score are broken by chunk id, ascending.
pub fn reciprocal_rank_fusion(
    keyword_results: Vec<RetrievedChunk>,
    vector_results: Vec<RetrievedChunk>,
    keyword_weight: f64,
    vector_weight: f64,
) -> Vec<RetrievedChunk> {
    let mut scores: HashMap<ChunkId, (RetrievedChunk, f64)> = HashMap::new();

    for (rank, chunk) in keyword_results.into_iter().enumerate() {
        let rrf_score = keyword_weight / (RRF_K + rank as f64 + 1.0);
        scores.insert(chunk.id, (chunk, rrf_score));
    }

    for (rank, chunk) in vector_results.into_iter().enumerate() {
        let rrf_score = vector_weight / (RRF_K + rank as f64 + 1.0);
        scores
            .entry(chunk.id)
            .and_modify(|(_, score)| *score += rrf_score)
            .or_insert((chunk, rrf_score));
    }

    let mut fused: Vec<(RetrievedChunk, f64)> = scores.into_values().collect();
    // HashMap iteration order is random, so ties in score must be broken by
    // something stable for the fused order to be reproducible across calls.
    fused.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    fused
        .into_iter()
        .map(|(mut chunk, score)| {
            chunk.similarity = score as f32;
            chunk
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: ChunkId, title: &str) -> RetrievedChunk {
        RetrievedChunk {
            id,
            document_id: format!("doc-{id}"),
            document_title: title.to_string(),
            content: format!("content of chunk {id}"),
            similarity: 0.0,
        }
    }

    #[test]
    fn test_rrf_sums_scores_for_shared_chunks() {
        let keyword = vec![chunk(1, "a"), chunk(2, "b")];
        let vector = vec![chunk(2, "b"), chunk(3, "c")];

        let fused = reciprocal_rank_fusion(keyword, vector, 0.3, 0.7);
        assert_eq!(fused.len(), 3);

        // Chunk 2 appears in both lists: 0.3/62 + 0.7/61.
        let expected_top = 0.3 / 62.0 + 0.7 / 61.0;
        assert_eq!(fused[0].id, 2);
        assert!((fused[0].similarity as f64 - expected_top).abs() < 1e-9);

        // Chunk 3 (vector rank 1) beats chunk 1 (keyword rank 0) because
        // the vector leg carries more weight.
        assert_eq!(fused[1].id, 3);
        assert_eq!(fused[2].id, 1);
    }

    #[test]
    fn test_rrf_single_list_preserves_order() {
        let vector = vec![chunk(1, "a"), chunk(2, "b"), chunk(3, "c")];
        let fused = reciprocal_rank_fusion(Vec::new(), vector, 0.3, 0.7);
        let ids: Vec<ChunkId> = fused.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_rrf_zero_keyword_weight_matches_vector_order() {
        let keyword = vec![chunk(4, "d"), chunk(5, "e")];
        let vector = vec![chunk(1, "a"), chunk(2, "b"), chunk(3, "c")];

        let fused = reciprocal_rank_fusion(keyword, vector, 0.0, 1.0);
        // The keyword leg contributes nothing, so vector order leads.
        let leading: Vec<ChunkId> = fused.iter().take(3).map(|c| c.id).collect();
        assert_eq!(leading, vec![1, 2, 3]);
        assert!(fused[2].similarity > fused[3].similarity);
    }

    #[test]
    fn test_rrf_tied_scores_order_by_chunk_id() {
        // Six keyword-only and six vector-only chunks at identical ranks
        // under equal weights produce pairwise-tied fused scores; the order
        // must still be identical on every call.
        let make = || {
            (
                (1..=6).map(|id| chunk(id, "k")).collect::<Vec<_>>(),
                (7..=12).map(|id| chunk(id, "v")).collect::<Vec<_>>(),
            )
        };

        let (keyword, vector) = make();
        let first: Vec<ChunkId> = reciprocal_rank_fusion(keyword, vector, 0.5, 0.5)
            .iter()
            .map(|c| c.id)
            .collect();
        // Rank i of either leg scores 0.5/(61+i): id 1 ties id 7, and so on.
        assert_eq!(first, vec![1, 7, 2, 8, 3, 9, 4, 10, 5, 11, 6, 12]);

        for _ in 0..64 {
            let (keyword, vector) = make();
            let order: Vec<ChunkId> = reciprocal_rank_fusion(keyword, vector, 0.5, 0.5)
                .iter()
                .map(|c| c.id)
                .collect();
            assert_eq!(order, first);
        }
    }

    #[test]
    fn test_rrf_is_deterministic() {
        let make = || {
            (
                vec![chunk(1, "a"), chunk(4, "d")],
                vec![chunk(2, "b"), chunk(1, "a"), chunk(3, "c")],
            )
        };
        let (k1, v1) = make();
        let (k2, v2) = make();
        let a: Vec<ChunkId> = reciprocal_rank_fusion(k1, v1, 0.3, 0.7)
            .iter()
            .map(|c| c.id)
            .collect();
        let b: Vec<ChunkId> = reciprocal_rank_fusion(k2, v2, 0.3, 0.7)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rrf_higher_rank_scores_higher() {
        let vector = vec![chunk(1, "a"), chunk(2, "b")];
        let fused = reciprocal_rank_fusion(Vec::new(), vector, 0.3, 0.7);
        assert!(fused[0].similarity > fused[1].similarity);
    }

    #[test]
    fn test_rrf_empty_inputs() {
        assert!(reciprocal_rank_fusion(Vec::new(), Vec::new(), 0.3, 0.7).is_empty());
    }
}
