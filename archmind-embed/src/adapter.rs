//! The provider-agnostic embedding contract.
//!
//! Everything downstream of this crate (the processing pipeline, the
//! retriever) talks to embedding backends exclusively through
//! [`EmbeddingAdapter`]. Adapters own their batching, auth, and wire format;
//! callers only see ordered `Vec<Vec<f32>>` results and a static
//! [`ModelInfo`] descriptor fixed at construction time.

use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Static descriptor of the model behind an adapter.
///
/// Derived from the model identifier at construction time and immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub model_id: String,
    pub dimensions: usize,
    pub max_input_tokens: usize,
    pub provider: &'static str,
}

/// Cost of embedding a given number of tokens, from the provider's price
/// table. Purely informational.
#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    pub input_cost: f64,
    pub currency: &'static str,
}

/// Trait for embedding backends.
///
/// `embed_many` is the single required entry point; `embed` and
/// `is_available` have provided implementations in terms of it.
#[async_trait]
pub trait EmbeddingAdapter: Send + Sync {
    /// Generate embeddings for multiple texts.
    ///
    /// Output order matches input order regardless of how the provider
    /// batches or reorders internally. Empty input yields empty output
    /// without a network call. Any batch failure fails the whole call.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the static descriptor of the model behind this adapter.
    fn model_info(&self) -> ModelInfo;

    /// Estimate the cost of embedding `token_count` tokens.
    fn calculate_cost(&self, token_count: u64) -> CostEstimate;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_many(&[text.to_string()]).await?;
        if embeddings.is_empty() {
            return Err(EmbedError::malformed(
                self.model_info().provider,
                "no embedding returned for single input",
            ));
        }
        Ok(embeddings.swap_remove(0))
    }

    /// Check whether the provider is reachable and the credentials work,
    /// by embedding a trivial probe text.
    async fn is_available(&self) -> bool {
        match self.embed("test").await {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!(
                    provider = self.model_info().provider,
                    %error,
                    "embedding availability check failed"
                );
                false
            }
        }
    }
}

/// Normalizes text before it is sent to a provider: newlines become spaces,
/// runs of whitespace collapse to one space, and the result is trimmed.
pub(crate) fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One embedding entry in a provider response. Both backends use the same
/// `{index, embedding}` shape.
#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingData {
    pub index: usize,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

/// Restores a batch to request order and validates count and dimensionality.
pub(crate) fn sort_batch(
    provider: &'static str,
    expected_count: usize,
    expected_dimensions: usize,
    mut data: Vec<EmbeddingData>,
) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected_count {
        return Err(EmbedError::malformed(
            provider,
            format!("requested {expected_count} embeddings, got {}", data.len()),
        ));
    }
    data.sort_by_key(|entry| entry.index);
    data.into_iter()
        .map(|entry| {
            if entry.embedding.len() != expected_dimensions {
                return Err(EmbedError::malformed(
                    provider,
                    format!(
                        "embedding {} has {} dimensions, expected {expected_dimensions}",
                        entry.index,
                        entry.embedding.len()
                    ),
                ));
            }
            Ok(entry.embedding)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_collapses_whitespace() {
        assert_eq!(normalize_text("hello\nworld"), "hello world");
        assert_eq!(normalize_text("  lots \t of\n\n space  "), "lots of space");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \n \t "), "");
    }

    #[test]
    fn test_sort_batch_restores_request_order() {
        let data = vec![
            EmbeddingData {
                index: 1,
                embedding: vec![1.0, 1.0],
            },
            EmbeddingData {
                index: 0,
                embedding: vec![0.0, 0.0],
            },
        ];
        let sorted = sort_batch("test", 2, 2, data).unwrap();
        assert_eq!(sorted[0], vec![0.0, 0.0]);
        assert_eq!(sorted[1], vec![1.0, 1.0]);
    }

    #[test]
    fn test_sort_batch_rejects_count_mismatch() {
        let data = vec![EmbeddingData {
            index: 0,
            embedding: vec![0.0],
        }];
        let result = sort_batch("test", 2, 1, data);
        assert!(matches!(result, Err(EmbedError::Malformed { .. })));
    }

    #[test]
    fn test_sort_batch_rejects_dimension_mismatch() {
        let data = vec![EmbeddingData {
            index: 0,
            embedding: vec![0.0, 1.0, 2.0],
        }];
        let result = sort_batch("test", 1, 2, data);
        assert!(matches!(result, Err(EmbedError::Malformed { .. })));
    }
}
