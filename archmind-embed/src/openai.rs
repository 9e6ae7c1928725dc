//! OpenAI embedding adapter.

use crate::adapter::{
    CostEstimate, EmbeddingAdapter, EmbeddingResponse, ModelInfo, normalize_text, sort_batch,
};
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use serde_json::json;

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI embeddings have a modest request-size limit; batches stay small.
const BATCH_SIZE: usize = 10;

/// Adapter for the OpenAI `text-embedding-*` family.
pub struct OpenAiEmbeddingAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model_id: String,
}

impl OpenAiEmbeddingAdapter {
    /// Creates an adapter for the given model id.
    /// `text-embedding-3-small` is the usual choice.
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EmbedError::invalid_config("OpenAI API key is empty"));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: model_id.into(),
        })
    }

    /// Points the adapter at a compatible non-default endpoint, e.g. a proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call_embedding_api(&self, batch: &[String]) -> Result<EmbeddingResponse> {
        let body = json!({
            "model": self.model_id,
            "input": batch,
            "encoding_format": "float",
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError::http(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::api(PROVIDER, status.as_u16(), message));
        }

        response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| EmbedError::malformed(PROVIDER, e.to_string()))
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiEmbeddingAdapter {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let cleaned: Vec<String> = texts.iter().map(|t| normalize_text(t)).collect();
        let dimensions = self.model_info().dimensions;
        let mut embeddings = Vec::with_capacity(cleaned.len());

        for batch in cleaned.chunks(BATCH_SIZE) {
            tracing::debug!(
                model = %self.model_id,
                batch_len = batch.len(),
                "requesting OpenAI embeddings"
            );
            let response = self.call_embedding_api(batch).await?;
            embeddings.extend(sort_batch(PROVIDER, batch.len(), dimensions, response.data)?);
        }

        Ok(embeddings)
    }

    fn model_info(&self) -> ModelInfo {
        let dimensions = if self.model_id.contains("3-large") {
            3072
        } else {
            // text-embedding-3-small and ada-002 both produce 1536
            1536
        };
        ModelInfo {
            model_id: self.model_id.clone(),
            dimensions,
            max_input_tokens: 8191,
            provider: PROVIDER,
        }
    }

    fn calculate_cost(&self, token_count: u64) -> CostEstimate {
        let price_per_million = if self.model_id.contains("large") {
            0.13
        } else if self.model_id.contains("ada-002") {
            0.10
        } else {
            // text-embedding-3-small
            0.02
        };
        CostEstimate {
            input_cost: (token_count as f64 / 1_000_000.0) * price_per_million,
            currency: "USD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_api_key() {
        assert!(OpenAiEmbeddingAdapter::new("", "text-embedding-3-small").is_err());
        assert!(OpenAiEmbeddingAdapter::new("  ", "text-embedding-3-small").is_err());
    }

    #[test]
    fn test_model_info_dimensions_by_model() {
        let small = OpenAiEmbeddingAdapter::new("key", "text-embedding-3-small").unwrap();
        assert_eq!(small.model_info().dimensions, 1536);
        assert_eq!(small.model_info().provider, "openai");
        assert_eq!(small.model_info().max_input_tokens, 8191);

        let large = OpenAiEmbeddingAdapter::new("key", "text-embedding-3-large").unwrap();
        assert_eq!(large.model_info().dimensions, 3072);

        let ada = OpenAiEmbeddingAdapter::new("key", "text-embedding-ada-002").unwrap();
        assert_eq!(ada.model_info().dimensions, 1536);
    }

    #[test]
    fn test_cost_follows_price_table() {
        let small = OpenAiEmbeddingAdapter::new("key", "text-embedding-3-small").unwrap();
        let cost = small.calculate_cost(1_000_000);
        assert!((cost.input_cost - 0.02).abs() < 1e-9);
        assert_eq!(cost.currency, "USD");

        let large = OpenAiEmbeddingAdapter::new("key", "text-embedding-3-large").unwrap();
        assert!((large.calculate_cost(1_000_000).input_cost - 0.13).abs() < 1e-9);

        let ada = OpenAiEmbeddingAdapter::new("key", "text-embedding-ada-002").unwrap();
        assert!((ada.calculate_cost(500_000).input_cost - 0.05).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_embed_many_empty_input_is_free() {
        // No server is reachable at this URL; an empty input must not try it.
        let adapter = OpenAiEmbeddingAdapter::new("key", "text-embedding-3-small")
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let result = adapter.embed_many(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
