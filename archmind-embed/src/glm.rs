//! GLM (Zhipu AI) embedding adapter.
//!
//! Speaks the `open.bigmodel.cn` embeddings endpoint. `embedding-3` supports
//! a small fixed set of output dimensionalities; `embedding-2` is fixed at
//! 1024. Requesting anything else is a constructor error, not a silent
//! fallback.

use crate::adapter::{
    CostEstimate, EmbeddingAdapter, EmbeddingResponse, ModelInfo, normalize_text, sort_batch,
};
use crate::auth::TokenCache;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const PROVIDER: &str = "glm";
const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

/// The GLM embeddings endpoint accepts up to 64 inputs per request.
const BATCH_SIZE: usize = 64;

/// How long a derived Authorization value is reused before being rebuilt.
const AUTH_TTL: Duration = Duration::from_secs(30 * 60);

/// Adapter for the GLM `embedding-2` / `embedding-3` models.
pub struct GlmEmbeddingAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model_id: String,
    dimensions: usize,
    token_cache: TokenCache,
}

impl GlmEmbeddingAdapter {
    /// Creates an adapter for the given model id.
    ///
    /// `dimensions` of `None` selects the model default (2048 for
    /// `embedding-3`, 1024 for `embedding-2`). A requested dimensionality the
    /// model does not support is an [`EmbedError::InvalidConfig`].
    pub fn new(
        api_key: impl Into<String>,
        model_id: impl Into<String>,
        dimensions: Option<usize>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EmbedError::invalid_config("GLM API key is empty"));
        }
        let model_id = model_id.into();

        let supported = Self::supported_dimensions(&model_id);
        let dimensions = match (supported, dimensions) {
            ([], None) => {
                return Err(EmbedError::invalid_config(format!(
                    "unknown GLM model '{model_id}': dimensions must be given explicitly"
                )));
            }
            ([], Some(d)) => d,
            (supported, None) => supported[supported.len() - 1],
            (supported, Some(d)) => {
                if !supported.contains(&d) {
                    return Err(EmbedError::invalid_config(format!(
                        "model '{model_id}' does not support {d} dimensions (supported: {supported:?})"
                    )));
                }
                d
            }
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id,
            dimensions,
            token_cache: TokenCache::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The output dimensionalities a model accepts, smallest first.
    /// Empty for model ids this adapter does not know.
    pub fn supported_dimensions(model_id: &str) -> &'static [usize] {
        match model_id {
            "embedding-3" => &[256, 512, 1024, 2048],
            "embedding-2" => &[1024],
            _ => &[],
        }
    }

    async fn authorization(&self) -> Result<String> {
        let api_key = self.api_key.clone();
        self.token_cache
            .get_or_refresh(AUTH_TTL, move || async move {
                Ok(format!("Bearer {api_key}"))
            })
            .await
    }

    async fn call_embedding_api(&self, batch: &[String]) -> Result<EmbeddingResponse> {
        let mut body = json!({
            "model": self.model_id,
            "input": batch,
        });
        // Only embedding-3 accepts a dimensions override.
        if self.model_id == "embedding-3" {
            body["dimensions"] = json!(self.dimensions);
        }

        let authorization = self.authorization().await?;
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header(reqwest::header::AUTHORIZATION, authorization)
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
impl EmbeddingAdapter for GlmEmbeddingAdapter {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let cleaned: Vec<String> = texts.iter().map(|t| normalize_text(t)).collect();
        let mut embeddings = Vec::with_capacity(cleaned.len());

        for batch in cleaned.chunks(BATCH_SIZE) {
            tracing::debug!(
                model = %self.model_id,
                batch_len = batch.len(),
                "requesting GLM embeddings"
            );
            let response = self.call_embedding_api(batch).await?;
            embeddings.extend(sort_batch(
                PROVIDER,
                batch.len(),
                self.dimensions,
                response.data,
            )?);
        }

        Ok(embeddings)
    }

    fn model_info(&self) -> ModelInfo {
        let max_input_tokens = if self.model_id == "embedding-3" {
            3072
        } else {
            512
        };
        ModelInfo {
            model_id: self.model_id.clone(),
            dimensions: self.dimensions,
            max_input_tokens,
            provider: PROVIDER,
        }
    }

    fn calculate_cost(&self, token_count: u64) -> CostEstimate {
        // Both embedding-2 and embedding-3 are billed at ¥0.0005 per 1K
        // tokens; reported in USD at roughly 7 CNY to the dollar.
        let cny_per_thousand = 0.0005;
        let usd_per_cny = 1.0 / 7.0;
        CostEstimate {
            input_cost: (token_count as f64 / 1000.0) * cny_per_thousand * usd_per_cny,
            currency: "USD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dimensions_per_model() {
        let v3 = GlmEmbeddingAdapter::new("key", "embedding-3", None).unwrap();
        assert_eq!(v3.model_info().dimensions, 2048);
        assert_eq!(v3.model_info().max_input_tokens, 3072);

        let v2 = GlmEmbeddingAdapter::new("key", "embedding-2", None).unwrap();
        assert_eq!(v2.model_info().dimensions, 1024);
        assert_eq!(v2.model_info().max_input_tokens, 512);
    }

    #[test]
    fn test_valid_dimension_override() {
        let adapter = GlmEmbeddingAdapter::new("key", "embedding-3", Some(512)).unwrap();
        assert_eq!(adapter.model_info().dimensions, 512);
    }

    #[test]
    fn test_unsupported_dimensions_are_rejected() {
        let result = GlmEmbeddingAdapter::new("key", "embedding-3", Some(300));
        assert!(matches!(result, Err(EmbedError::InvalidConfig { .. })));

        let result = GlmEmbeddingAdapter::new("key", "embedding-2", Some(2048));
        assert!(matches!(result, Err(EmbedError::InvalidConfig { .. })));
    }

    #[test]
    fn test_unknown_model_requires_explicit_dimensions() {
        assert!(GlmEmbeddingAdapter::new("key", "embedding-9", None).is_err());
        let adapter = GlmEmbeddingAdapter::new("key", "embedding-9", Some(768)).unwrap();
        assert_eq!(adapter.model_info().dimensions, 768);
    }

    #[test]
    fn test_rejects_empty_api_key() {
        assert!(GlmEmbeddingAdapter::new("", "embedding-3", None).is_err());
    }

    #[test]
    fn test_cost_converts_from_cny() {
        let adapter = GlmEmbeddingAdapter::new("key", "embedding-3", None).unwrap();
        let cost = adapter.calculate_cost(7_000_000);
        // 7M tokens * ¥0.0005/1K = ¥3.5 = $0.50
        assert!((cost.input_cost - 0.5).abs() < 1e-9);
        assert_eq!(cost.currency, "USD");
    }

    #[tokio::test]
    async fn test_embed_many_empty_input_is_free() {
        let adapter = GlmEmbeddingAdapter::new("key", "embedding-3", None)
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let result = adapter.embed_many(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
