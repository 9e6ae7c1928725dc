//! Configuration-driven adapter construction.
//!
//! The set of providers is a closed enum: adding a backend means adding a
//! variant here and a branch in [`create_adapter`], so an unknown provider
//! string is caught at deserialization time instead of at first use.

use crate::adapter::EmbeddingAdapter;
use crate::error::{EmbedError, Result};
use crate::glm::GlmEmbeddingAdapter;
use crate::openai::OpenAiEmbeddingAdapter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which embedding backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    OpenAi,
    Glm,
}

/// Configuration for constructing an embedding adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    pub provider: EmbeddingProviderKind,
    pub api_key: String,
    /// Model identifier; each provider has a documented default.
    #[serde(default)]
    pub model_id: Option<String>,
    /// Requested output dimensionality, where the model supports choosing one.
    #[serde(default)]
    pub dimensions: Option<usize>,
    /// Override for the provider endpoint, e.g. a proxy.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl EmbedConfig {
    /// Create an OpenAI configuration with the default model.
    pub fn openai(api_key: impl Into<String>) -> Self {
        EmbedConfig {
            provider: EmbeddingProviderKind::OpenAi,
            api_key: api_key.into(),
            model_id: None,
            dimensions: None,
            base_url: None,
        }
    }

    /// Create a GLM configuration with the default model.
    pub fn glm(api_key: impl Into<String>) -> Self {
        EmbedConfig {
            provider: EmbeddingProviderKind::Glm,
            api_key: api_key.into(),
            model_id: None,
            dimensions: None,
            base_url: None,
        }
    }

    /// Set the model identifier (builder style)
    pub fn with_model(self, model_id: impl Into<String>) -> Self {
        Self {
            model_id: Some(model_id.into()),
            ..self
        }
    }

    /// Set the requested dimensionality (builder style)
    pub fn with_dimensions(self, dimensions: usize) -> Self {
        Self {
            dimensions: Some(dimensions),
            ..self
        }
    }

    /// Set the endpoint override (builder style)
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..self
        }
    }
}

/// Constructs the adapter described by `config`.
pub fn create_adapter(config: &EmbedConfig) -> Result<Arc<dyn EmbeddingAdapter>> {
    match config.provider {
        EmbeddingProviderKind::OpenAi => {
            if config.dimensions.is_some() {
                return Err(EmbedError::invalid_config(
                    "dimensions override is not supported for the OpenAI adapter",
                ));
            }
            let model_id = config.model_id.as_deref().unwrap_or("text-embedding-3-small");
            let mut adapter = OpenAiEmbeddingAdapter::new(&config.api_key, model_id)?;
            if let Some(base_url) = &config.base_url {
                adapter = adapter.with_base_url(base_url);
            }
            Ok(Arc::new(adapter))
        }
        EmbeddingProviderKind::Glm => {
            let model_id = config.model_id.as_deref().unwrap_or("embedding-3");
            let mut adapter =
                GlmEmbeddingAdapter::new(&config.api_key, model_id, config.dimensions)?;
            if let Some(base_url) = &config.base_url {
                adapter = adapter.with_base_url(base_url);
            }
            Ok(Arc::new(adapter))
        }
    }
}
