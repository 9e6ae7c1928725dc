//! # archmind-embed
//!
//! Provider-agnostic text embedding for the archmind RAG stack. Adapters
//! wrap remote embedding APIs behind one async trait so the processing
//! pipeline and the retriever never care which vendor is configured.
//!
//! ## Features
//!
//! - **One contract**: [`EmbeddingAdapter`] with order-preserving batch
//!   embedding, a static model descriptor, and a cost estimator
//! - **Two backends**: OpenAI (`text-embedding-3-*`, `ada-002`) and GLM
//!   (`embedding-2`/`embedding-3` with selectable dimensionality)
//! - **Config-driven**: [`create_adapter`] builds the right adapter from a
//!   serializable [`EmbedConfig`]
//! - **No global state**: auth caching lives in a per-adapter
//!   [`TokenCache`], so tests can construct isolated instances
//!
//! ## Quick Start
//!
//! ```no_run
//! use archmind_embed::{EmbedConfig, create_adapter};
//!
//! # async fn example() -> archmind_embed::Result<()> {
//! let adapter = create_adapter(&EmbedConfig::glm("my-api-key"))?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let embeddings = adapter.embed_many(&texts).await?;
//!
//! println!(
//!     "Generated {} embeddings of dimension {}",
//!     embeddings.len(),
//!     adapter.model_info().dimensions
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`]
//! type, which names the provider on every remote failure and distinguishes
//! configuration, transport, API, and malformed-response errors.

pub mod adapter;
pub mod auth;
pub mod config;
pub mod error;
pub mod glm;
pub mod openai;

// Re-export main types for easy access
pub use adapter::{CostEstimate, EmbeddingAdapter, ModelInfo};
pub use auth::TokenCache;
pub use config::{EmbedConfig, EmbeddingProviderKind, create_adapter};
pub use error::{EmbedError, Result};
pub use glm::GlmEmbeddingAdapter;
pub use openai::OpenAiEmbeddingAdapter;
