//! Error types for the embedding system

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
/// Used throughout the crate for operations that can fail.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Every remote failure carries the provider name so a caller juggling
/// multiple adapters can tell which backend misbehaved. The error type
/// integrates with the [`thiserror`] crate for automatic
/// [`std::error::Error`] implementation and supports error chaining.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when the adapter configuration is invalid
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// Transport-level failure talking to the provider
    #[error("{provider} embedding request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success status
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// The provider answered 200 but the body did not match the contract
    #[error("{provider} returned a malformed response: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an API error from a provider's non-success response.
    pub fn api<S: Into<String>>(provider: &'static str, status: u16, message: S) -> Self {
        Self::Api {
            provider,
            status,
            message: message.into(),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed<S: Into<String>>(provider: &'static str, message: S) -> Self {
        Self::Malformed {
            provider,
            message: message.into(),
        }
    }

    /// Wrap a transport error from the HTTP client.
    pub fn http(provider: &'static str, source: reqwest::Error) -> Self {
        Self::Http { provider, source }
    }
}
