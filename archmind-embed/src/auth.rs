//! Lazily refreshed auth token cache.
//!
//! Providers that derive short-lived credentials from a long-lived API key
//! keep one of these per adapter instance. The cache is deliberately not a
//! process-wide singleton: each adapter owns its own, so tests can construct
//! isolated instances with nothing leaking between them. Racing refreshes
//! are harmless; the last write wins.

use crate::error::Result;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// A single cached credential with an explicit expiry timestamp.
#[derive(Debug, Default)]
pub struct TokenCache {
    inner: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token, refreshing it via `refresh` if it is
    /// missing or expired. The lock is not held across the refresh call.
    pub async fn get_or_refresh<F, Fut>(&self, ttl: Duration, refresh: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let now = Instant::now();
        {
            let guard = self.inner.lock().await;
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at > now {
                    return Ok(cached.value.clone());
                }
            }
        }

        let value = refresh().await?;
        let mut guard = self.inner.lock().await;
        *guard = Some(CachedToken {
            value: value.clone(),
            expires_at: now + ttl,
        });
        Ok(value)
    }

    /// Drops the cached value so the next call refreshes.
    pub async fn invalidate(&self) {
        let mut guard = self.inner.lock().await;
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbedError;

    #[tokio::test]
    async fn test_token_is_cached_until_expiry() {
        let cache = TokenCache::new();
        let first = cache
            .get_or_refresh(Duration::from_secs(60), || async { Ok("one".to_string()) })
            .await
            .unwrap();
        assert_eq!(first, "one");

        // Fresh token wins over a would-be refresh.
        let second = cache
            .get_or_refresh(Duration::from_secs(60), || async { Ok("two".to_string()) })
            .await
            .unwrap();
        assert_eq!(second, "one");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let cache = TokenCache::new();
        cache
            .get_or_refresh(Duration::from_secs(0), || async { Ok("one".to_string()) })
            .await
            .unwrap();
        let refreshed = cache
            .get_or_refresh(Duration::from_secs(60), || async { Ok("two".to_string()) })
            .await
            .unwrap();
        assert_eq!(refreshed, "two");
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let cache = TokenCache::new();
        cache
            .get_or_refresh(Duration::from_secs(60), || async { Ok("one".to_string()) })
            .await
            .unwrap();
        cache.invalidate().await;
        let refreshed = cache
            .get_or_refresh(Duration::from_secs(60), || async { Ok("two".to_string()) })
            .await
            .unwrap();
        assert_eq!(refreshed, "two");
    }

    #[tokio::test]
    async fn test_refresh_failure_leaves_cache_empty() {
        let cache = TokenCache::new();
        let result = cache
            .get_or_refresh(Duration::from_secs(60), || async {
                Err(EmbedError::invalid_config("no key"))
            })
            .await;
        assert!(result.is_err());
        let recovered = cache
            .get_or_refresh(Duration::from_secs(60), || async { Ok("ok".to_string()) })
            .await
            .unwrap();
        assert_eq!(recovered, "ok");
    }
}
