//! OAuth token cache backed by the key-value store.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::store::KeyValueStore;

use super::types::AccessToken;

/// Default key under which the bearer token is cached
pub const TOKEN_KEY: &str = "moltin:access_token";

/// Seconds shaved off the issuer TTL so a token never expires mid-request
const EXPIRY_MARGIN_SECS: u64 = 30;

/// Caches the bearer token for as long as the issuer says it is valid
///
/// Cache failures are logged and treated as a miss: the worst outcome is
/// an extra token request.
#[derive(Clone)]
pub struct TokenCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl TokenCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, TOKEN_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Cached token, if still valid
    pub async fn get(&self) -> Option<String> {
        match self.store.get(&self.key).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read cached access token");
                None
            }
        }
    }

    /// Cache a freshly issued token
    pub async fn put(&self, token: &AccessToken) {
        let ttl = cache_ttl(token.expires_in);
        match self
            .store
            .set_with_ttl(&self.key, &token.access_token, ttl)
            .await
        {
            Ok(()) => debug!(ttl_secs = ttl.as_secs(), "Cached access token"),
            Err(e) => warn!(error = %e, "Failed to cache access token"),
        }
    }

    /// Forget the cached token, e.g. after the backend rejected it
    pub async fn invalidate(&self) {
        if let Err(e) = self.store.delete(&self.key).await {
            warn!(error = %e, "Failed to drop cached access token");
        }
    }
}

/// TTL used for caching a token that lives `expires_in` seconds
pub fn cache_ttl(expires_in: u64) -> Duration {
    let secs = if expires_in > EXPIRY_MARGIN_SECS * 2 {
        expires_in - EXPIRY_MARGIN_SECS
    } else {
        expires_in
    };
    Duration::from_secs(secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn token(value: &str, expires_in: u64) -> AccessToken {
        AccessToken {
            access_token: value.to_string(),
            expires_in,
            token_type: Some("Bearer".to_string()),
        }
    }

    #[test]
    fn test_cache_ttl() {
        assert_eq!(cache_ttl(3600), Duration::from_secs(3570));
        assert_eq!(cache_ttl(45), Duration::from_secs(45));
        assert_eq!(cache_ttl(0), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_token_round_trip_through_store() {
        let store = Arc::new(MemoryStore::new());
        let cache = TokenCache::new(store.clone());

        assert_eq!(cache.get().await, None);

        cache.put(&token("abc", 3600)).await;
        assert_eq!(cache.get().await.as_deref(), Some("abc"));
        assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("abc"));

        cache.invalidate().await;
        assert_eq!(cache.get().await, None);
    }
}
