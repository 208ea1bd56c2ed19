//! Access token caching for service-account requests.
//!
//! Tokens are refreshed a minute before they expire. Concurrent callers
//! share one refresh, and a failed refresh keeps serving the old token
//! while it is still accepted by the server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh this long before the reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Used when the provider reports an expiry we cannot interpret.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// A freshly minted bearer token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Something that can mint access tokens.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn fetch(&self) -> Result<AccessToken, String>;
}

/// Token source backed by a gcp_auth provider (service account file).
pub struct GcpTokenSource {
    provider: Arc<dyn TokenProvider>,
}

impl GcpTokenSource {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl AccessTokenSource for GcpTokenSource {
    async fn fetch(&self) -> Result<AccessToken, String> {
        let token = self
            .provider
            .token(&[FIRESTORE_SCOPE])
            .await
            .map_err(|e| e.to_string())?;
        Ok(AccessToken {
            value: token.as_str().to_string(),
            expires_at: token.expires_at(),
        })
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Converts a wall-clock expiry into a monotonic deadline.
fn deadline_for(expires_at: DateTime<Utc>) -> Instant {
    let now = Utc::now();
    if expires_at <= now {
        return Instant::now();
    }
    match (expires_at - now).to_std() {
        Ok(ttl) => Instant::now() + ttl,
        Err(_) => Instant::now() + TOKEN_DEFAULT_TTL,
    }
}

/// Thread-safe token cache with single-flight refresh.
pub struct TokenCache {
    source: Arc<dyn AccessTokenSource>,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached token so the next call mints a new one.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        match self.source.fetch().await {
            Ok(token) => {
                let access_token = token.value;
                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at: deadline_for(token.expires_at),
                });
                debug!(expires_at = %token.expires_at, "Refreshed Firestore access token");
                Ok(access_token)
            }
            Err(e) => match cache.as_ref() {
                Some(cached) if cached.is_usable() => {
                    warn!("Token refresh failed, using existing token: {}", e);
                    Ok(cached.access_token.clone())
                }
                _ => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                ))),
            },
        }
    }
}
