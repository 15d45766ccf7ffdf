//! JWKS fetching and caching for the OIDC validator, grounded on the same
//! TTL-plus-rate-limited-refresh shape used elsewhere in this codebase's
//! lineage for remote key sets.

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use tokio::sync::RwLock;

use crate::error::{AuthError, AuthResult};
use crate::timeouts::{JWKS_CACHE_TTL, OIDC_NETWORK_TIMEOUT};

struct CachedJwks {
    jwks: JwkSet,
    cached_at: Instant,
}

impl CachedJwks {
    fn is_valid(&self) -> bool {
        self.cached_at.elapsed() < JWKS_CACHE_TTL
    }
}

/// Fetches and caches a single issuer's JWKS document.
pub struct JwksClient {
    jwks_uri: String,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedJwks>>,
    last_refresh: RwLock<Option<Instant>>,
    min_refresh_interval: Duration,
}

impl JwksClient {
    pub fn new(jwks_uri: String) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(OIDC_NETWORK_TIMEOUT)
            .build()
            .map_err(|e| AuthError::internal(format!("failed to build JWKS http client: {e}")))?;

        Ok(Self {
            jwks_uri,
            http_client,
            cache: RwLock::new(None),
            last_refresh: RwLock::new(None),
            min_refresh_interval: Duration::from_secs(5),
        })
    }

    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    pub async fn get_jwks(&self) -> AuthResult<JwkSet> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.jwks.clone());
                }
            }
        }
        self.fetch_and_cache().await
    }

    /// Forces a refresh, rate-limited to avoid hammering the provider when
    /// validation keeps failing (e.g. during key rotation).
    pub async fn refresh(&self) -> AuthResult<JwkSet> {
        {
            let last = self.last_refresh.read().await;
            if let Some(last) = *last {
                if last.elapsed() < self.min_refresh_interval {
                    return self.get_jwks().await;
                }
            }
        }
        self.fetch_and_cache().await
    }

    async fn fetch_and_cache(&self) -> AuthResult<JwkSet> {
        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::upstream(format!("JWKS fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::upstream(format!(
                "JWKS endpoint returned status {}",
                response.status()
            )));
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::upstream(format!("invalid JWKS document: {e}")))?;

        *self.cache.write().await = Some(CachedJwks {
            jwks: jwks.clone(),
            cached_at: Instant::now(),
        });
        *self.last_refresh.write().await = Some(Instant::now());

        Ok(jwks)
    }
}
