//! Instance-scoped authentication cache (C3).
//!
//! Keyed by the SHA-256 fingerprint of the credential bytes — the raw token
//! is never used as a map key and never logged. TTL is independent of the
//! token's own `exp`; see [`CACHE_TTL`] in [`crate::timeouts`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::principal::Principal;

/// SHA-256 fingerprint of a credential, used as both cache key and log
/// correlator. Never reversible to the original token.
pub fn fingerprint(credential: &str) -> String {
    let digest = Sha256::digest(credential.as_bytes());
    hex_encode(&digest)
}

/// First 16 hex chars of the fingerprint, the correlator callers may log.
pub fn correlator(credential: &str) -> String {
    fingerprint(credential)[..16].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[derive(Debug, Clone)]
struct CachedEntry {
    principal: Principal,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Bounded-lifetime map from credential fingerprint to verified principal.
/// One instance per [`crate::server::Server`]; never shared across servers.
#[derive(Debug, Default)]
pub struct AuthCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
}

impl AuthCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached principal if present and not expired. A lazy sweep
    /// removes the entry from the map when it is found expired.
    pub async fn lookup(&self, fingerprint: &str) -> Option<Principal> {
        {
            let entries = self.entries.read().await;
            match entries.get(fingerprint) {
                Some(entry) if !entry.is_expired() => return Some(entry.principal.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut entries = self.entries.write().await;
        entries.remove(fingerprint);
        None
    }

    /// Stores (replacing any prior entry) a principal under `fingerprint`
    /// with the given TTL. A zero TTL stores an already-expired entry, so
    /// the very next lookup is a miss.
    pub async fn store(&self, fingerprint: String, principal: Principal, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        let mut entries = self.entries.write().await;
        entries.insert(fingerprint, CachedEntry {
            principal,
            expires_at,
        });
    }
}
