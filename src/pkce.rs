//! In-memory PKCE record map (proxy mode), one entry per in-flight
//! authorization code, keyed by the upstream `state`. Inserted at authorize
//! time, consumed at token-exchange time; lookups under one key are
//! serialized by the map's lock (§5 ordering guarantee).

use std::collections::HashMap;

use tokio::sync::RwLock;

/// `{code_verifier, client_redirect_uri}`, immutable after insert.
#[derive(Debug, Clone)]
pub struct PkceRecord {
    pub code_verifier: String,
    pub client_redirect_uri: String,
}

#[derive(Debug, Default)]
pub struct PkceStore {
    records: RwLock<HashMap<String, PkceRecord>>,
}

impl PkceStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, upstream_state: String, record: PkceRecord) {
        self.records.write().await.insert(upstream_state, record);
    }

    /// Removes and returns the record, since a PKCE record is consumed
    /// exactly once at token exchange.
    pub async fn take(&self, upstream_state: &str) -> Option<PkceRecord> {
        self.records.write().await.remove(upstream_state)
    }
}
