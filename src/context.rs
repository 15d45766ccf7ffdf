//! Capability-typed per-request context (C9). Keys are private types, never
//! strings, so two different tool-server SDK adapters can share the same
//! context surface without colliding on string keys.
//!
//! Built on [`http::Extensions`], the same type-map primitive
//! `axum::Extension` is already built on — there is no need for a
//! bespoke type map.

use http::Extensions;

use crate::principal::Principal;

/// A bearer credential copied into the context by the tool-server adapter.
#[derive(Debug, Clone)]
pub struct Credential(pub String);

/// The per-request context the tool-call middleware reads from and writes
/// to. Adapters own the HTTP/transport-specific extraction; this type is
/// the stable surface every adapter targets.
#[derive(Debug, Default)]
pub struct RequestContext {
    extensions: Extensions,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.extensions.insert(Credential(credential.into()));
        self
    }

    pub fn get_credential(&self) -> Option<&str> {
        self.extensions.get::<Credential>().map(|c| c.0.as_str())
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.extensions.insert(principal);
        self
    }

    pub fn get_principal(&self) -> Option<&Principal> {
        self.extensions.get::<Principal>()
    }
}
