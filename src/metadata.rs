//! Mode-aware `/.well-known/*` metadata publishers (C7).
//!
//! Mode-awareness is non-negotiable: in native mode every URL points at the
//! upstream provider so the client can OAuth directly with it; in proxy
//! mode every URL points at this server's own `server_url`.

use serde::Serialize;

use crate::config::{Configuration, Mode};
use crate::oauth::upstream_endpoints;

#[derive(Debug, Serialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
}

/// The externally-visible base this mode publishes as the authorization
/// server: `server_url` in proxy mode, `issuer` in native mode.
fn authority_base(config: &Configuration) -> String {
    match config.resolved_mode() {
        Mode::Proxy => config.server_url.clone().unwrap_or_default(),
        Mode::Native => config.issuer.clone(),
    }
}

pub fn authorization_server_metadata(config: &Configuration) -> AuthorizationServerMetadata {
    let base = authority_base(config);
    // Proxy mode: this server implements /oauth/authorize and /oauth/token
    // itself. Native mode: the client talks to the upstream provider
    // directly, so publish its real, provider-specific endpoints rather
    // than a path this server never serves.
    let (authorization_endpoint, token_endpoint) = match config.resolved_mode() {
        Mode::Proxy => (format!("{base}/oauth/authorize"), format!("{base}/oauth/token")),
        Mode::Native => upstream_endpoints(config.provider, &config.issuer),
    };
    AuthorizationServerMetadata {
        issuer: base,
        authorization_endpoint,
        token_endpoint,
        response_types_supported: vec!["code".to_string()],
        grant_types_supported: vec!["authorization_code".to_string()],
        code_challenge_methods_supported: vec!["plain".to_string(), "S256".to_string()],
    }
}

/// OIDC discovery document; shares the authorization-server metadata shape
/// per spec, so this is a thin relabeling.
pub fn openid_configuration(config: &Configuration) -> AuthorizationServerMetadata {
    authorization_server_metadata(config)
}

pub fn protected_resource_metadata(config: &Configuration) -> ProtectedResourceMetadata {
    let authorization_server = match config.resolved_mode() {
        Mode::Proxy => config.server_url.clone().unwrap_or_default(),
        Mode::Native => config.issuer.clone(),
    };
    ProtectedResourceMetadata {
        resource: config.server_url.clone().unwrap_or_else(|| config.issuer.clone()),
        authorization_servers: vec![authorization_server],
    }
}
