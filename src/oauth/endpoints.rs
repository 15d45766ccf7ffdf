//! Per-provider upstream authorize/token endpoint defaults, the
//! authorization-flow counterpart to [`crate::validator::known_jwks_uri`].

use crate::config::Provider;

/// `(authorize_url, token_url)` for the given provider's upstream.
///
/// Okta and Google have fixed, well-known paths; Azure AD's v2 endpoints
/// hang off its tenant-scoped issuer, so they are derived from it; the HMAC
/// test provider has no real upstream authorization server of its own and
/// is expected to be paired with a local mock in proxy-mode tests, so its
/// issuer is treated the same way as Azure's.
pub fn upstream_endpoints(provider: Provider, issuer: &str) -> (String, String) {
    match provider {
        Provider::Okta => (
            format!("{issuer}/oauth2/v1/authorize"),
            format!("{issuer}/oauth2/v1/token"),
        ),
        Provider::Google => (
            "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            "https://oauth2.googleapis.com/token".to_string(),
        ),
        Provider::Azure | Provider::Hmac => (
            format!("{issuer}/oauth2/v2.0/authorize"),
            format!("{issuer}/oauth2/v2.0/token"),
        ),
    }
}
