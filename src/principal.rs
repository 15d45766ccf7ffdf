//! The authenticated identity extracted from a verified JWT (§3).

use serde::{Deserialize, Serialize};

/// RFC 7519 claims this crate reads off a verified JWT in order to build a
/// [`Principal`]. Unrecognized claims are ignored; none of this is ever
/// re-serialized back to a client.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardClaims {
    pub sub: String,
    pub aud: Option<serde_json::Value>,
    pub iss: Option<String>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub nbf: Option<i64>,
    pub email: Option<String>,
    pub preferred_username: Option<String>,
}

/// The authenticated identity: `{subject, username, email}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    pub username: String,
    pub email: Option<String>,
}

impl Principal {
    /// Derive a principal from verified claims per §3: `subject ← sub`;
    /// `email ← email` (optional); `username ← preferred_username` else
    /// `email` else `sub`.
    pub fn from_claims(claims: &StandardClaims) -> Self {
        let username = claims
            .preferred_username
            .clone()
            .or_else(|| claims.email.clone())
            .unwrap_or_else(|| claims.sub.clone());

        Self {
            subject: claims.sub.clone(),
            username,
            email: claims.email.clone(),
        }
    }
}

/// A [`Principal`] paired with its token's `exp`, returned by
/// [`crate::validator::Validator::validate`] so the cache can clamp its TTL
/// to the token's own remaining lifetime instead of always caching for the
/// full [`crate::timeouts::CACHE_TTL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    pub principal: Principal,
    pub expires_at: Option<i64>,
}
