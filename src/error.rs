//! Error taxonomy for the authorization core.
//!
//! One enum realizes every conceptual error kind the rest of the crate needs:
//! construction-time failures, token-validation failures, OAuth protocol
//! failures, and opaque upstream/internal failures. Call sites map a variant
//! to an HTTP status or an OAuth `error`/`error_description` pair via
//! [`AuthError::status_code`] and [`AuthError::oauth_error`]; neither ever
//! includes the raw credential.

use axum::http::StatusCode;

/// A fingerprint-derived correlator, never the raw secret, safe to log.
pub type Correlator = String;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed or incomplete [`crate::config::Configuration`]. Only raised at
    /// construction; fatal to the process.
    #[error("configuration error: {0}")]
    Config(String),

    /// Token failed a cryptographic, claim, or lifetime check.
    #[error("token validation failed: {0}")]
    Validation(String),

    /// Client-supplied redirect URI violates the configured policy.
    #[error("redirect policy violation: {0}")]
    RedirectPolicy(String),

    /// Signed-state decoding, HMAC verification, or the post-decode
    /// redirect re-check failed.
    #[error("state integrity check failed ({correlator})")]
    StateIntegrity { correlator: Correlator },

    /// Discovery, JWKS fetch, or token-exchange call to the upstream
    /// provider failed or timed out.
    #[error("upstream provider error: {0}")]
    Upstream(String),

    /// An outbound HTTP call to the upstream provider failed.
    #[error("upstream request failed")]
    UpstreamRequest(#[from] reqwest::Error),

    /// Unexpected internal condition.
    #[error("internal error")]
    Internal(String),
}

impl AuthError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn redirect_policy(msg: impl Into<String>) -> Self {
        Self::RedirectPolicy(msg.into())
    }

    pub fn state_integrity(correlator: impl Into<String>) -> Self {
        Self::StateIntegrity {
            correlator: correlator.into(),
        }
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status this error maps to at a boundary adapter.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::UNAUTHORIZED,
            Self::RedirectPolicy(_) | Self::StateIntegrity { .. } => StatusCode::BAD_REQUEST,
            Self::Upstream(_) | Self::UpstreamRequest(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// OAuth `error` code for client-facing protocol responses. Redirect and
    /// state-integrity failures are always `invalid_request`; everything
    /// else collapses to `server_error` so upstream detail never leaks.
    pub fn oauth_error(&self) -> &'static str {
        match self {
            Self::RedirectPolicy(_) | Self::StateIntegrity { .. } => "invalid_request",
            Self::Validation(_) => "invalid_token",
            _ => "server_error",
        }
    }

    /// A message safe to place in a response body: coarse-grained, never
    /// containing secrets, upstream detail, or internal state.
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation(reason) => reason.clone(),
            Self::RedirectPolicy(_) => "redirect_uri is not permitted by server policy".to_string(),
            Self::StateIntegrity { .. } => "state parameter failed integrity check".to_string(),
            Self::Upstream(_) | Self::UpstreamRequest(_) => {
                "upstream provider request failed".to_string()
            }
            Self::Config(_) | Self::Internal(_) => "internal server error".to_string(),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

impl axum::response::IntoResponse for AuthError {
    /// Renders the OAuth-conventional `{error, error_description}` body at
    /// this error's status code. Construction and internal failures are
    /// additionally logged with their correlator (never the secret itself)
    /// before collapsing to a generic client-facing message.
    fn into_response(self) -> axum::response::Response {
        match &self {
            Self::Config(_) | Self::Internal(_) | Self::Upstream(_) | Self::UpstreamRequest(_) => {
                tracing::error!(error = %self, "internal authorization error");
            }
            Self::RedirectPolicy(_) => tracing::warn!(error = %self, "redirect policy violation"),
            Self::StateIntegrity { correlator } => {
                tracing::warn!(correlator, "state integrity check failed");
            }
            Self::Validation(_) => {}
        }
        let body = serde_json::json!({
            "error": self.oauth_error(),
            "error_description": self.client_message(),
        });
        (self.status_code(), axum::Json(body)).into_response()
    }
}
