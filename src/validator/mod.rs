//! Validator abstraction (C1/C2): a single capability, `validate`, with two
//! concrete implementations selected by [`crate::config::Provider`] at
//! [`crate::server::Server`] construction time. No dynamic plugin loading.

mod hmac_validator;
mod jwks;
mod oidc;

pub use hmac_validator::HmacValidator;
pub use jwks::JwksClient;
pub(crate) use oidc::discover_jwks_uri;
pub use oidc::{OidcValidator, known_jwks_uri};

use async_trait::async_trait;

use crate::error::AuthResult;
use crate::principal::ValidatedToken;

/// `validate(credential) → principal + exp, or failure`. Implementations
/// must be `Send + Sync` and safe for concurrent use; a dropped caller
/// future must abort any in-flight network I/O promptly (Rust's
/// cancel-by-drop stands in for an explicit caller context, see
/// SPEC_FULL.md §4.1).
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, credential: &str) -> AuthResult<ValidatedToken>;
}
