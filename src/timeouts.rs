//! Compiled-in timeout and TTL defaults, collected in one place so a future
//! `Configuration` field can override them without API churn (§5).

use std::time::Duration;

/// OIDC discovery, JWKS fetch, and per-call OIDC verification deadline.
pub const OIDC_NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

/// Upstream `/oauth/token` exchange deadline.
pub const TOKEN_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Clock skew leeway applied to `exp`/`nbf`/`iat` checks.
pub const CLOCK_SKEW_LEEWAY: Duration = Duration::from_secs(60);

/// Authentication cache entry lifetime (independent of the token's own `exp`).
pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// JWKS pass-through cache lifetime (§4.6).
pub const JWKS_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
