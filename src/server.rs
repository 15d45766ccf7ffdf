//! The `Server` facade (C8): validates configuration, wires the validator,
//! cache, redirect policy, and PKCE store, and exposes the entry points the
//! surrounding HTTP/tool-server adapter calls.
//!
//! Deliberately not a `once_cell`/`static` singleton (see
//! `manager.rs::GLOBAL_AUTH_MANAGER` in the grounding codebase for the
//! anti-pattern this avoids): every piece of mutable state is an owned
//! field, so two `Server`s in one process share nothing.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, middleware};
use tracing::{debug, warn};

use crate::cache::{AuthCache, correlator, fingerprint};
use crate::config::{Configuration, Mode, Provider};
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::metadata;
use crate::oauth::OAuthState;
use crate::principal::Principal;
use crate::timeouts::CACHE_TTL;
use crate::validator::{HmacValidator, JwksClient, OidcValidator, Validator, discover_jwks_uri, known_jwks_uri};

/// An embeddable OAuth 2.1 authorization and token-validation core.
///
/// Construct once per deployment with [`Server::new`]; the returned value
/// owns everything it needs and has no dependency on process-global state.
pub struct Server {
    config: Configuration,
    validator: Arc<dyn Validator>,
    cache: AuthCache,
    oauth_state: Option<Arc<OAuthState>>,
    jwks_passthrough: Option<Arc<JwksClient>>,
}

impl Server {
    /// Validates `config`, builds the configured validator (HMAC or OIDC
    /// discovery against the issuer), and — in proxy mode — builds the
    /// OAuth endpoint state and JWKS pass-through client. OIDC discovery
    /// happens here and is eager: construction fails fast if the issuer is
    /// unreachable.
    pub async fn new(config: Configuration) -> AuthResult<Self> {
        config.validate()?;

        let validator: Arc<dyn Validator> = match config.provider {
            Provider::Hmac => {
                let secret = config
                    .jwt_secret
                    .clone()
                    .ok_or_else(|| AuthError::config("hmac provider requires jwt_secret"))?;
                Arc::new(HmacValidator::new(
                    config.issuer.clone(),
                    config.audience.clone(),
                    secret,
                ))
            }
            Provider::Okta | Provider::Google | Provider::Azure => Arc::new(
                OidcValidator::discover(config.provider, config.issuer.clone(), config.audience.clone())
                    .await?,
            ),
        };

        let oauth_state = match config.resolved_mode() {
            Mode::Proxy => Some(Arc::new(OAuthState::new(&config)?)),
            Mode::Native => None,
        };

        let jwks_passthrough = Self::build_jwks_passthrough(&config).await?;

        Ok(Self {
            config,
            validator,
            cache: AuthCache::new(),
            oauth_state,
            jwks_passthrough,
        })
    }

    /// Builds the `/.well-known/jwks.json` pass-through client in proxy
    /// mode. The HMAC test provider has no real upstream JWKS document, so
    /// it gets no pass-through client and no route.
    async fn build_jwks_passthrough(config: &Configuration) -> AuthResult<Option<Arc<JwksClient>>> {
        if config.resolved_mode() != Mode::Proxy {
            return Ok(None);
        }
        let uri = match known_jwks_uri(config.provider, &config.issuer) {
            Some(uri) => uri,
            None if config.provider == Provider::Hmac => return Ok(None),
            None => discover_jwks_uri(&config.issuer).await?,
        };
        Ok(Some(Arc::new(JwksClient::new(uri)?)))
    }

    pub fn mode(&self) -> Mode {
        self.config.resolved_mode()
    }

    /// Validates `credential`, consulting the cache first. A cache hit
    /// skips the validator entirely; a miss validates and, on success,
    /// stores the principal under `min(CACHE_TTL, exp - now)` — a token
    /// whose own `exp` is sooner than [`CACHE_TTL`] is never cached past its
    /// actual expiry.
    pub async fn validate_token_cached(&self, credential: &str) -> AuthResult<Principal> {
        let fp = fingerprint(credential);

        if let Some(principal) = self.cache.lookup(&fp).await {
            return Ok(principal);
        }

        let validated = self.validator.validate(credential).await.inspect_err(|e| {
            warn!(correlator = %correlator(credential), error = %e, "token validation failed");
        })?;

        let ttl = clamp_cache_ttl(validated.expires_at);
        self.cache.store(fp, validated.principal.clone(), ttl).await;
        Ok(validated.principal)
    }

    /// Attaches the mode-dependent set of OAuth and metadata routes to
    /// `router`, mirroring the grounding codebase's `AxumMcpExt` route
    /// composition pattern.
    pub fn register_handlers(&self, router: Router) -> Router {
        let metadata_router = Router::new()
            .route(
                "/.well-known/oauth-authorization-server",
                get(serve_authorization_server_metadata),
            )
            .route(
                "/.well-known/openid-configuration",
                get(serve_openid_configuration),
            )
            .route(
                "/.well-known/oauth-protected-resource",
                get(serve_protected_resource_metadata),
            )
            .with_state(Arc::new(MetadataState {
                config: self.config.clone(),
            }));

        let mut router = router.merge(metadata_router);

        if let Some(jwks_client) = &self.jwks_passthrough {
            let jwks_router = Router::new()
                .route("/.well-known/jwks.json", get(serve_jwks_passthrough))
                .with_state(jwks_client.clone());
            router = router.merge(jwks_router);
        }

        match (&self.oauth_state, self.config.resolved_mode()) {
            (Some(oauth_state), Mode::Proxy) => router.merge(crate::oauth::routes(oauth_state.clone())),
            _ => router
                .route("/oauth/authorize", get(native_mode_oauth_unavailable))
                .route("/oauth/callback", get(native_mode_oauth_unavailable))
                .route("/oauth/token", axum::routing::post(native_mode_oauth_unavailable)),
        }
    }

    /// `axum::middleware::from_fn`-compatible adapter: rejects requests
    /// lacking a well-formed Bearer credential with HTTP 401 before `next`
    /// ever runs.
    pub async fn wrap_handler(
        self: Arc<Self>,
        headers: HeaderMap,
        request: axum::extract::Request,
        next: middleware::Next,
    ) -> Response {
        let credential = match extract_bearer(&headers) {
            Some(c) => c,
            None => return unauthorized_response(),
        };

        match self.validate_token_cached(&credential).await {
            Ok(principal) => {
                debug!(subject = %principal.subject, "request authenticated");
                let mut request = request;
                request.extensions_mut().insert(principal);
                next.run(request).await
            }
            Err(_) => unauthorized_response(),
        }
    }

    /// Tool-call middleware factory (C10): given the `next` tool handler,
    /// returns a handler that pulls the credential out of [`RequestContext`],
    /// validates it (cache first), and either fails the call with an
    /// authentication error or injects the principal and delegates to
    /// `next`. Unlike [`Server::wrap_handler`] this operates on the
    /// tool-server SDK's own context type rather than an HTTP request, so
    /// adapters for different SDKs can share it.
    pub fn tool_call_middleware<F, Fut>(
        self: &Arc<Self>,
        next: F,
    ) -> impl Fn(RequestContext) -> std::pin::Pin<Box<dyn std::future::Future<Output = AuthResult<RequestContext>> + Send>>
    + Send
    + Sync
    + 'static
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AuthResult<RequestContext>> + Send + 'static,
    {
        let server = Arc::clone(self);
        let next = Arc::new(next);
        move |ctx: RequestContext| {
            let server = Arc::clone(&server);
            let next = Arc::clone(&next);
            Box::pin(async move {
                let credential = ctx
                    .get_credential()
                    .ok_or_else(|| AuthError::validation("missing bearer credential"))?
                    .to_string();
                let principal = server.validate_token_cached(&credential).await?;
                next(ctx.with_principal(principal)).await
            })
        }
    }
}

/// `min(CACHE_TTL, exp - now)`, floored at zero. A token with no `exp`
/// claim (an OIDC provider technically need not require one) falls back to
/// the full `CACHE_TTL`.
fn clamp_cache_ttl(expires_at: Option<i64>) -> Duration {
    match expires_at {
        Some(exp) => {
            let remaining = (exp - chrono::Utc::now().timestamp()).max(0) as u64;
            Duration::from_secs(remaining).min(CACHE_TTL)
        }
        None => CACHE_TTL,
    }
}

/// Strict Bearer parsing per the external interface: case-sensitive
/// `Bearer `, exactly one separating space, no alternative schemes.
fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() || token.starts_with(' ') {
        return None;
    }
    Some(token.to_string())
}

fn unauthorized_response() -> Response {
    let body = serde_json::json!({
        "error": "unauthorized",
        "error_description": "a valid Bearer credential is required",
    });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

async fn native_mode_oauth_unavailable() -> Response {
    let body = serde_json::json!({
        "error": "not_found",
        "error_description": "this server validates tokens issued elsewhere; authenticate directly with the upstream provider",
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

struct MetadataState {
    config: Configuration,
}

async fn serve_authorization_server_metadata(
    State(state): State<Arc<MetadataState>>,
) -> Json<metadata::AuthorizationServerMetadata> {
    Json(metadata::authorization_server_metadata(&state.config))
}

async fn serve_openid_configuration(
    State(state): State<Arc<MetadataState>>,
) -> Json<metadata::AuthorizationServerMetadata> {
    Json(metadata::openid_configuration(&state.config))
}

async fn serve_protected_resource_metadata(
    State(state): State<Arc<MetadataState>>,
) -> Json<metadata::ProtectedResourceMetadata> {
    Json(metadata::protected_resource_metadata(&state.config))
}

async fn serve_jwks_passthrough(State(client): State<Arc<JwksClient>>) -> Result<Response, AuthError> {
    let jwks = client.get_jwks().await?;
    Ok(Json(jwks).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn hmac_config() -> Configuration {
        Configuration {
            provider: Provider::Hmac,
            mode: None,
            issuer: String::new(),
            audience: "api://x".into(),
            jwt_secret: Some(SecretString::from("0123456789abcdef0123456789abcdef")),
            client_id: None,
            client_secret: None,
            server_url: None,
            redirect_uris: String::new(),
        }
    }

    #[tokio::test]
    async fn native_hmac_server_constructs_and_resolves_native_mode() {
        let server = Server::new(hmac_config()).await.unwrap();
        assert_eq!(server.mode(), Mode::Native);
    }

    #[test]
    fn extract_bearer_requires_exact_scheme_and_single_space() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer(&headers).as_deref(), Some("abc.def.ghi"));

        let mut lowercase = HeaderMap::new();
        lowercase.insert(axum::http::header::AUTHORIZATION, "bearer abc".parse().unwrap());
        assert_eq!(extract_bearer(&lowercase), None);

        let mut double_space = HeaderMap::new();
        double_space.insert(axum::http::header::AUTHORIZATION, "Bearer  abc".parse().unwrap());
        assert_eq!(extract_bearer(&double_space), None);
    }

    #[tokio::test]
    async fn two_servers_have_disjoint_caches() {
        let a = Server::new(hmac_config()).await.unwrap();
        let b = Server::new(hmac_config()).await.unwrap();
        let principal = Principal {
            subject: "u".into(),
            username: "u".into(),
            email: None,
        };
        a.cache.store("fp".into(), principal, CACHE_TTL).await;
        assert!(a.cache.lookup("fp").await.is_some());
        assert!(b.cache.lookup("fp").await.is_none());
    }

    #[test]
    fn clamp_cache_ttl_shortens_to_a_token_expiring_sooner_than_cache_ttl() {
        let exp = chrono::Utc::now().timestamp() + 30;
        let ttl = clamp_cache_ttl(Some(exp));
        assert!(ttl <= Duration::from_secs(30) && ttl > Duration::from_secs(25));
    }

    #[test]
    fn clamp_cache_ttl_never_exceeds_cache_ttl() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        assert_eq!(clamp_cache_ttl(Some(exp)), CACHE_TTL);
    }

    #[test]
    fn clamp_cache_ttl_floors_at_zero_for_an_already_past_exp() {
        let exp = chrono::Utc::now().timestamp() - 10;
        assert_eq!(clamp_cache_ttl(Some(exp)), Duration::ZERO);
    }

    #[test]
    fn clamp_cache_ttl_falls_back_to_cache_ttl_when_exp_is_absent() {
        assert_eq!(clamp_cache_ttl(None), CACHE_TTL);
    }

    fn sign_hmac(claims: &serde_json::Value) -> String {
        use jsonwebtoken::{EncodingKey, Header, encode};
        encode(
            &Header::new(jsonwebtoken::Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(b"0123456789abcdef0123456789abcdef"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn tool_call_middleware_delegates_to_next_on_success() {
        let server = Arc::new(Server::new(hmac_config()).await.unwrap());
        let token = sign_hmac(&serde_json::json!({
            "sub": "u",
            "aud": "api://x",
            "iss": "",
            "exp": chrono::Utc::now().timestamp() + 3600,
            "iat": chrono::Utc::now().timestamp(),
        }));

        let middleware = server.tool_call_middleware(|ctx: RequestContext| async move {
            let principal = ctx.get_principal().cloned();
            Ok(RequestContext::new().with_credential(principal.unwrap().subject))
        });

        let ctx = RequestContext::new().with_credential(token);
        let result = middleware(ctx).await.unwrap();
        assert_eq!(result.get_credential(), Some("u"));
    }

    #[tokio::test]
    async fn tool_call_middleware_rejects_missing_credential_without_calling_next() {
        let server = Arc::new(Server::new(hmac_config()).await.unwrap());
        let middleware = server.tool_call_middleware(|_ctx: RequestContext| async move {
            panic!("next must not run when no credential is present");
        });

        let result = middleware(RequestContext::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tool_call_middleware_rejects_invalid_token_without_calling_next() {
        let server = Arc::new(Server::new(hmac_config()).await.unwrap());
        let middleware = server.tool_call_middleware(|_ctx: RequestContext| async move {
            panic!("next must not run when validation fails");
        });

        let ctx = RequestContext::new().with_credential("not-a-real-token");
        let result = middleware(ctx).await;
        assert!(result.is_err());
    }
}
