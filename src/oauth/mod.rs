//! OAuth 2.1 authorization-code-with-PKCE endpoint set (C6), active only in
//! proxy mode: `/oauth/authorize`, `/oauth/callback`, `/oauth/token`.

mod endpoints;
mod transport;

pub use endpoints::upstream_endpoints;
pub use transport::PkceInjectingTransport;

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{self, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, body::Body};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use oauth2::PkceCodeChallenge;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::config::{Configuration, Provider};
use crate::error::{AuthError, AuthResult};
use crate::pkce::{PkceRecord, PkceStore};
use crate::redirect::RedirectPolicy;
use crate::state::SignedState;

/// Everything the three OAuth handlers need, shared behind an `Arc` as
/// axum router state.
pub struct OAuthState {
    client_id: String,
    client_secret: Option<SecretString>,
    jwt_secret: Option<SecretString>,
    redirect_policy: RedirectPolicy,
    pkce_store: PkceStore,
    upstream_authorize_url: String,
    upstream_token_url: String,
}

impl OAuthState {
    pub fn new(config: &Configuration) -> AuthResult<Self> {
        let client_id = config
            .client_id
            .clone()
            .ok_or_else(|| AuthError::config("proxy mode requires client_id"))?;
        let (upstream_authorize_url, upstream_token_url) =
            upstream_endpoints(config.provider, &config.issuer);

        Ok(Self {
            client_id,
            client_secret: config.client_secret.clone(),
            jwt_secret: config.jwt_secret.clone(),
            redirect_policy: RedirectPolicy::from_config(&config.redirect_uris),
            pkce_store: PkceStore::new(),
            upstream_authorize_url,
            upstream_token_url,
        })
    }

    fn signing_key(&self) -> AuthResult<&SecretString> {
        self.jwt_secret
            .as_ref()
            .ok_or_else(|| AuthError::internal("fixed-redirect mode requires jwt_secret"))
    }
}

/// Builds a bare HTTP 302 redirect response, matching the provider
/// round-trip convention used throughout the authorization flow rather
/// than `axum::response::Redirect`'s default 303.
fn redirect_found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(axum::http::header::LOCATION, location.to_string())],
    )
        .into_response()
}

/// Attaches the three OAuth routes to `router`. Only called by
/// [`crate::server::Server::register_handlers`] when proxy mode is active.
pub fn routes(state: Arc<OAuthState>) -> Router {
    Router::new()
        .route("/oauth/authorize", get(authorize))
        .route("/oauth/callback", get(callback))
        .route("/oauth/token", post(token))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    #[allow(dead_code)]
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub state: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: Option<String>,
}

async fn authorize(
    State(state): State<Arc<OAuthState>>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, AuthError> {
    if params.response_type != "code" {
        return Err(AuthError::redirect_policy("response_type must be \"code\""));
    }

    let client_redirect = state.redirect_policy.validate(&params.redirect_uri)?;

    let (code_challenge, code_challenge_method, stored_verifier) = match &params.code_challenge {
        Some(challenge) => (
            challenge.clone(),
            params
                .code_challenge_method
                .clone()
                .unwrap_or_else(|| "S256".to_string()),
            // The client holds its own verifier and will present it at
            // /oauth/token directly; we have nothing to store here.
            String::new(),
        ),
        None => {
            let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
            (
                challenge.as_str().to_string(),
                "S256".to_string(),
                verifier.secret().clone(),
            )
        }
    };

    let upstream_redirect = match &state.redirect_policy {
        RedirectPolicy::Fixed(uri) => uri.clone(),
        RedirectPolicy::Allowlist(_) => client_redirect.clone(),
        RedirectPolicy::RejectAll => {
            return Err(AuthError::redirect_policy(
                "no redirect_uris configured; all authorization requests are rejected",
            ));
        }
    };

    let upstream_state = match &state.redirect_policy {
        RedirectPolicy::Fixed(_) => {
            SignedState::encode(&params.state, &client_redirect, state.signing_key()?)
        }
        _ => params.state.clone(),
    };

    state
        .pkce_store
        .insert(
            upstream_state.clone(),
            PkceRecord {
                code_verifier: stored_verifier,
                client_redirect_uri: client_redirect,
            },
        )
        .await;

    let mut url = Url::parse(&state.upstream_authorize_url)
        .map_err(|e| AuthError::internal(format!("invalid upstream authorize URL: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("response_type", "code");
        query.append_pair("client_id", &state.client_id);
        query.append_pair("redirect_uri", &upstream_redirect);
        query.append_pair("state", &upstream_state);
        query.append_pair("code_challenge", &code_challenge);
        query.append_pair("code_challenge_method", &code_challenge_method);
        if let Some(scope) = &params.scope {
            query.append_pair("scope", scope);
        }
    }

    Ok(redirect_found(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: String,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

async fn callback(
    State(state): State<Arc<OAuthState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AuthError> {
    // Fixed-redirect mode: verify the signed state before ever touching the
    // PKCE store. A tampered state must fail as a state-integrity error
    // (OAuth invalid_request), not masquerade as an unrelated "unknown
    // state" lookup miss once it no longer matches the stored key.
    let decoded_fixed_state = match &state.redirect_policy {
        RedirectPolicy::Fixed(_) => {
            let signed = SignedState::decode(&params.state, state.signing_key()?)?;
            // Defense in depth: a leaked jwt_secret alone must not permit a
            // redirect to a non-loopback URI.
            let revalidated = state.redirect_policy.validate(&signed.client_redirect_uri)?;
            Some((revalidated, signed.csrf_nonce))
        }
        _ => None,
    };

    let record = state
        .pkce_store
        .take(&params.state)
        .await
        .ok_or_else(|| AuthError::validation("unknown or expired authorization state"))?;

    let (client_redirect, client_state) = match decoded_fixed_state {
        Some(pair) => pair,
        None => (record.client_redirect_uri.clone(), params.state.clone()),
    };

    let mut target = Url::parse(&client_redirect)
        .map_err(|e| AuthError::internal(format!("client redirect no longer parses: {e}")))?;

    if let Some(error) = params.error {
        {
            let mut query = target.query_pairs_mut();
            query.append_pair("error", &error);
            if let Some(description) = params.error_description {
                query.append_pair("error_description", &description);
            }
        }
        return Ok(redirect_found(target.as_str()));
    }

    let code = params
        .code
        .ok_or_else(|| AuthError::validation("callback is missing code"))?;

    // Re-key the record under the upstream code so /oauth/token, which
    // never sees `state`, can still find it.
    state.pkce_store.insert(code.clone(), record).await;

    {
        let mut query = target.query_pairs_mut();
        query.append_pair("code", &code);
        query.append_pair("state", &client_state);
    }

    Ok(redirect_found(target.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub grant_type: String,
    pub code: String,
    #[allow(dead_code)]
    pub redirect_uri: String,
    #[serde(default)]
    pub code_verifier: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

async fn token(
    State(state): State<Arc<OAuthState>>,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> Result<Response, AuthError> {
    if form.grant_type != "authorization_code" {
        return Err(AuthError::validation("unsupported grant_type"));
    }

    let record = state.pkce_store.take(&form.code).await;

    let verifier = if !form.code_verifier.trim().is_empty() {
        form.code_verifier.clone()
    } else {
        record.map(|r| r.code_verifier).unwrap_or_default()
    };
    if verifier.is_empty() {
        return Err(AuthError::validation("missing code_verifier"));
    }

    let transport = PkceInjectingTransport::new(verifier)
        .map_err(|e| AuthError::internal(format!("failed to build token transport: {e}")))?;

    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "authorization_code")
        .append_pair("code", &form.code)
        .append_pair("redirect_uri", &form.redirect_uri)
        .finish();

    let mut request_builder = http::Request::builder()
        .method(http::Method::POST)
        .uri(&state.upstream_token_url)
        .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded");

    let (client_id, client_secret) = resolve_client_auth(&headers, &form, &state);
    if let Some(secret) = client_secret {
        let basic = BASE64_STANDARD.encode(format!("{client_id}:{secret}"));
        request_builder = request_builder.header(http::header::AUTHORIZATION, format!("Basic {basic}"));
    }

    let request = request_builder
        .body(body.into_bytes())
        .map_err(|e| AuthError::internal(format!("failed to build token request: {e}")))?;

    let upstream_response = transport
        .send(request)
        .await
        .map_err(|e| AuthError::upstream(format!("token exchange failed: {e}")))?;

    let (parts, body) = upstream_response.into_parts();
    let status = StatusCode::from_u16(parts.status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response_builder = axum::http::Response::builder().status(status);
    if let Some(content_type) = parts.headers.get(http::header::CONTENT_TYPE) {
        response_builder = response_builder.header(axum::http::header::CONTENT_TYPE, content_type.clone());
    }
    response_builder
        .body(Body::from(body))
        .map_err(|e| AuthError::internal(format!("failed to relay upstream response: {e}")))
}

/// HTTP Basic auth header takes priority; falls back to form-posted
/// credentials, falls back to the statically configured client.
fn resolve_client_auth(
    headers: &HeaderMap,
    form: &TokenForm,
    state: &OAuthState,
) -> (String, Option<String>) {
    if let Some(value) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(encoded) = value.strip_prefix("Basic ") {
            if let Ok(decoded) = BASE64_STANDARD.decode(encoded) {
                if let Ok(text) = String::from_utf8(decoded) {
                    if let Some((id, secret)) = text.split_once(':') {
                        return (id.to_string(), Some(secret.to_string()));
                    }
                }
            }
        }
    }

    if let Some(id) = &form.client_id {
        return (id.clone(), form.client_secret.clone());
    }

    (
        state.client_id.clone(),
        state
            .client_secret
            .as_ref()
            .map(|s| s.expose_secret().to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config(redirect_uris: &str) -> Configuration {
        Configuration {
            provider: Provider::Hmac,
            mode: Some(crate::config::Mode::Proxy),
            issuer: "https://idp".into(),
            audience: "api://x".into(),
            jwt_secret: Some(SecretString::from("0123456789abcdef0123456789abcdef")),
            client_id: Some("cid".into()),
            client_secret: Some(SecretString::from("csecret")),
            server_url: Some("https://server".into()),
            redirect_uris: redirect_uris.to_string(),
        }
    }

    #[test]
    fn resolve_client_auth_prefers_basic_header() {
        let cfg = config("https://server/oauth/callback");
        let state = OAuthState::new(&cfg).unwrap();
        let mut headers = HeaderMap::new();
        let basic = BASE64_STANDARD.encode("basic-id:basic-secret");
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Basic {basic}").parse().unwrap(),
        );
        let form = TokenForm {
            grant_type: "authorization_code".into(),
            code: "c".into(),
            redirect_uri: "http://localhost/cb".into(),
            code_verifier: String::new(),
            client_id: Some("form-id".into()),
            client_secret: Some("form-secret".into()),
        };
        let (id, secret) = resolve_client_auth(&headers, &form, &state);
        assert_eq!(id, "basic-id");
        assert_eq!(secret.as_deref(), Some("basic-secret"));
    }

    #[test]
    fn resolve_client_auth_falls_back_to_configured_client() {
        let cfg = config("https://server/oauth/callback");
        let state = OAuthState::new(&cfg).unwrap();
        let form = TokenForm {
            grant_type: "authorization_code".into(),
            code: "c".into(),
            redirect_uri: "http://localhost/cb".into(),
            code_verifier: String::new(),
            client_id: None,
            client_secret: None,
        };
        let (id, secret) = resolve_client_auth(&HeaderMap::new(), &form, &state);
        assert_eq!(id, "cid");
        assert_eq!(secret.as_deref(), Some("csecret"));
    }

    #[tokio::test]
    async fn s6_pkce_synthesis_stores_a_verifier_and_callback_rekeys_it_by_code() {
        let cfg = config("https://server/oauth/callback");
        let state = Arc::new(OAuthState::new(&cfg).unwrap());

        let params = AuthorizeParams {
            client_id: "cid".into(),
            redirect_uri: "http://localhost:6274/cb".into(),
            response_type: "code".into(),
            state: "client-csrf".into(),
            code_challenge: None,
            code_challenge_method: None,
            scope: None,
        };
        let response = authorize(State(state.clone()), Query(params)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response
            .headers()
            .get(axum::http::header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let upstream_url = Url::parse(&location).unwrap();
        let upstream_state = upstream_url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .unwrap()
            .1
            .to_string();

        let callback_params = CallbackParams {
            code: Some("upstream-code".into()),
            state: upstream_state,
            error: None,
            error_description: None,
        };
        let response = callback(State(state.clone()), Query(callback_params)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);

        let record = state.pkce_store.take("upstream-code").await.unwrap();
        assert!(!record.code_verifier.is_empty());
    }
}
