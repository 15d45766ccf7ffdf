//! Shared test infrastructure: spins up a real `Server` behind a bound
//! TCP listener so integration tests drive it with plain `reqwest`, the
//! same style the grounding codebase uses in its own integration suite.

#![allow(dead_code)]

use mcp_auth_core::{Configuration, Provider, Server};
use secrecy::SecretString;
use tokio::net::TcpListener;

pub const HMAC_SECRET: &str = "0123456789abcdef0123456789abcdef";

pub fn hmac_config(issuer: &str, audience: &str) -> Configuration {
    Configuration {
        provider: Provider::Hmac,
        mode: None,
        issuer: issuer.to_string(),
        audience: audience.to_string(),
        jwt_secret: Some(SecretString::from(HMAC_SECRET)),
        client_id: None,
        client_secret: None,
        server_url: None,
        redirect_uris: String::new(),
    }
}

/// Boots `config` behind a real listener on an OS-assigned port and returns
/// the base URL the caller can `reqwest` against. The listener task is
/// detached; it dies with the test process.
pub async fn spawn_server(config: Configuration) -> String {
    let server = Server::new(config).await.expect("server construction failed");
    let router = server.register_handlers(axum::Router::new());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("failed to bind");
    let addr = listener.local_addr().expect("listener has no local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server task failed");
    });

    format!("http://{addr}")
}

pub fn sign_hmac_jwt(claims: &serde_json::Value) -> String {
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(HMAC_SECRET.as_bytes()))
        .expect("test claims always encode")
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
