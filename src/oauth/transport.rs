//! Custom `oauth2::AsyncHttpClient` transport (C6), modeled directly on the
//! grounding codebase's reqwest-to-`oauth2::http` bridge, extended to always
//! attach the authoritative `code_verifier` to an outbound token-exchange
//! request body.

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;

use oauth2::AsyncHttpClient;
use oauth2::http::{self, HeaderValue, StatusCode};

pub type HttpRequest = http::Request<Vec<u8>>;
pub type HttpResponse = http::Response<Vec<u8>>;

/// Bridges `reqwest` to `oauth2::AsyncHttpClient`, injecting `code_verifier`
/// into any `application/x-www-form-urlencoded` request body.
///
/// Redirects are disabled (SSRF protection): the proxy only ever talks to
/// the upstream token endpoint directly, never to wherever that endpoint
/// might redirect.
#[derive(Clone)]
pub struct PkceInjectingTransport {
    inner: reqwest::Client,
    code_verifier: String,
}

impl PkceInjectingTransport {
    pub fn new(code_verifier: String) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(crate::timeouts::TOKEN_EXCHANGE_TIMEOUT)
            .build()?;
        Ok(Self {
            inner,
            code_verifier,
        })
    }

    fn inject_code_verifier(&self, body: Vec<u8>) -> Vec<u8> {
        let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(&body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .filter(|(k, _)| k != "code_verifier")
            .collect();
        pairs.push(("code_verifier".to_string(), self.code_verifier.clone()));

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &pairs {
            serializer.append_pair(k, v);
        }
        serializer.finish().into_bytes()
    }

    /// Direct entry point for callers that build a token request by hand
    /// rather than through an `oauth2::basic::BasicClient`.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.execute(request).await
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (parts, body) = request.into_parts();

        let is_form = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

        let body = if is_form {
            self.inject_code_verifier(body)
        } else {
            body
        };

        let url = parts.uri.to_string();
        let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
            .map_err(|_| TransportError::InvalidHeader(format!("invalid method: {}", parts.method)))?;

        let mut req_builder = self.inner.request(method, &url);
        for (name, value) in parts.headers.iter() {
            req_builder = req_builder.header(name.as_str(), value.as_bytes());
        }
        req_builder = req_builder.body(body);

        let response = req_builder.send().await?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|_| TransportError::InvalidHeader("invalid status code".to_string()))?;
        let mut builder = http::Response::builder().status(status);
        for (name, value) in response.headers().iter() {
            let header_value = HeaderValue::from_bytes(value.as_bytes())
                .map_err(|e| TransportError::InvalidHeader(e.to_string()))?;
            builder = builder.header(name.as_str(), header_value);
        }

        let body_bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::BodyRead(e.to_string()))?;

        builder
            .body(body_bytes.to_vec())
            .map_err(|e| TransportError::InvalidHeader(e.to_string()))
    }
}

#[derive(Debug)]
pub enum TransportError {
    Request(reqwest::Error),
    InvalidHeader(String),
    BodyRead(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(e) => write!(f, "HTTP request failed: {e}"),
            Self::InvalidHeader(msg) => write!(f, "invalid header value: {msg}"),
            Self::BodyRead(msg) => write!(f, "failed to read response body: {msg}"),
        }
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e)
    }
}

pub type TransportFuture<'c> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'c>>;

impl<'c> AsyncHttpClient<'c> for PkceInjectingTransport {
    type Error = TransportError;
    type Future = TransportFuture<'c>;

    fn call(&'c self, request: HttpRequest) -> Self::Future {
        Box::pin(async move { self.execute(request).await })
    }
}
