//! Embeddable OAuth 2.1 authorization and token-validation core for
//! JSON-RPC tool-invocation servers.
//!
//! Two deployment modes share one [`Server`]:
//!
//! - **Native mode** validates bearer JWTs issued by an external provider
//!   (HMAC-signed test tokens, or RS/ES/PS-signed OIDC tokens from Okta,
//!   Google, or Azure AD) and does nothing else.
//! - **Proxy mode** additionally mediates the OAuth 2.1
//!   authorization-code-with-PKCE flow between a tool-invocation client and
//!   the upstream provider, since many MCP clients cannot speak OAuth to an
//!   arbitrary provider themselves.
//!
//! Construct a [`Configuration`], pass it to [`Server::new`], then call
//! [`Server::register_handlers`] to attach the OAuth and metadata routes to
//! an [`axum::Router`] and [`Server::wrap_handler`] (or
//! [`Server::tool_call_middleware`] for a non-HTTP tool-server adapter) to
//! protect tool invocations.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod metadata;
pub mod oauth;
pub mod pkce;
pub mod principal;
pub mod redirect;
pub mod server;
pub mod state;
pub mod timeouts;
pub mod validator;

pub use config::{Configuration, Mode, Provider};
pub use context::RequestContext;
pub use error::{AuthError, AuthResult};
pub use principal::Principal;
pub use server::Server;
pub use validator::Validator;
