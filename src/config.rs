//! Construction-time configuration (§3). Immutable once built; invariants
//! are enforced once, inside [`Configuration::validate`], which
//! [`crate::server::Server::new`] calls before allocating anything else.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{AuthError, AuthResult};

/// Selects which [`crate::validator::Validator`] the server builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Hmac,
    Okta,
    Google,
    Azure,
}

impl Provider {
    pub fn is_oidc(self) -> bool {
        !matches!(self, Provider::Hmac)
    }
}

/// Whether this server validates tokens issued elsewhere (`Native`) or
/// mediates the authorization-code flow itself (`Proxy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Native,
    Proxy,
}

/// Immutable configuration for one [`crate::server::Server`] instance.
///
/// Construct with [`Configuration::builder`] or directly as a struct
/// literal; either way, [`Server::new`](crate::server::Server::new) is the
/// only place invariants are enforced.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub provider: Provider,
    /// `None` means "infer from `client_id`" (§3): proxy iff `client_id` is set.
    pub mode: Option<Mode>,
    pub issuer: String,
    pub audience: String,
    pub jwt_secret: Option<SecretString>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub server_url: Option<String>,
    /// Raw config value: empty = reject-all, no comma = fixed-redirect,
    /// one-or-more commas = allowlist. Parsed by [`crate::redirect::RedirectPolicy`].
    pub redirect_uris: String,
}

impl Configuration {
    /// Resolved mode: the explicit value if set, else inferred from
    /// `client_id` per §3.
    pub fn resolved_mode(&self) -> Mode {
        self.mode.unwrap_or(if self.client_id.is_some() {
            Mode::Proxy
        } else {
            Mode::Native
        })
    }

    /// Enforces every construction-time invariant from §3. Returns the
    /// first violation found; does not allocate anything on failure.
    pub fn validate(&self) -> AuthResult<()> {
        if self.audience.trim().is_empty() {
            return Err(AuthError::config("audience must be non-empty"));
        }

        match self.provider {
            Provider::Hmac => {
                let secret = self
                    .jwt_secret
                    .as_ref()
                    .ok_or_else(|| AuthError::config("hmac provider requires jwt_secret"))?;
                if secret.expose_secret().len() < 32 {
                    tracing::warn!("jwt_secret is shorter than the recommended 32 bytes");
                }
            }
            Provider::Okta | Provider::Google | Provider::Azure => {
                if self.issuer.trim().is_empty() {
                    return Err(AuthError::config("oidc providers require a non-empty issuer"));
                }
                let issuer_url = url::Url::parse(&self.issuer)
                    .map_err(|e| AuthError::config(format!("invalid issuer URL: {e}")))?;
                if issuer_url.scheme() != "https" {
                    return Err(AuthError::config("issuer must use https"));
                }
                if self.issuer.ends_with('/') {
                    return Err(AuthError::config("issuer must not have a trailing slash"));
                }
            }
        }

        if self.resolved_mode() == Mode::Proxy {
            if self.client_id.as_deref().unwrap_or("").trim().is_empty() {
                return Err(AuthError::config("proxy mode requires client_id"));
            }
            if self.server_url.as_deref().unwrap_or("").trim().is_empty() {
                return Err(AuthError::config("proxy mode requires server_url"));
            }
            if self.redirect_uris.trim().is_empty() {
                return Err(AuthError::config("proxy mode requires redirect_uris"));
            }
            // Fixed-redirect mode (no comma in redirect_uris) wraps the
            // client redirect in a SignedState, which needs a signing key
            // regardless of which token-validation provider is configured.
            if !self.redirect_uris.contains(',') && self.jwt_secret.is_none() {
                return Err(AuthError::config(
                    "fixed-redirect proxy mode requires jwt_secret to sign the state channel",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Configuration {
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

    #[test]
    fn hmac_native_minimal_config_is_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn empty_audience_rejected() {
        let mut c = base();
        c.audience = "  ".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn hmac_without_secret_rejected() {
        let mut c = base();
        c.jwt_secret = None;
        assert!(c.validate().is_err());
    }

    #[test]
    fn oidc_without_issuer_rejected() {
        let mut c = base();
        c.provider = Provider::Okta;
        assert!(c.validate().is_err());
    }

    #[test]
    fn oidc_with_trailing_slash_rejected() {
        let mut c = base();
        c.provider = Provider::Okta;
        c.issuer = "https://t/".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn mode_inferred_proxy_when_client_id_set() {
        let mut c = base();
        c.client_id = Some("abc".into());
        assert_eq!(c.resolved_mode(), Mode::Proxy);
    }

    #[test]
    fn proxy_without_server_url_rejected() {
        let mut c = base();
        c.client_id = Some("abc".into());
        c.redirect_uris = "https://s/cb".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn proxy_fully_configured_is_valid() {
        let mut c = base();
        c.client_id = Some("abc".into());
        c.server_url = Some("https://s".into());
        c.redirect_uris = "https://s/cb".into();
        assert!(c.validate().is_ok());
    }
}
