//! Redirect-URI policy engine (C4): mode inference, loopback classification,
//! and per-mode acceptance rules.

use url::Url;

use crate::error::{AuthError, AuthResult};

const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// The policy a [`crate::config::Configuration`]'s `redirect_uris` resolves
/// to. Selection is purely structural: empty → reject-all, no comma →
/// fixed, one-or-more commas → allowlist.
#[derive(Debug, Clone)]
pub enum RedirectPolicy {
    /// Fail-closed default: no authorization request is ever accepted.
    RejectAll,
    /// Single configured URI. Client redirects are accepted only if they
    /// are loopback; the server's own upstream-facing redirect is this URI.
    Fixed(String),
    /// Multiple configured URIs. Client redirects must exactly match one.
    Allowlist(Vec<String>),
}

impl RedirectPolicy {
    pub fn from_config(redirect_uris: &str) -> Self {
        let trimmed = redirect_uris.trim();
        if trimmed.is_empty() {
            return Self::RejectAll;
        }
        if !trimmed.contains(',') {
            return Self::Fixed(trimmed.to_string());
        }
        Self::Allowlist(
            trimmed
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// The server's own redirect URI to advertise to the upstream provider
    /// when mediating the flow (fixed mode only).
    pub fn fixed_redirect(&self) -> Option<&str> {
        match self {
            Self::Fixed(uri) => Some(uri),
            _ => None,
        }
    }

    /// Validates a client-supplied `redirect_uri` per §4.3's mode-specific
    /// acceptance rules. Returns the (structurally validated) URI back to
    /// the caller on success.
    pub fn validate(&self, candidate: &str) -> AuthResult<String> {
        let trimmed = candidate.trim();
        match self {
            Self::RejectAll => Err(AuthError::redirect_policy(
                "no redirect_uris configured; all authorization requests are rejected",
            )),
            Self::Fixed(_) => {
                if is_loopback_redirect(trimmed)? {
                    Ok(trimmed.to_string())
                } else {
                    Err(AuthError::redirect_policy(
                        "fixed-redirect mode only accepts loopback redirect_uri",
                    ))
                }
            }
            Self::Allowlist(list) => {
                if list.iter().any(|entry| entry == trimmed) {
                    Ok(trimmed.to_string())
                } else {
                    Err(AuthError::redirect_policy(
                        "redirect_uri does not exactly match an allowlisted entry",
                    ))
                }
            }
        }
    }
}

/// True iff `candidate` parses as an absolute `http`/`https` URI with no
/// fragment whose parsed host is a loopback address. Classification
/// operates only on the parsed host component — never string
/// prefix/suffix/substring matching, so `localhost.evil.com`,
/// `evil-localhost`, and userinfo tricks like `http://localhost@evil.com`
/// never pass (the latter because `Url::host_str` resolves to `evil.com`,
/// discarding the userinfo).
fn is_loopback_redirect(candidate: &str) -> AuthResult<bool> {
    let url = Url::parse(candidate)
        .map_err(|e| AuthError::redirect_policy(format!("redirect_uri does not parse: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AuthError::redirect_policy(
            "redirect_uri scheme must be http or https",
        ));
    }
    if url.fragment().is_some() {
        return Err(AuthError::redirect_policy(
            "redirect_uri must not contain a fragment",
        ));
    }

    let host = url
        .host_str()
        .ok_or_else(|| AuthError::redirect_policy("redirect_uri must have a host"))?
        .to_lowercase();

    Ok(LOOPBACK_HOSTS.contains(&host.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_reject_all() {
        assert!(matches!(
            RedirectPolicy::from_config(""),
            RedirectPolicy::RejectAll
        ));
        assert!(RedirectPolicy::from_config("")
            .validate("http://localhost/cb")
            .is_err());
    }

    #[test]
    fn single_uri_is_fixed_mode() {
        let policy = RedirectPolicy::from_config("https://server/oauth/callback");
        assert!(matches!(policy, RedirectPolicy::Fixed(_)));
        assert_eq!(policy.fixed_redirect(), Some("https://server/oauth/callback"));
    }

    #[test]
    fn fixed_mode_accepts_only_loopback() {
        let policy = RedirectPolicy::from_config("https://server/oauth/callback");
        assert!(policy.validate("http://localhost:6274/cb").is_ok());
        assert!(policy.validate("http://127.0.0.1:6274/cb").is_ok());
        assert!(policy.validate("https://evil.example.com/cb").is_err());
    }

    #[test]
    fn fixed_mode_rejects_lookalike_hosts() {
        let policy = RedirectPolicy::from_config("https://server/oauth/callback");
        assert!(policy.validate("http://localhost.evil.com/cb").is_err());
        assert!(policy.validate("http://evil-localhost/cb").is_err());
        assert!(policy.validate("http://localhost@evil.com/cb").is_err());
    }

    #[test]
    fn fixed_mode_rejects_fragment() {
        let policy = RedirectPolicy::from_config("https://server/oauth/callback");
        assert!(policy.validate("http://localhost/cb#frag").is_err());
    }

    #[test]
    fn allowlist_mode_requires_exact_match() {
        let policy = RedirectPolicy::from_config("https://a/cb,https://b/cb");
        assert!(matches!(policy, RedirectPolicy::Allowlist(_)));
        assert!(policy.validate("https://a/cb").is_ok());
        assert!(policy.validate("https://a.evil/cb").is_err());
        assert!(policy.validate("https://a/cb/").is_err());
    }

    #[test]
    fn allowlist_mode_trims_whitespace_in_candidate() {
        let policy = RedirectPolicy::from_config("https://a/cb,https://b/cb");
        assert!(policy.validate("  https://a/cb  ").is_ok());
    }
}
