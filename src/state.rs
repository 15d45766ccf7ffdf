//! Signed-state channel (C5), used only in fixed-redirect mode to carry a
//! client CSRF nonce and the client's loopback redirect URI through the
//! upstream provider's `state` round-trip, tamper-evident under an HMAC.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SignedStateWire {
    csrf: String,
    redirect: String,
    sig: String,
}

/// Decoded, signature-verified state payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedState {
    pub csrf_nonce: String,
    pub client_redirect_uri: String,
}

fn canonical(csrf: &str, redirect: &str) -> Vec<u8> {
    format!("state={csrf}&redirect={redirect}").into_bytes()
}

fn sign(key: &SecretString, csrf: &str, redirect: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.expose_secret().as_bytes()).expect("HMAC accepts any key length");
    mac.update(&canonical(csrf, redirect));
    hex_encode(&mac.finalize().into_bytes())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

impl SignedState {
    /// Encodes `{csrf_nonce, client_redirect_uri}` into an HMAC-SHA256
    /// authenticated, base64url-no-pad opaque string suitable for use as
    /// the upstream `state` parameter.
    pub fn encode(csrf_nonce: &str, client_redirect_uri: &str, key: &SecretString) -> String {
        let sig = sign(key, csrf_nonce, client_redirect_uri);
        let wire = SignedStateWire {
            csrf: csrf_nonce.to_string(),
            redirect: client_redirect_uri.to_string(),
            sig,
        };
        let json = serde_json::to_vec(&wire).expect("SignedStateWire always serializes");
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes and verifies `encoded`. Any decode, format, or signature
    /// failure is reported as [`AuthError::StateIntegrity`] carrying only a
    /// correlator, never the raw state or key.
    pub fn decode(encoded: &str, key: &SecretString) -> AuthResult<Self> {
        let correlator = crate::cache::correlator(encoded);
        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| AuthError::state_integrity(correlator.clone()))?;
        let wire: SignedStateWire =
            serde_json::from_slice(&json).map_err(|_| AuthError::state_integrity(correlator.clone()))?;

        let expected = sign(key, &wire.csrf, &wire.redirect);
        let actual_bytes = wire.sig.as_bytes();
        let expected_bytes = expected.as_bytes();

        let equal = actual_bytes.len() == expected_bytes.len()
            && bool::from(actual_bytes.ct_eq(expected_bytes));

        if !equal {
            return Err(AuthError::state_integrity(correlator));
        }

        Ok(Self {
            csrf_nonce: wire.csrf,
            client_redirect_uri: wire.redirect,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretString {
        SecretString::from("0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn round_trip_is_identity_on_payload() {
        let encoded = SignedState::encode("nonce1", "http://localhost:6274/cb", &key());
        let decoded = SignedState::decode(&encoded, &key()).unwrap();
        assert_eq!(decoded.csrf_nonce, "nonce1");
        assert_eq!(decoded.client_redirect_uri, "http://localhost:6274/cb");
    }

    #[test]
    fn flipping_any_byte_fails_verification() {
        let encoded = SignedState::encode("nonce1", "http://localhost:6274/cb", &key());
        let mut bytes = encoded.into_bytes();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(SignedState::decode(&tampered, &key()).is_err());
    }

    #[test]
    fn tampering_the_redirect_specifically_fails() {
        // Build a state the way an attacker swapping the redirect would: a
        // well-formed wire struct with a mutated redirect but the
        // original, now-invalid signature.
        let original = SignedState::encode("nonce1", "http://localhost:6274/cb", &key());
        let raw = URL_SAFE_NO_PAD.decode(&original).unwrap();
        let mut wire: SignedStateWire = serde_json::from_slice(&raw).unwrap();
        wire.redirect = "https://evil/cb".to_string();
        let tampered = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&wire).unwrap());
        assert!(SignedState::decode(&tampered, &key()).is_err());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let encoded = SignedState::encode("nonce1", "http://localhost:6274/cb", &key());
        let other_key = SecretString::from("ffffffffffffffffffffffffffffffff");
        assert!(SignedState::decode(&encoded, &other_key).is_err());
    }

    #[test]
    fn garbage_input_fails_cleanly() {
        assert!(SignedState::decode("not-base64-!!!", &key()).is_err());
    }
}
