//! HMAC/JWT validator: shared-secret HS256 verification (C1).

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{AuthError, AuthResult};
use crate::principal::{Principal, StandardClaims, ValidatedToken};
use crate::timeouts::CLOCK_SKEW_LEEWAY;

use super::Validator;

/// Verifies JWTs signed with a single shared HS256 secret.
pub struct HmacValidator {
    issuer: String,
    audience: String,
    secret: SecretString,
}

impl HmacValidator {
    pub fn new(issuer: String, audience: String, secret: SecretString) -> Self {
        Self {
            issuer,
            audience,
            secret,
        }
    }
}

#[async_trait]
impl Validator for HmacValidator {
    async fn validate(&self, credential: &str) -> AuthResult<ValidatedToken> {
        let header = decode_header(credential)
            .map_err(|_| AuthError::validation("invalid token"))?;

        if header.alg != Algorithm::HS256 {
            return Err(AuthError::validation("invalid token"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        // An empty configured issuer means skip the issuer check entirely,
        // rather than treat "" as a literal required claim value.
        if !self.issuer.trim().is_empty() {
            validation.set_issuer(&[&self.issuer]);
        }
        validation.leeway = CLOCK_SKEW_LEEWAY.as_secs();
        validation.validate_exp = true;

        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());

        let data = decode::<StandardClaims>(credential, &key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::validation("expired"),
                ErrorKind::InvalidAudience => AuthError::validation("audience mismatch"),
                _ => AuthError::validation("invalid token"),
            }
        })?;

        if data.claims.iat.is_none() {
            return Err(AuthError::validation("invalid token"));
        }

        Ok(ValidatedToken {
            principal: Principal::from_claims(&data.claims),
            expires_at: data.claims.exp,
        })
    }
}
