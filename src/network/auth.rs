//! JWT Authentication
//!
//! Binds a connection to an [`AccountId`] by validating a JWT issued by an
//! external identity provider. The node never issues tokens.

use std::collections::HashSet;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::identity::AccountId;
use crate::core::time::Timestamp;

/// Authentication configuration.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// Expected issuer claim ("iss"). If None, any issuer accepted.
    pub issuer: Option<String>,
    /// Expected audience claim ("aud"). If None, any audience accepted.
    pub audience: Option<String>,
    /// RS256 public key in PEM format.
    pub public_key_pem: Option<String>,
    /// HS256 shared secret.
    pub secret: Option<String>,
    /// Skip expiry checks (local testing only).
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            issuer: std::env::var("AUTH_ISSUER").ok(),
            audience: std::env::var("AUTH_AUDIENCE").ok(),
            public_key_pem: std::env::var("AUTH_PUBLIC_KEY_PEM").ok(),
            secret: std::env::var("AUTH_SECRET").ok(),
            skip_expiry: std::env::var("AUTH_SKIP_EXPIRY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Whether any verification key is configured.
    pub fn is_configured(&self) -> bool {
        self.public_key_pem.is_some() || self.secret.is_some()
    }

    fn algorithm(&self) -> Algorithm {
        if self.public_key_pem.is_some() {
            Algorithm::RS256
        } else {
            Algorithm::HS256
        }
    }

    fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match (&self.public_key_pem, &self.secret) {
            (Some(pem), _) => DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| AuthError::DecodeError(format!("invalid public key: {}", e))),
            (None, Some(secret)) => Ok(DecodingKey::from_secret(secret.as_bytes())),
            (None, None) => Err(AuthError::NotConfigured),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm());
        validation.required_spec_claims = HashSet::new();
        // Expiry is checked against the caller's clock in `validate_token_at`.
        validation.validate_exp = false;

        if let Some(ref issuer) = self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match self.audience {
            Some(ref audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

/// Claims read from a provider token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject, the provider's user id.
    pub sub: String,
    /// Expiry (Unix seconds), zero if absent.
    #[serde(default)]
    pub exp: u64,
    /// Issued at (Unix seconds).
    #[serde(default)]
    pub iat: u64,
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// Audience.
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
}

impl TokenClaims {
    /// Account bound to this subject. Stable across sessions.
    pub fn account_id(&self) -> AccountId {
        AccountId::derive(&self.sub)
    }
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No verification key configured on the node.
    #[error("authentication not configured")]
    NotConfigured,
    /// Token is malformed.
    #[error("invalid token format")]
    InvalidFormat,
    /// Signature verification failed.
    #[error("invalid signature")]
    InvalidSignature,
    /// Token has expired.
    #[error("token expired")]
    Expired,
    /// Issuer claim does not match.
    #[error("invalid issuer")]
    InvalidIssuer,
    /// Audience claim does not match.
    #[error("invalid audience")]
    InvalidAudience,
    /// Required claim is missing.
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    /// Any other decoding failure.
    #[error("decode error: {0}")]
    DecodeError(String),
}

/// Validate a token against the current wall clock.
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<TokenClaims, AuthError> {
    let now = chrono::Utc::now().timestamp().max(0) as Timestamp;
    validate_token_at(token, config, now)
}

/// Validate a token, checking expiry against `now`.
pub fn validate_token_at(
    token: &str,
    config: &AuthConfig,
    now: Timestamp,
) -> Result<TokenClaims, AuthError> {
    if !config.is_configured() {
        return Err(AuthError::NotConfigured);
    }

    let key = config.decoding_key()?;
    let claims = decode::<TokenClaims>(token, &key, &config.validation())
        .map_err(map_jwt_error)?
        .claims;

    if claims.sub.is_empty() {
        return Err(AuthError::MissingClaim("sub".into()));
    }
    if !config.skip_expiry && claims.exp > 0 && now > claims.exp {
        return Err(AuthError::Expired);
    }

    Ok(claims)
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) => AuthError::InvalidFormat,
        _ => AuthError::DecodeError(err.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "habit-node-test-secret-0123456789";
    const NOW: Timestamp = 1_700_000_000;

    fn sign(claims: &TokenClaims, secret: &str) -> String {
        let key = EncodingKey::from_secret(secret.as_bytes());
        encode(&Header::new(Algorithm::HS256), claims, &key).unwrap()
    }

    fn claims(sub: &str) -> TokenClaims {
        TokenClaims {
            sub: sub.into(),
            exp: NOW + 3600,
            iat: NOW,
            iss: Some("habit-idp".into()),
            aud: Some(serde_json::json!("habit-node")),
        }
    }

    fn config() -> AuthConfig {
        AuthConfig {
            secret: Some(SECRET.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_token_binds_account() {
        let token = sign(&claims("alice"), SECRET);
        let validated = validate_token_at(&token, &config(), NOW).unwrap();
        assert_eq!(validated.account_id(), AccountId::derive("alice"));
    }

    #[test]
    fn test_expiry_checked_against_now() {
        let token = sign(&claims("alice"), SECRET);
        assert_eq!(
            validate_token_at(&token, &config(), NOW + 3601).unwrap_err(),
            AuthError::Expired
        );

        let lenient = AuthConfig { skip_expiry: true, ..config() };
        assert!(validate_token_at(&token, &lenient, NOW + 3601).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = sign(&claims("alice"), "some-other-secret-0123456789");
        assert_eq!(
            validate_token_at(&token, &config(), NOW).unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[test]
    fn test_issuer_and_audience() {
        let token = sign(&claims("alice"), SECRET);

        let strict = AuthConfig {
            issuer: Some("habit-idp".into()),
            audience: Some("habit-node".into()),
            ..config()
        };
        assert!(validate_token_at(&token, &strict, NOW).is_ok());

        let wrong_iss = AuthConfig { issuer: Some("elsewhere".into()), ..config() };
        assert_eq!(
            validate_token_at(&token, &wrong_iss, NOW).unwrap_err(),
            AuthError::InvalidIssuer
        );
    }

    #[test]
    fn test_empty_subject_rejected() {
        let token = sign(&claims(""), SECRET);
        assert!(matches!(
            validate_token_at(&token, &config(), NOW),
            Err(AuthError::MissingClaim(_))
        ));
    }

    #[test]
    fn test_unconfigured_node() {
        assert_eq!(
            validate_token_at("a.b.c", &AuthConfig::default(), NOW).unwrap_err(),
            AuthError::NotConfigured
        );
    }

    #[test]
    fn test_subjects_map_to_distinct_accounts() {
        assert_eq!(claims("alice").account_id(), claims("alice").account_id());
        assert_ne!(claims("alice").account_id(), claims("bob").account_id());
    }
}
