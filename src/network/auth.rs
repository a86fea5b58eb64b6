//! JWT Authentication
//!
//! Tokens are minted by the bot backend; this server only verifies them.
//! The `sub` claim carries the player's numeric id and an optional
//! `role` claim of `"admin"` unlocks operator messages.

use std::collections::HashSet;

use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::player::PlayerId;

/// Role claim value that grants operator access.
pub const ADMIN_ROLE: &str = "admin";

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
    /// Skip expiry validation (tests only).
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Read `KEZE_AUTH_*` variables.
    pub fn from_env() -> Self {
        Self {
            issuer: std::env::var("KEZE_AUTH_ISSUER").ok(),
            audience: std::env::var("KEZE_AUTH_AUDIENCE").ok(),
            public_key_pem: std::env::var("KEZE_AUTH_PUBLIC_KEY_PEM").ok(),
            secret: std::env::var("KEZE_AUTH_SECRET").ok(),
            skip_expiry: std::env::var("KEZE_AUTH_SKIP_EXPIRY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Whether any verification key is present.
    ///
    /// Without one, clients identify themselves by id (development only).
    pub fn is_configured(&self) -> bool {
        self.public_key_pem.is_some() || self.secret.is_some()
    }
}

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Player id in decimal.
    pub sub: String,
    /// Expiry (Unix seconds).
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
    /// Optional role, `"admin"` for operators.
    #[serde(default)]
    pub role: Option<String>,
}

impl TokenClaims {
    /// Player identity named by the subject.
    pub fn player_id(&self) -> Result<PlayerId, AuthError> {
        self.sub
            .parse()
            .map_err(|_| AuthError::MissingClaim("numeric sub".into()))
    }

    /// Whether the token grants operator access.
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// Who a connection acts as after authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Player the connection acts for
    pub player_id: PlayerId,
    /// Operator privileges
    pub admin: bool,
}

impl Identity {
    /// Identity from verified claims.
    pub fn from_claims(claims: &TokenClaims) -> Result<Self, AuthError> {
        Ok(Self {
            player_id: claims.player_id()?,
            admin: claims.is_admin(),
        })
    }
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No verification key configured.
    #[error("authentication not configured")]
    NotConfigured,
    /// Token is not a JWT.
    #[error("invalid token format")]
    InvalidFormat,
    /// Signature verification failed.
    #[error("invalid signature")]
    InvalidSignature,
    /// Token has expired.
    #[error("token expired")]
    Expired,
    /// Issuer mismatch.
    #[error("invalid issuer")]
    InvalidIssuer,
    /// Audience mismatch.
    #[error("invalid audience")]
    InvalidAudience,
    /// Required claim missing or malformed.
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    /// Any other decoding failure.
    #[error("decode error: {0}")]
    DecodeError(String),
}

/// Verify a token and return its claims.
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<TokenClaims, AuthError> {
    let (algorithm, key) = if let Some(ref pem) = config.public_key_pem {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::DecodeError(format!("invalid public key: {}", e)))?;
        (Algorithm::RS256, key)
    } else if let Some(ref secret) = config.secret {
        (Algorithm::HS256, DecodingKey::from_secret(secret.as_bytes()))
    } else {
        return Err(AuthError::NotConfigured);
    };

    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims = HashSet::new();
    if let Some(ref issuer) = config.issuer {
        validation.set_issuer(&[issuer]);
    }
    match config.audience {
        Some(ref audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }
    if config.skip_expiry {
        validation.validate_exp = false;
    }

    let token_data: TokenData<TokenClaims> = decode(token, &key, &validation).map_err(map_jwt_error)?;
    let claims = token_data.claims;

    if claims.sub.is_empty() {
        return Err(AuthError::MissingClaim("sub".into()));
    }

    // Zero-leeway check on top of the library's default leeway
    if !config.skip_expiry && claims.exp > 0 && Utc::now().timestamp() as u64 > claims.exp {
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

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "keze-test-secret-at-least-32-bytes";

    fn token(claims: &TokenClaims, secret: &str) -> String {
        let key = EncodingKey::from_secret(secret.as_bytes());
        encode(&Header::new(Algorithm::HS256), claims, &key).unwrap()
    }

    fn claims(sub: &str, role: Option<&str>) -> TokenClaims {
        let now = Utc::now().timestamp() as u64;
        TokenClaims {
            sub: sub.into(),
            exp: now + 3600,
            iat: now,
            iss: Some("keze-bot".into()),
            aud: None,
            role: role.map(String::from),
        }
    }

    fn config() -> AuthConfig {
        AuthConfig { secret: Some(SECRET.into()), ..Default::default() }
    }

    #[test]
    fn test_player_token() {
        let verified = validate_token(&token(&claims("123456789", None), SECRET), &config()).unwrap();
        let identity = Identity::from_claims(&verified).unwrap();
        assert_eq!(identity.player_id, PlayerId(123_456_789));
        assert!(!identity.admin);
    }

    #[test]
    fn test_admin_role() {
        let verified = validate_token(&token(&claims("1", Some("admin")), SECRET), &config()).unwrap();
        assert!(Identity::from_claims(&verified).unwrap().admin);

        let verified = validate_token(&token(&claims("1", Some("moderator")), SECRET), &config()).unwrap();
        assert!(!verified.is_admin());
    }

    #[test]
    fn test_non_numeric_subject() {
        let verified = validate_token(&token(&claims("auth0|abc", None), SECRET), &config()).unwrap();
        assert!(matches!(Identity::from_claims(&verified), Err(AuthError::MissingClaim(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut expired = claims("5", None);
        expired.exp = 1;
        let result = validate_token(&token(&expired, SECRET), &config());
        assert!(matches!(result, Err(AuthError::Expired)));

        let lenient = AuthConfig { skip_expiry: true, ..config() };
        assert!(validate_token(&token(&expired, SECRET), &lenient).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let result = validate_token(&token(&claims("5", None), "some-other-secret-32-bytes-long!"), &config());
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_issuer_mismatch() {
        let strict = AuthConfig { issuer: Some("someone-else".into()), ..config() };
        let result = validate_token(&token(&claims("5", None), SECRET), &strict);
        assert!(matches!(result, Err(AuthError::InvalidIssuer)));
    }

    #[test]
    fn test_not_configured() {
        assert!(!AuthConfig::default().is_configured());
        let result = validate_token("a.b.c", &AuthConfig::default());
        assert!(matches!(result, Err(AuthError::NotConfigured)));
    }
}
