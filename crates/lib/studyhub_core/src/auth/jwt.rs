//! Access token signing and verification for the in-process backend.
//!
//! Tokens are HS256 JWTs carrying the subject, email and a session id. The
//! session id lets the issuer revoke a token before it expires.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};

use super::identity::IdentityError;

/// Default access token lifetime: 1 hour.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 60 * 60;

/// Claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: identity id.
    pub sub: String,
    pub email: String,
    /// Session id.
    pub sid: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

impl AccessClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// Sign an access token for `(user_id, email, session_id)`.
pub fn generate_access_token(
    user_id: &str,
    email: &str,
    session_id: &str,
    lifetime: Duration,
    secret: &[u8],
) -> Result<(String, AccessClaims), IdentityError> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        sid: session_id.to_string(),
        exp: (now + lifetime).timestamp(),
        iat: now.timestamp(),
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| IdentityError::Provider(format!("jwt encode: {e}")))?;
    Ok((token, claims))
}

/// Verify an access token, returning the claims on success.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Option<AccessClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;
    decode::<AccessClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Generate a random 64-character signing secret.
pub fn generate_secret() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}
