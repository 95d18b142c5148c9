//! HS256 access tokens.
//!
//! There are no refresh tokens: an access token lives for
//! `JWT_ACCESS_EXPIRY_MINS` (eight days by default) and the user logs in
//! again afterwards.

use jsonwebtoken::errors::Error as JwtError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use openpipes_core::types::DbId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::env_parse;

/// Default access token lifetime: eight days.
pub const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 60 * 24 * 8;

/// Payload of every access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// The user's database id.
    pub sub: DbId,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    /// Random per-token id (UUID v4).
    pub jti: String,
}

impl Claims {
    /// Claims issued now for `user_id`, valid for `lifetime_secs`.
    pub fn issue(user_id: DbId, email: &str, lifetime_secs: i64) -> Self {
        let iat = chrono::Utc::now().timestamp();
        Self {
            sub: user_id,
            email: email.to_owned(),
            exp: iat + lifetime_secs,
            iat,
            jti: Uuid::new_v4().to_string(),
        }
    }
}

/// Signing secret and token lifetime.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_mins: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_token_expiry_mins", &self.access_token_expiry_mins)
            .finish()
    }
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                  | Required | Default |
    /// |--------------------------|----------|---------|
    /// | `JWT_SECRET`             | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS` | no       | `11520` |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is missing or blank, or the expiry is not an
    /// integer.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| panic!("JWT_SECRET must be set to a non-empty value"));

        Self {
            secret,
            access_token_expiry_mins: env_parse(
                "JWT_ACCESS_EXPIRY_MINS",
                DEFAULT_ACCESS_EXPIRY_MINS,
            ),
        }
    }

    /// Access token lifetime in seconds, as reported to clients.
    pub fn expires_in_secs(&self) -> i64 {
        self.access_token_expiry_mins * 60
    }
}

/// Sign a fresh access token for `user_id`.
pub fn generate_access_token(
    user_id: DbId,
    email: &str,
    config: &JwtConfig,
) -> Result<String, JwtError> {
    let claims = Claims::issue(user_id, email, config.expires_in_secs());
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Check signature and expiry of `token` and return its claims.
pub fn validate_token(token: &str, config: &JwtConfig) -> Result<Claims, JwtError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        // Requires and checks `exp`.
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
}
