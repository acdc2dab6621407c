// ============================
// crates/backend-lib/src/auth/token.rs
// ============================
//! HS256 bearer tokens.
use super::AuthService;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// The authenticated user behind a request or connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    pub user_id: String,
}

impl Principal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_id)
    }
}

/// Issues and verifies HS256 tokens with a shared secret
pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtAuth {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl,
        }
    }

    /// Mint a token for `user_id`, valid for the configured TTL
    pub fn issue(&self, user_id: &str) -> Result<String, AppError> {
        let iat = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let claims = Claims {
            sub: user_id.to_string(),
            iat,
            exp: iat + self.ttl.as_secs(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Decode and check signature and expiry
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

#[async_trait]
impl AuthService for JwtAuth {
    async fn verify(&self, token: &str) -> Result<Principal, AppError> {
        let claims = self.decode(token)?;
        if claims.sub.is_empty() {
            return Err(AppError::Auth("token has no subject".to_string()));
        }
        Ok(Principal::new(claims.sub))
    }
}
