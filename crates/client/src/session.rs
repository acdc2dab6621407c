//! Session credential held by a signed-in user.
use crate::error::ClientError;

/// A bearer token for the tracking endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    /// Require a credential. `login_message` is reported when there is none.
    pub fn require(token: Option<String>, login_message: &'static str) -> Result<Self, ClientError> {
        match token.map(|t| t.trim().to_string()) {
            Some(token) if !token.is_empty() => Ok(Self { token }),
            _ => Err(ClientError::LoginRequired(login_message)),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Value for an `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}
