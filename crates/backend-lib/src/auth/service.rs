use super::Principal;
use crate::error::AppError;
use async_trait::async_trait;

/// Turns a bearer credential into the identity it was issued to
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Verify a raw token (without the `Bearer ` prefix)
    async fn verify(&self, token: &str) -> Result<Principal, AppError>;
}
