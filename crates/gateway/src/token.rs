//! Token verification port.
//!
//! The gateway never mints tokens; it only checks them at upgrade time. The
//! port keeps the signing scheme swappable without touching the socket code.

use auth::token::TokenKeys;

use crate::error::{GatewayError, Result};

/// Identity extracted from a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
    /// Expiry as a unix timestamp.
    pub expires_at: i64,
}

pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser>;
}

/// HS256 verifier over the shared `JWT_SECRET`.
pub struct JwtVerifier {
    keys: TokenKeys,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            keys: TokenKeys::new(secret),
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser> {
        let claims = self
            .keys
            .verify(token)
            .map_err(|e| GatewayError::Unauthorized(e.to_string()))?;
        Ok(AuthenticatedUser {
            username: claims.username,
            expires_at: claims.exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn accepts_tokens_signed_with_the_shared_secret() {
        let token = TokenKeys::new("shared")
            .mint("alice", Duration::minutes(15))
            .unwrap();
        let user = JwtVerifier::new("shared").verify(&token).unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.expires_at > chrono::Utc::now().timestamp());
    }

    #[test]
    fn rejects_foreign_and_garbage_tokens() {
        let verifier = JwtVerifier::new("shared");
        let foreign = TokenKeys::new("other")
            .mint("alice", Duration::minutes(15))
            .unwrap();
        assert!(verifier.verify(&foreign).is_err());
        assert!(verifier.verify("").is_err());
        assert!(verifier.verify("not-a-token").is_err());
    }
}
