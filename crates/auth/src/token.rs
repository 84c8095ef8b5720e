//! HS256 bearer tokens carrying a username claim.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Claim set carried by login tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Symmetric signing and verification keys derived from the shared secret.
/// The gateway only ever calls [`verify`](TokenKeys::verify); minting stays
/// in the credential service.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mint a token for `username` expiring after `ttl`.
    pub fn mint(&self, username: &str, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new("test-secret-key")
    }

    #[test]
    fn mint_verify_round_trip() {
        let keys = keys();
        let token = keys.mint("testuser", Duration::hours(1)).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.username, "testuser");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = keys();
        let token = keys.mint("testuser", Duration::hours(-1)).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = TokenKeys::new("secret1")
            .mint("testuser", Duration::hours(1))
            .unwrap();
        assert!(TokenKeys::new("secret2").verify(&token).is_err());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let keys = keys();
        assert!(keys.verify("").is_err());
        assert!(keys.verify("not.a.jwt").is_err());
        assert!(keys.verify("invalid.token.format").is_err());
    }
}
