//! bcrypt password hashing.

use crate::error::Result;

pub fn hash_password(plain: &str) -> Result<String> {
    Ok(bcrypt::hash(plain, bcrypt::DEFAULT_COST)?)
}

/// Check a plaintext password against a stored hash. An unparseable hash
/// counts as a mismatch.
pub fn verify_password(hash: &str, plain: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_the_original_password() {
        let hash = hash_password("testpass123").unwrap();
        assert_ne!(hash, "testpass123");
        assert!(verify_password(&hash, "testpass123"));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let hash = hash_password("testpass123").unwrap();
        assert!(!verify_password(&hash, "testpass124"));
        assert!(!verify_password(&hash, ""));
    }

    #[test]
    fn garbage_hash_is_a_mismatch() {
        assert!(!verify_password("not-a-bcrypt-hash", "testpass123"));
    }
}
