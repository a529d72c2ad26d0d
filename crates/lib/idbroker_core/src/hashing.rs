//! Password and reset-token hashing.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};

use crate::error::{IdentityError, Result};

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Length of a password reset token.
const RESET_TOKEN_LEN: usize = 32;

/// Hash a password with bcrypt (cost 10).
pub fn hash_password(password: &str) -> Result<String> {
    hash_with_cost(password, BCRYPT_COST)
}

fn hash_with_cost(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).map_err(|e| IdentityError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash. A malformed stored hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Generate a random alphanumeric reset token.
pub fn generate_reset_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a reset token for storage.
pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("test123").unwrap();
        assert!(verify_password("test123", &hash));
        assert!(!verify_password("test123x", &hash));
    }

    #[test]
    fn hashing_failure_is_internal() {
        let err = hash_with_cost("test123", 3).unwrap_err();
        assert!(matches!(err, IdentityError::Internal(_)));
        assert_eq!(err.status().as_u16(), 500);
    }

    #[test]
    fn garbage_hash_does_not_verify() {
        assert!(!verify_password("test123", "not-a-bcrypt-hash"));
    }

    #[test]
    fn reset_tokens_are_alphanumeric_and_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), RESET_TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn reset_hash_is_hex_sha256() {
        assert_eq!(
            hash_reset_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
