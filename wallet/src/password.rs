//! Salted password hashing.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Salt length in bytes before hex encoding.
pub const SALT_BYTES: usize = 16;

/// Minimum accepted password length in characters.
pub const MIN_PASSWORD_LEN: usize = 4;

/// Generate a random hex-encoded salt.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

/// `hex(sha256(password + salt))`.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    to_hex(&digest)
}

/// Check `password` against a stored hash and salt.
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    !password.is_empty() && hash_password(password, salt) == expected_hash
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_matches_concatenation() {
        // sha256("hello") with an empty salt
        assert_eq!(
            hash_password("hello", ""),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(hash_password("hel", "lo"), hash_password("hello", ""));
    }

    #[test]
    fn test_salt_shape() {
        let a = generate_salt();
        let b = generate_salt();

        assert_eq!(a.len(), SALT_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify() {
        let salt = generate_salt();
        let hash = hash_password("secret", &salt);

        assert!(verify_password("secret", &salt, &hash));
        assert!(!verify_password("Secret", &salt, &hash));
        assert!(!verify_password("", &salt, &hash));
    }
}
