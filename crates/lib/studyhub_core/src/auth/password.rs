//! Password hashing via bcrypt, used by the in-process backend.

use super::identity::IdentityError;

/// Hash a password with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, IdentityError> {
    bcrypt::hash(password, cost).map_err(|e| IdentityError::Provider(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, IdentityError> {
    bcrypt::verify(password, hash)
        .map_err(|e| IdentityError::Provider(format!("bcrypt verify: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_matching_password() {
        let hash = hash_password("Sup3rSecret!", 4).unwrap();
        assert!(verify_password("Sup3rSecret!", &hash).unwrap());
        assert!(!verify_password("sup3rsecret!", &hash).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("x", "not-a-bcrypt-hash").is_err());
    }
}
