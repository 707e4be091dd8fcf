use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::errors::AppError;

/// Hash a password with Argon2id and a random salt (PHC string format)
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(format!("Failed to hash password: {}", e)))
}

/// Returns false on mismatch; a malformed stored hash is an internal error
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::InternalError(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("SenhaForte123!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("SenhaForte123!", &hash).unwrap());
        assert!(!verify_password("senhaerrada", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        assert_ne!(hash_password("abc12345").unwrap(), hash_password("abc12345").unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("x", "not-a-phc-string"),
            Err(AppError::InternalError(_))
        ));
    }
}
