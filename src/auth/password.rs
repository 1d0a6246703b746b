use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(password_hash::Error),

    #[error("stored password hash is unreadable: {0}")]
    CorruptHash(password_hash::Error),

    #[error("password worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        error!(error = %err, "password operation failed");
        AppError::Internal(err.to_string())
    }
}

/// Salted Argon2id hash in PHC string form.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}

/// `Ok(false)` on mismatch; an error only when `hash` cannot be parsed.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(PasswordError::CorruptHash)?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Runs [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(plain: String) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(PasswordError::from)??;
    Ok(hash)
}

pub async fn verify_password_blocking(plain: String, hash: String) -> Result<bool, AppError> {
    let matches = tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(PasswordError::from)??;
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("Budget!2024").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Budget!2024", &hash).unwrap());
        assert!(!verify_password("Budget!2025", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        let a = hash_password("Same!Pass1").unwrap();
        let b = hash_password("Same!Pass1").unwrap();
        assert_ne!(a, b);
        assert!(!a.contains("Same!Pass1"));
    }

    #[test]
    fn unreadable_hash_is_an_error() {
        assert!(matches!(
            verify_password("anything", "plaintext-in-the-column"),
            Err(PasswordError::CorruptHash(_))
        ));
    }

    #[tokio::test]
    async fn blocking_wrappers() {
        let hash = hash_password_blocking("Async!Pass1".into()).await.unwrap();
        assert!(verify_password_blocking("Async!Pass1".into(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_blocking("nope".into(), hash).await.unwrap());

        let err = verify_password_blocking("x".into(), "garbage".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
