//! Password hashing and verification (argon2id, PHC string format).
//!
//! Both operations run on the tokio blocking pool.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::task;

use crate::error::ApiError;

fn hash_blocking(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))
}

fn verify_blocking(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("stored password hash is malformed: {}", e);
            false
        }
    }
}

fn join_error(e: task::JoinError) -> ApiError {
    ApiError::Internal(format!("password task failed: {e}"))
}

/// Hashes a password with a fresh random salt.
pub async fn hash_password(password: &str) -> Result<String, ApiError> {
    let password = password.to_owned();
    task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(join_error)?
}

/// Checks a password against a stored hash. A malformed stored hash never verifies.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    task::spawn_blocking(move || verify_blocking(&password, &hash))
        .await
        .map_err(join_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hash = hash_password("correct horse").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("battery staple", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        assert_ne!(
            hash_password("same").await.unwrap(),
            hash_password("same").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_malformed_hash_rejects() {
        assert!(!verify_password("anything", "not-a-phc-string").await.unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_hashing_yields_to_other_tasks() {
        use std::sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        };

        // Single-threaded runtime: the flag can only be set if hashing yields.
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });

        hash_password("correct horse").await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
