use std::sync::LazyLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::error::AppError;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    let argon2 = argon2::Argon2::default();
    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Returns false for a wrong password and for anything that is not a parseable PHC
/// string. The comparison itself happens inside `argon2`, which is constant time.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    argon2::Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Same parameters as real account hashes, so checking it costs as much as a real
/// verify. Nothing can match it: the input is random and never stored.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    hash_password(salt.as_str()).unwrap_or_default()
});

/// Burns one Argon2 verify for a login whose email matched no account.
pub async fn verify_against_dummy(password: String) -> Result<(), AppError> {
    verify_password_blocking(password, DUMMY_HASH.clone()).await?;
    Ok(())
}

/// Hashes on the blocking pool; Argon2 is deliberately expensive.
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("hash task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("hash error: {e}")))
}

pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verify task failed: {e}")))
}
