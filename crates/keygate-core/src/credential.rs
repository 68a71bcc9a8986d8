use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::Rng;

use crate::error::{KeygateError, KeygateResult};

/// Length of a generated access secret.
pub const SECRET_LEN: usize = 15;

const SECRET_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Hash a password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> KeygateResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default(); // Argon2id by default
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| KeygateError::Credential(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a password against an Argon2id hash string.
///
/// Returns `Ok(true)` if the password matches, `Ok(false)` otherwise.
pub fn verify_password(password: &str, hash: &str) -> KeygateResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| KeygateError::Credential(format!("invalid password hash: {e}")))?;
    let argon2 = Argon2::default();
    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(KeygateError::Credential(format!(
            "password verification failed: {e}"
        ))),
    }
}

/// Generate a 15-character alphanumeric access secret.
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    (0..SECRET_LEN)
        .map(|_| SECRET_CHARSET[rng.gen_range(0..SECRET_CHARSET.len())] as char)
        .collect()
}

/// Generate the random part of a key token: 16 uppercase alphanumerics in
/// groups of four, e.g. `A1B2-C3D4-E5F6-G7H8`.
pub fn generate_key_token() -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(19);
    for i in 0..16 {
        if i > 0 && i % 4 == 0 {
            out.push('-');
        }
        out.push(TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char);
    }
    out
}
