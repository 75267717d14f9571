//! Password hashing, opaque token generation and forgot-password expiry stamps.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE};
use chrono::Utc;
use std::sync::LazyLock;

use crate::error::{UserError, UserResult};

/// Random bytes behind every issued token.
pub const TOKEN_BYTES: usize = 42;

/// Forgot-password validity window in minutes.
pub const EXPIRY_WINDOW_MINUTES: i64 = 1440;

/// Expiry value of a consumed forgot-password token.
pub const EXPIRED: i64 = 0;

pub fn hash_password(password: &str) -> UserResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::Internal(format!("Failed to hash password: {}", e)))
}

/// A malformed stored hash verifies as false.
pub fn verify_password(hash: &str, candidate: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Hashed once on first use; stands in for accounts without a stored hash.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("dummy-password-for-timing").ok());

/// Like [`verify_password`], but pays the Argon2 cost even when there is no
/// stored hash, so a missing account takes as long as a wrong password.
pub fn verify_password_or_dummy(hash: Option<&str>, candidate: &str) -> bool {
    match hash {
        Some(hash) => verify_password(hash, candidate),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                verify_password(dummy, candidate);
            }
            false
        }
    }
}

/// Compares two secrets without short-circuiting on the first differing byte.
pub fn tokens_match(expected: &str, candidate: &str) -> bool {
    let (expected, candidate) = (expected.as_bytes(), candidate.as_bytes());
    expected.len() == candidate.len()
        && expected
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// `len` random bytes, URL-safe base64 encoded.
pub fn generate_token(len: usize) -> String {
    let bytes: Vec<u8> = (0..len).map(|_| rand::random::<u8>()).collect();
    URL_SAFE.encode(bytes)
}

fn now_minutes() -> i64 {
    Utc::now().timestamp() / 60
}

pub fn generate_expiry() -> i64 {
    now_minutes() + EXPIRY_WINDOW_MINUTES
}

pub fn is_expired(expiry: i64) -> bool {
    expiry <= now_minutes()
}
