//! Small helpers for sign-in: nonces, session tokens and email checks.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, Rng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::sync::LazyLock;

/// Length of the locally generated social id for local accounts.
const LOCAL_SOCIAL_ID_DIGITS: usize = 20;

/// Minimum length for local account passwords.
const MIN_PASSWORD_LENGTH: usize = 8;

static EMAIL_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    EMAIL_REGEX
        .as_ref()
        .is_some_and(|regex| regex.is_match(email_normalized))
}

/// Password policy for local registration.
pub(crate) fn valid_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LENGTH
}

/// Anti-forgery `state` nonce for one authorization attempt, hex-encoded.
pub(crate) fn generate_state_nonce() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate state nonce")?;
    let mut nonce = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // Writing to a String cannot fail.
        let _ = write!(nonce, "{byte:02x}");
    }
    Ok(nonce)
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the database stores a hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token so raw values never touch the database.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Social id for local accounts: 20 random digits, large enough to not
/// collide with anything a provider hands out.
pub(crate) fn generate_local_social_id() -> String {
    let mut rng = OsRng;
    (0..LOCAL_SOCIAL_ID_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Keep `next` redirect targets inside the application.
pub(crate) fn sanitize_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    if next.starts_with('/') && !next.starts_with("//") {
        Some(next.to_string())
    } else {
        None
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23505")
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23503")
}

fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|c| c.as_ref() == code),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn valid_password_enforces_minimum_length() {
        assert!(valid_password("longenough"));
        assert!(valid_password("12345678"));
        assert!(!valid_password("short"));
        assert!(!valid_password(""));
    }

    #[test]
    fn state_nonce_is_hex_and_unique() {
        let first = generate_state_nonce().expect("nonce");
        let second = generate_state_nonce().expect("nonce");
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn session_token_round_trip() {
        let decoded_len = generate_session_token()
            .ok()
            .and_then(|token| Base64UrlUnpadded::decode_vec(&token).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn hash_session_token_stable() {
        let first = hash_session_token("token");
        let second = hash_session_token("token");
        let different = hash_session_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }

    #[test]
    fn local_social_id_is_twenty_digits() {
        let social_id = generate_local_social_id();
        assert_eq!(social_id.len(), 20);
        assert!(social_id.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(social_id, generate_local_social_id());
    }

    #[test]
    fn sanitize_next_keeps_local_paths() {
        assert_eq!(
            sanitize_next(Some("/stores/be/42")),
            Some("/stores/be/42".to_string())
        );
        assert_eq!(sanitize_next(Some("//evil.example.com")), None);
        assert_eq!(sanitize_next(Some("https://evil.example.com")), None);
        assert_eq!(sanitize_next(None), None);
    }
}
