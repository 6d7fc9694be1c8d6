//! Local account password hashing.
//!
//! Argon2id, memory-hard, salted per call. The time cost ("rounds") is
//! configurable through the CLI; memory and parallelism stay at the
//! crate defaults.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};

/// Default time cost, matching the CLI default.
pub(crate) const DEFAULT_TIME_COST: u32 = 4;

fn argon2_with_time_cost(time_cost: u32) -> Result<Argon2<'static>> {
    let params = Params::new(
        Params::DEFAULT_M_COST,
        time_cost,
        Params::DEFAULT_P_COST,
        None,
    )
    .map_err(|err| anyhow!("invalid argon2 params: {err}"))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hash a password with a freshly generated random salt.
///
/// Two calls on the same input yield different strings, both of which
/// verify against the original password.
pub(crate) fn hash_password(password: &str, time_cost: u32) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2_with_time_cost(time_cost)?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Verify a password against a stored hash.
///
/// Parameters (including the salt) come from the stored hash itself, so
/// hashes produced with a different time cost keep verifying. A
/// malformed hash verifies as `false`, it never turns into an error.
pub(crate) fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("hunter2", DEFAULT_TIME_COST).expect("hash");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let first = hash_password("hunter2", DEFAULT_TIME_COST).expect("hash");
        let second = hash_password("hunter2", DEFAULT_TIME_COST).expect("hash");
        assert_ne!(first, second);
        assert!(verify_password("hunter2", &first));
        assert!(verify_password("hunter2", &second));
    }

    #[test]
    fn verify_honors_embedded_time_cost() {
        let hash = hash_password("hunter2", 2).expect("hash");
        assert!(hash.contains("t=2"));
        assert!(verify_password("hunter2", &hash));
    }

    #[test]
    fn malformed_hash_verifies_false() {
        assert!(!verify_password("hunter2", "not-an-argon2-hash"));
        assert!(!verify_password("hunter2", ""));
    }

    #[test]
    fn zero_time_cost_rejected() {
        assert!(hash_password("hunter2", 0).is_err());
    }
}
