use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::{error, warn};

#[cfg(test)]
thread_local! {
    /// Argon2 verifications run on this thread.
    pub(crate) static VERIFICATIONS: std::cell::Cell<usize> = std::cell::Cell::new(0);
}

lazy_static! {
    // Same parameters as real hashes, so a miss costs as much as a hit.
    static ref DUMMY_HASH: String = hash_password("no-such-user").unwrap_or_default();
}

/// Hashes `plain` with Argon2id and a fresh random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Checks `plain` against a stored hash. A hash this module did not produce
/// verifies as `false`.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "stored password hash is not a valid PHC string");
            return false;
        }
    };
    #[cfg(test)]
    VERIFICATIONS.with(|n| n.set(n.get() + 1));
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

/// Burns one Argon2 verification for a login whose username does not exist,
/// so the response takes as long as a wrong password. Always `false`.
pub fn verify_unknown_user(plain: &str) -> bool {
    verify_password(plain, &DUMMY_HASH);
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(verify_password(password, &hash));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash));
        assert!(!verify_password("correct-horse-battery-stapl", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("pw123").unwrap();
        let b = hash_password("pw123").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("pw123", &a));
        assert!(verify_password("pw123", &b));
    }

    #[test]
    fn handles_empty_long_and_unicode_input() {
        let long = "x".repeat(4096);
        for pw in ["", long.as_str(), "пароль-密码-🔑"] {
            let hash = hash_password(pw).unwrap();
            assert!(verify_password(pw, &hash));
        }
    }

    #[test]
    fn unknown_user_still_runs_argon2() {
        assert!(PasswordHash::new(&DUMMY_HASH).is_ok());
        let before = VERIFICATIONS.with(|n| n.get());
        assert!(!verify_unknown_user("no-such-user"));
        assert!(!verify_unknown_user("pw123"));
        assert_eq!(VERIFICATIONS.with(|n| n.get()), before + 2);
    }

    #[test]
    fn malformed_hash_is_false_not_error() {
        assert!(!verify_password("anything", "not-a-valid-hash"));
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("pw123", "pw123"));
    }
}
