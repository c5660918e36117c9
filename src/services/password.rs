//! Password hashing and strength validation.
//!
//! Hashing uses Argon2id with work factors taken from [`SecurityConfig`];
//! verification never fails with an error, a bad hash simply verifies false.

use anyhow::Result;
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::SecurityConfig;

pub const MIN_PASSWORD_LENGTH: usize = 8;

const SPECIAL_CHARS: &str = r##"!@#$%^&*()_+-=[]{};':"\|,.<>/?"##;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    TooShort,
    NoUppercase,
    NoLowercase,
    NoDigit,
    NoSpecialChar,
}

impl PasswordRule {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::TooShort => "password must be at least 8 characters",
            Self::NoUppercase => "password must contain an uppercase letter",
            Self::NoLowercase => "password must contain a lowercase letter",
            Self::NoDigit => "password must contain a digit",
            Self::NoSpecialChar => "password must contain a special character",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StrengthReport {
    pub failed: Vec<PasswordRule>,
}

impl StrengthReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn message(&self) -> String {
        self.failed
            .iter()
            .map(|rule| rule.message())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Check a plaintext password against the strength rules: minimum length
/// plus one character from each of the upper/lower/digit/special classes.
#[must_use]
pub fn validate_strength(password: &str) -> StrengthReport {
    let mut failed = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        failed.push(PasswordRule::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        failed.push(PasswordRule::NoUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        failed.push(PasswordRule::NoLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        failed.push(PasswordRule::NoDigit);
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        failed.push(PasswordRule::NoSpecialChar);
    }

    StrengthReport { failed }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses default params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None, // output length (use default)
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Constant-time verification via the argon2 primitive. Unparsable hashes
/// verify false rather than erroring.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Whether a stored hash was produced with weaker work factors than the
/// configured ones and should be opportunistically re-hashed on login.
#[must_use]
pub fn needs_rehash(hash: &str, config: &SecurityConfig) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        // Unparsable hash, replace it
        return true;
    };

    let Ok(params) = Params::try_from(&parsed) else {
        return true;
    };

    params.m_cost() < config.argon2_memory_cost_kib
        || params.t_cost() < config.argon2_time_cost
        || params.p_cost() < config.argon2_parallelism
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            auto_migrate_password_hashes: true,
        }
    }

    #[test]
    fn test_strength_accepts_compliant_password() {
        let report = validate_strength("Abcdef1!");
        assert!(report.is_valid());
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_strength_rejects_each_missing_class() {
        assert!(
            validate_strength("Ab1!")
                .failed
                .contains(&PasswordRule::TooShort)
        );
        assert!(
            validate_strength("abcdef1!")
                .failed
                .contains(&PasswordRule::NoUppercase)
        );
        assert!(
            validate_strength("ABCDEF1!")
                .failed
                .contains(&PasswordRule::NoLowercase)
        );
        assert!(
            validate_strength("Abcdefg!")
                .failed
                .contains(&PasswordRule::NoDigit)
        );
        assert!(
            validate_strength("Abcdefg1")
                .failed
                .contains(&PasswordRule::NoSpecialChar)
        );
    }

    #[test]
    fn test_hash_verify_round_trip() {
        let config = fast_config();
        let hash = hash_password("Abcdef1!", Some(&config)).unwrap();

        assert!(verify_password("Abcdef1!", &hash));
        assert!(!verify_password("Abcdef1?", &hash));
    }

    #[test]
    fn test_verify_garbage_hash_is_false_not_error() {
        assert!(!verify_password("Abcdef1!", "not-a-phc-string"));
    }

    #[test]
    fn test_needs_rehash_on_weaker_params() {
        let weak = fast_config();
        let hash = hash_password("Abcdef1!", Some(&weak)).unwrap();

        let stronger = SecurityConfig {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            auto_migrate_password_hashes: true,
        };

        assert!(needs_rehash(&hash, &stronger));
        assert!(!needs_rehash(&hash, &weak));
        assert!(needs_rehash("garbage", &weak));
    }
}
