//! Session lifecycle: creation, validation with lazy expiry, revocation
//! and rotation. Sessions are opaque random tokens stored server-side;
//! a row is never extended in place, refresh always rotates the token.

use anyhow::{Context, Result};

use crate::db::{Store, User, now_rfc3339, rfc3339_from_now};

/// Short-term session: 24 hours.
pub const SHORT_TERM_SECS: i64 = 24 * 60 * 60;

/// Long-term ("remember me") session: 30 days.
pub const LONG_TERM_SECS: i64 = 30 * 24 * 60 * 60;

const TOKEN_BYTES: usize = 32;

/// Why a session failed validation. All of these are normal outcomes,
/// not errors; infrastructure failures surface as `anyhow::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRejection {
    NotFound,
    Expired,
    UserMissing,
    UserInactive,
}

#[derive(Debug)]
pub enum SessionValidation {
    Valid(User),
    Invalid(SessionRejection),
}

impl SessionValidation {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    #[must_use]
    pub fn into_user(self) -> Option<User> {
        match self {
            Self::Valid(user) => Some(user),
            Self::Invalid(_) => None,
        }
    }
}

/// Generate an opaque session token (64-char hex string, 256 bits).
#[must_use]
pub fn generate_session_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; TOKEN_BYTES] = rng.random();

    bytes.iter().fold(
        String::with_capacity(TOKEN_BYTES * 2),
        |mut acc, b| {
            use std::fmt::Write;
            let _ = write!(acc, "{b:02x}");
            acc
        },
    )
}

#[derive(Clone)]
pub struct SessionService {
    store: Store,
}

impl SessionService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create a session for a user and record the login time.
    /// `remember` selects the 30-day expiry instead of the 24-hour one.
    pub async fn create(&self, user_id: i32, remember: bool) -> Result<String> {
        let session_id = generate_session_token();
        let ttl = if remember { LONG_TERM_SECS } else { SHORT_TERM_SECS };
        let expires_at = rfc3339_from_now(ttl);

        self.store
            .create_session(&session_id, user_id, &expires_at)
            .await?;

        self.store
            .touch_user_last_login(user_id)
            .await
            .context("Failed to record login time")?;

        Ok(session_id)
    }

    /// Validate a session id. Expired rows are deleted lazily here; a
    /// disabled owner gets every session revoked, not just this one.
    pub async fn validate(&self, session_id: &str) -> Result<SessionValidation> {
        if session_id.is_empty() {
            return Ok(SessionValidation::Invalid(SessionRejection::NotFound));
        }

        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(SessionValidation::Invalid(SessionRejection::NotFound));
        };

        if session.expires_at.as_str() <= now_rfc3339().as_str() {
            // Delete-if-exists: a concurrent sweep may already have won
            self.store.delete_session(session_id).await?;
            return Ok(SessionValidation::Invalid(SessionRejection::Expired));
        }

        let Some(user) = self.store.get_user_by_id(session.user_id).await? else {
            self.store.delete_session(session_id).await?;
            return Ok(SessionValidation::Invalid(SessionRejection::UserMissing));
        };

        if !user.is_active {
            self.store.delete_user_sessions(user.id).await?;
            return Ok(SessionValidation::Invalid(SessionRejection::UserInactive));
        }

        Ok(SessionValidation::Valid(user))
    }

    /// Idempotent: destroying an absent session is a no-op.
    pub async fn destroy(&self, session_id: &str) -> Result<()> {
        if session_id.is_empty() {
            return Ok(());
        }
        self.store.delete_session(session_id).await?;
        Ok(())
    }

    /// Revoke every session a user holds (deactivation, role change).
    pub async fn destroy_user_sessions(&self, user_id: i32) -> Result<u64> {
        self.store.delete_user_sessions(user_id).await
    }

    /// Rotate a valid session: the old token is destroyed and a fresh one
    /// issued, never extended in place. Returns `None` if the session was
    /// not valid.
    pub async fn refresh(&self, session_id: &str, remember: bool) -> Result<Option<String>> {
        let Some(user) = self.validate(session_id).await?.into_user() else {
            return Ok(None);
        };

        self.destroy(session_id).await?;
        let new_id = self.create(user.id, remember).await?;

        Ok(Some(new_id))
    }

    /// Background sweep counterpart of the lazy per-request expiry.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let deleted = self.store.delete_expired_sessions(&now_rfc3339()).await?;
        if deleted > 0 {
            tracing::info!(count = deleted, "Cleaned up expired sessions");
        }
        Ok(deleted)
    }

    /// Seconds until the session expires; 0 for any invalid session.
    pub async fn remaining_seconds(&self, session_id: &str) -> Result<i64> {
        if !self.validate(session_id).await?.is_valid() {
            return Ok(0);
        }

        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(0);
        };

        let expires_at = chrono::DateTime::parse_from_rfc3339(&session.expires_at)
            .context("Malformed session expiry timestamp")?;
        let remaining = expires_at.timestamp() - chrono::Utc::now().timestamp();

        Ok(remaining.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique_hex() {
        let a = generate_session_token();
        let b = generate_session_token();

        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
