//! Authentication service trait and its error taxonomy.

use async_trait::async_trait;
use thiserror::Error;

use crate::db::User;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username and password are required")]
    MissingFields,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("account is disabled")]
    UserInactive,

    #[error("username is already registered")]
    DuplicateUsername,

    #[error("email is already registered")]
    DuplicateEmail,

    #[error("username must be 3-20 characters of letters, digits or underscores")]
    InvalidUsername,

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("name must be at least 2 characters")]
    InvalidName,

    #[error("{0}")]
    WeakPassword(String),

    #[error("current password is incorrect")]
    WrongCurrentPassword,

    #[error("new password must be different from current password")]
    SamePassword,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub session_id: String,
    pub remember: bool,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Authenticate by username or email-shaped identifier and open a
    /// session. `remember` selects the long-lived expiry.
    async fn login(
        &self,
        identifier: &str,
        password: &str,
        remember: bool,
    ) -> Result<LoginOutcome, AuthError>;

    /// Create a regular (non-admin) account.
    async fn register(&self, registration: Registration) -> Result<User, AuthError>;

    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Destroy the session server-side. Always succeeds for absent ids.
    async fn logout(&self, session_id: &str) -> Result<(), AuthError>;
}
