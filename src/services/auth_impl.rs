//! SeaORM-backed implementation of [`AuthService`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::api::validation::{is_valid_email, is_valid_username};
use crate::config::SecurityConfig;
use crate::db::{NewUser, Store, User};
use crate::services::auth::{AuthError, AuthService, LoginOutcome, Registration};
use crate::services::password::{self, validate_strength};
use crate::services::session::SessionService;

pub struct SeaOrmAuthService {
    store: Store,
    sessions: SessionService,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, sessions: SessionService, security: SecurityConfig) -> Self {
        Self {
            store,
            sessions,
            security,
        }
    }

    /// Look up a user by identifier, trying username first and falling back
    /// to email when the identifier contains `@`.
    async fn find_with_password(&self, identifier: &str) -> Result<Option<(User, String)>> {
        if let Some(found) = self
            .store
            .get_user_by_username_with_password(identifier)
            .await?
        {
            return Ok(Some(found));
        }

        if identifier.contains('@') {
            return self.store.get_user_by_email_with_password(identifier).await;
        }

        Ok(None)
    }

    /// Replace a hash that was produced with weaker work factors than the
    /// current configuration. Failure here never fails the login.
    async fn migrate_hash(&self, user_id: i32, password: &str) {
        let password = password.to_string();
        let security = self.security.clone();

        let rehash = tokio::task::spawn_blocking(move || {
            password::hash_password(&password, Some(&security))
        })
        .await;

        match rehash {
            Ok(Ok(new_hash)) => {
                if let Err(e) = self.store.update_user_password(user_id, new_hash).await {
                    warn!(user_id, error = %e, "Failed to store migrated password hash");
                } else {
                    info!(user_id, "Migrated password hash to current work factors");
                }
            }
            Ok(Err(e)) => warn!(user_id, error = %e, "Failed to re-hash password"),
            Err(e) => warn!(user_id, error = %e, "Password re-hash task panicked"),
        }
    }
}

async fn verify_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .context("Password verification task panicked")
}

async fn hash_blocking(password: String, security: SecurityConfig) -> Result<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&password, Some(&security)))
        .await
        .context("Password hashing task panicked")?
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(
        &self,
        identifier: &str,
        password: &str,
        remember: bool,
    ) -> Result<LoginOutcome, AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        // Unknown identifier and wrong password are indistinguishable
        let Some((user, hash)) = self.find_with_password(identifier).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_blocking(password.to_string(), hash.clone()).await? {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::UserInactive);
        }

        if self.security.auto_migrate_password_hashes
            && password::needs_rehash(&hash, &self.security)
        {
            self.migrate_hash(user.id, password).await;
        }

        let session_id = self.sessions.create(user.id, remember).await?;

        info!(user_id = user.id, username = %user.username, "User logged in");

        Ok(LoginOutcome {
            user,
            session_id,
            remember,
        })
    }

    async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        let username = registration.username.trim();
        let email = registration.email.trim().to_lowercase();
        let name = registration.name.trim();

        if username.is_empty() || email.is_empty() || registration.password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        if !is_valid_username(username) {
            return Err(AuthError::InvalidUsername);
        }
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        if name.chars().count() < 2 {
            return Err(AuthError::InvalidName);
        }

        let report = validate_strength(&registration.password);
        if !report.is_valid() {
            return Err(AuthError::WeakPassword(report.message()));
        }

        if self.store.get_user_by_username(username).await?.is_some() {
            return Err(AuthError::DuplicateUsername);
        }
        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let hash = hash_blocking(registration.password, self.security.clone()).await?;

        let user = self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                email,
                name: name.to_string(),
                password_hash: hash,
                role: "user".to_string(),
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "User registered");

        Ok(user)
    }

    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let Some(hash) = self.store.get_user_password_hash(user_id).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_blocking(current_password.to_string(), hash).await? {
            return Err(AuthError::WrongCurrentPassword);
        }

        if new_password == current_password {
            return Err(AuthError::SamePassword);
        }

        let report = validate_strength(new_password);
        if !report.is_valid() {
            return Err(AuthError::WeakPassword(report.message()));
        }

        let new_hash = hash_blocking(new_password.to_string(), self.security.clone()).await?;
        self.store.update_user_password(user_id, new_hash).await?;

        info!(user_id, "Password changed");

        Ok(())
    }

    async fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        self.sessions.destroy(session_id).await?;
        Ok(())
    }
}
