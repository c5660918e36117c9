//! Admin user management. The self-modification guards return distinct
//! machine codes so the UI can show a specific message; each guard also
//! leaves the admin's row untouched.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::info;

use super::guard::CurrentUser;
use super::validation::{is_valid_email, is_valid_username};
use super::{
    AdminCreateUserRequest, AdminUpdateUserRequest, ApiError, ApiJson, ApiResponse, AppState,
    MessageResponse, UserListPage, UserListQuery, UserSummary,
};
use crate::db::{NewUser, UserListFilter, UserUpdate};
use crate::services::password::{hash_password, validate_strength};

const VALID_ROLES: &[&str] = &["user", "admin"];

fn validate_role(role: &str) -> Result<(), ApiError> {
    if VALID_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(ApiError::validation(
            format!("Invalid role: {role}"),
            Some("role"),
        ))
    }
}

async fn hash_blocking(state: &AppState, password: String) -> Result<String, ApiError> {
    let security = state.shared.config.read().await.security.clone();
    tokio::task::spawn_blocking(move || hash_password(&password, Some(&security)))
        .await
        .map_err(|e| ApiError::internal(format!("Hashing task panicked: {e}")))?
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<ApiResponse<UserListPage>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (users, total) = state
        .shared
        .store
        .list_users(UserListFilter {
            search: query.search,
            role: query.role,
            is_active: query.is_active,
            page,
            limit,
        })
        .await?;

    Ok(Json(ApiResponse::ok(
        "OK",
        UserListPage {
            users: users.into_iter().map(UserSummary::from).collect(),
            total,
            page,
            limit,
        },
    )))
}

/// POST /admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<AdminCreateUserRequest>,
) -> Result<Response, ApiError> {
    let username = payload.username.trim();
    let email = payload.email.trim().to_lowercase();
    let name = payload.name.trim();

    if !is_valid_username(username) {
        return Err(ApiError::validation(
            "username must be 3-20 characters of letters, digits or underscores",
            Some("username"),
        ));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::validation(
            "email address is not valid",
            Some("email"),
        ));
    }
    if name.chars().count() < 2 {
        return Err(ApiError::validation(
            "name must be at least 2 characters",
            Some("name"),
        ));
    }

    let role = payload.role.unwrap_or_else(|| "user".to_string());
    validate_role(&role)?;

    let report = validate_strength(&payload.password);
    if !report.is_valid() {
        return Err(ApiError::validation(report.message(), Some("password")));
    }

    let store = &state.shared.store;
    if store.get_user_by_username(username).await?.is_some() {
        return Err(ApiError::Conflict {
            message: "username is already registered".to_string(),
            field: Some("username".to_string()),
        });
    }
    if store.get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict {
            message: "email is already registered".to_string(),
            field: Some("email".to_string()),
        });
    }

    let hash = hash_blocking(&state, payload.password).await?;

    let mut user = store
        .create_user(NewUser {
            username: username.to_string(),
            email,
            name: name.to_string(),
            password_hash: hash,
            role,
        })
        .await?;

    // New accounts start active; an explicit false flips them immediately
    if payload.is_active == Some(false) {
        user = store
            .update_user_account(
                user.id,
                UserUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await?
            .unwrap_or(user);
    }

    info!(admin_id = admin.id, user_id = user.id, "Admin created user");

    let body = ApiResponse::created("User created", UserSummary::from(user));
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// GET /admin/users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserSummary>>, ApiError> {
    let user = state
        .shared
        .store
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {id} not found")))?;

    Ok(Json(ApiResponse::ok("OK", UserSummary::from(user))))
}

/// PUT /admin/users/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<AdminUpdateUserRequest>,
) -> Result<Json<ApiResponse<UserSummary>>, ApiError> {
    let store = &state.shared.store;

    let target = store
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {id} not found")))?;

    if id == admin.id {
        if payload.is_active == Some(false) {
            return Err(ApiError::coded(
                "CANNOT_DISABLE_SELF",
                "You cannot disable your own account",
            ));
        }
        if payload.role.as_deref().is_some_and(|r| r != "admin") {
            return Err(ApiError::coded(
                "CANNOT_DEMOTE_SELF",
                "You cannot change your own role",
            ));
        }
    }

    if let Some(role) = &payload.role {
        validate_role(role)?;
    }
    let email_update = payload.email.map(|e| e.trim().to_lowercase());
    if let Some(email) = &email_update {
        if !is_valid_email(email) {
            return Err(ApiError::validation(
                "email address is not valid",
                Some("email"),
            ));
        }
        if let Some(existing) = store.get_user_by_email(email).await?
            && existing.id != id
        {
            return Err(ApiError::Conflict {
                message: "email is already registered".to_string(),
                field: Some("email".to_string()),
            });
        }
    }

    // Validate and hash before any write, so a bad password leaves the
    // account untouched
    let new_hash = if let Some(password) = payload.password {
        let report = validate_strength(&password);
        if !report.is_valid() {
            return Err(ApiError::validation(report.message(), Some("password")));
        }
        Some(hash_blocking(&state, password).await?)
    } else {
        None
    };

    let deactivated = payload.is_active == Some(false) && target.is_active;
    let role_changed = payload
        .role
        .as_deref()
        .is_some_and(|role| role != target.role);

    let updated = store
        .update_user_account(
            id,
            UserUpdate {
                email: email_update,
                name: payload.name,
                role: payload.role,
                is_active: payload.is_active,
            },
        )
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {id} not found")))?;

    if let Some(hash) = new_hash {
        store.update_user_password(id, hash).await?;
    }

    // Deactivation or role change invalidates everything the target holds
    if deactivated || role_changed {
        let revoked = state.shared.sessions.destroy_user_sessions(id).await?;
        info!(
            admin_id = admin.id,
            user_id = id,
            revoked,
            "Revoked sessions after account change"
        );
    }

    Ok(Json(ApiResponse::ok(
        "User updated",
        UserSummary::from(updated),
    )))
}

/// DELETE /admin/users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if id == admin.id {
        return Err(ApiError::coded(
            "CANNOT_DELETE_SELF",
            "You cannot delete your own account",
        ));
    }

    let deleted = state.shared.store.delete_user(id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("User {id} not found")));
    }

    info!(admin_id = admin.id, user_id = id, "Admin deleted user");

    Ok(Json(ApiResponse::ok(
        "User deleted",
        MessageResponse {
            message: "User deleted".to_string(),
        },
    )))
}
