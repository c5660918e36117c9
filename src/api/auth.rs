use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::guard::{CurrentUser, clear_session_cookie, session_cookie, session_id_from_headers};
use super::{
    ApiError, ApiJson, ApiResponse, AppState, ChangePasswordRequest, LoginRequest,
    MessageResponse, RegisterRequest, UserSummary,
};
use crate::services::Registration;

/// POST /auth/login
/// Authenticate with username or email and set the session cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let outcome = state
        .shared
        .auth
        .login(&payload.username, &payload.password, payload.remember_me)
        .await?;

    let secure = state.secure_cookies().await;
    let cookie = session_cookie(&outcome.session_id, outcome.remember, secure);

    let body = ApiResponse::ok("Login successful", UserSummary::from(outcome.user));

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(body),
    )
        .into_response())
}

/// POST /auth/register
/// Create a regular account. Does not log the user in.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    if payload.password != payload.confirm_password {
        return Err(ApiError::validation(
            "Passwords do not match",
            Some("confirmPassword"),
        ));
    }

    let user = state
        .shared
        .auth
        .register(Registration {
            username: payload.username,
            email: payload.email,
            password: payload.password,
            name: payload.name,
        })
        .await?;

    let body = ApiResponse::created("Account created", UserSummary::from(user));

    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// POST /auth/logout
/// Always 200; destroys the session server-side if one is present and
/// clears the cookie either way.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(session_id) = session_id_from_headers(&headers) {
        state.shared.auth.logout(&session_id).await?;
    }

    let secure = state.secure_cookies().await;
    let body = ApiResponse::ok(
        "Logged out",
        MessageResponse {
            message: "Logged out".to_string(),
        },
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie(secure))],
        Json(body),
    )
        .into_response())
}

/// GET /auth/me
pub async fn me(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<ApiResponse<UserSummary>> {
    Json(ApiResponse::ok("OK", UserSummary::from(user)))
}

/// POST /auth/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .shared
        .auth
        .change_password(user.id, &payload.current_password, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::ok(
        "Password updated",
        MessageResponse {
            message: "Password updated successfully".to_string(),
        },
    )))
}
