use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::{AuthError, ImageError};

#[derive(Debug)]
pub enum ApiError {
    Validation {
        message: String,
        error_type: String,
        field: Option<String>,
    },

    Unauthorized(String),

    Forbidden(String),

    NotFound(String),

    Conflict {
        message: String,
        field: Option<String>,
    },

    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { message, .. } => write!(f, "Validation error: {message}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, error_type, field) = match self {
            Self::Validation {
                message,
                error_type,
                field,
            } => (StatusCode::BAD_REQUEST, message, error_type, field),
            Self::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                message,
                "AUTHENTICATION_ERROR".to_string(),
                None,
            ),
            Self::Forbidden(message) => (
                StatusCode::FORBIDDEN,
                message,
                "AUTHORIZATION_ERROR".to_string(),
                None,
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                message,
                "NOT_FOUND".to_string(),
                None,
            ),
            Self::Conflict { message, field } => (
                StatusCode::CONFLICT,
                message,
                "CONFLICT_ERROR".to_string(),
                field,
            ),
            Self::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    "INFRASTRUCTURE_ERROR".to_string(),
                    None,
                )
            }
        };

        let body = ApiResponse::<()>::error(status.as_u16(), message, error_type, field);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::MissingFields => Self::validation(message, None),
            AuthError::InvalidCredentials => Self::Unauthorized(message),
            AuthError::UserInactive => Self::Forbidden(message),
            AuthError::DuplicateUsername => Self::Conflict {
                message,
                field: Some("username".to_string()),
            },
            AuthError::DuplicateEmail => Self::Conflict {
                message,
                field: Some("email".to_string()),
            },
            AuthError::InvalidUsername => Self::validation(message, Some("username")),
            AuthError::InvalidEmail => Self::validation(message, Some("email")),
            AuthError::InvalidName => Self::validation(message, Some("name")),
            AuthError::WeakPassword(_) => Self::validation(message, Some("password")),
            AuthError::WrongCurrentPassword => Self::validation(message, Some("currentPassword")),
            AuthError::SamePassword => Self::validation(message, Some("newPassword")),
            AuthError::Internal(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::TempNotFound(url) => Self::NotFound(format!("Image not found: {url}")),
            ImageError::Other(e) => Self::Internal(e.to_string()),
        }
    }
}

impl ApiError {
    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Validation {
            message: message.into(),
            error_type: "VALIDATION_ERROR".to_string(),
            field: field.map(String::from),
        }
    }

    /// A 400 carrying a caller-distinguishable machine code, used by the
    /// admin self-modification guards.
    pub fn coded(code: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            error_type: code.to_string(),
            field: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized("Not authenticated".to_string())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// JSON body extractor whose rejection is the standard error envelope.
/// A missing field or malformed body becomes a 400 validation error
/// instead of axum's plain-text 422.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text(), None))?;

        Ok(Self(value))
    }
}
