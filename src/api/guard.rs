//! Authoritative per-route auth checks. The edge filter only looks at
//! cookie presence; these middlewares validate the session against the
//! store on every protected request and attach the user to the request.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::db::User;
use crate::services::session::{LONG_TERM_SECS, SHORT_TERM_SECS};

pub const SESSION_COOKIE: &str = "session_id";

/// Header the edge filter forwards the raw token in, so handlers behind
/// it avoid re-parsing the cookie string.
pub const SESSION_HEADER: &str = "x-session-id";

/// The validated user for the current request, inserted by
/// [`require_auth`] / [`require_admin`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Extract the session token from the forwarded header or the cookie.
#[must_use]
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(SESSION_HEADER)
        && let Ok(token) = value.to_str()
        && !token.is_empty()
    {
        return Some(token.to_string());
    }

    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;

    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Build the Set-Cookie value for a freshly issued session.
#[must_use]
pub fn session_cookie(token: &str, remember: bool, secure: bool) -> String {
    let max_age = if remember { LONG_TERM_SECS } else { SHORT_TERM_SECS };
    let mut cookie = format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Expire the session cookie immediately.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

async fn validated_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<User, ApiError> {
    let Some(session_id) = session_id_from_headers(headers) else {
        return Err(ApiError::unauthorized());
    };

    let validation = state
        .shared
        .sessions
        .validate(&session_id)
        .await
        .map_err(|e| ApiError::internal(format!("Session validation failed: {e}")))?;

    validation.into_user().ok_or_else(ApiError::unauthorized)
}

/// Reject with 401 unless the request carries a valid session; attaches
/// [`CurrentUser`] for the handler.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = validated_user(&state, request.headers()).await?;

    tracing::Span::current().record("user_id", user.id);
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

/// As [`require_auth`], additionally requiring the admin role.
/// Unauthenticated gets 401, authenticated non-admin gets 403.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = validated_user(&state, request.headers()).await?;

    if !user.is_admin() {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }

    tracing::Span::current().record("user_id", user.id);
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_id_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc123; lang=en"),
        );
        assert_eq!(session_id_from_headers(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_forwarded_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("fwd"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("session_id=cookie"),
        );
        assert_eq!(session_id_from_headers(&headers), Some("fwd".to_string()));
    }

    #[test]
    fn test_missing_or_empty_cookie_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(session_id_from_headers(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("session_id="),
        );
        assert_eq!(session_id_from_headers(&headers), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("tok", false, true);
        assert!(cookie.starts_with("session_id=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.ends_with("Secure"));

        let remembered = session_cookie("tok", true, false);
        assert!(remembered.contains("Max-Age=2592000"));
        assert!(!remembered.contains("Secure"));

        let cleared = clear_session_cookie(false);
        assert!(cleared.contains("Max-Age=0"));
    }
}
