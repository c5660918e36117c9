//! Edge request filter. Runs before routing and never touches the
//! database: it classifies the path, checks only for cookie *presence*,
//! and either passes through, rejects, or redirects. Full session
//! validation is the per-route guards' job.

use axum::{
    Json,
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::guard::{SESSION_HEADER, session_id_from_headers};
use super::types::ApiResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    StaticAsset,
    PublicApi,
    ProtectedApi,
    AdminApi,
    PublicPage,
    AuthPage,
    ProtectedPage,
}

const PUBLIC_API: &[&str] = &[
    "/api/v1/auth/login",
    "/api/v1/auth/register",
    "/api/v1/auth/logout",
];

const PROTECTED_API_PREFIXES: &[&str] = &[
    "/api/v1/menu",
    "/api/v1/categories",
    "/api/v1/recipes",
    "/api/v1/ai",
    "/api/v1/upload",
    "/api/v1/admin",
];

const AUTH_PAGES: &[&str] = &["/login", "/register"];

const PROTECTED_PAGE_PREFIXES: &[&str] = &["/checkout", "/admin"];

fn has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

#[must_use]
pub fn classify(path: &str) -> PathClass {
    if path.starts_with("/uploads/")
        || path
            .rsplit('/')
            .next()
            .is_some_and(|segment| segment.contains('.'))
    {
        return PathClass::StaticAsset;
    }

    if path.starts_with("/api/") {
        if PUBLIC_API.contains(&path) {
            return PathClass::PublicApi;
        }
        if has_prefix(path, "/api/v1/admin") {
            return PathClass::AdminApi;
        }
        if PROTECTED_API_PREFIXES.iter().any(|p| has_prefix(path, p)) {
            return PathClass::ProtectedApi;
        }
        // Remaining API paths pass the edge; their own guards decide
        return PathClass::PublicApi;
    }

    if AUTH_PAGES.contains(&path) {
        return PathClass::AuthPage;
    }

    if path == "/" || PROTECTED_PAGE_PREFIXES.iter().any(|p| has_prefix(path, p)) {
        return PathClass::ProtectedPage;
    }

    PathClass::PublicPage
}

fn reject_unauthenticated() -> Response {
    let body = ApiResponse::<()>::error(
        401,
        "Authentication required",
        "AUTHENTICATION_ERROR",
        None,
    );
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

pub async fn edge_filter(mut request: Request, next: Next) -> Response {
    // The forwarded-token header is edge-owned; never trust an inbound one
    request.headers_mut().remove(SESSION_HEADER);

    let path = request.uri().path().to_string();
    let token = session_id_from_headers(request.headers());

    match classify(&path) {
        PathClass::StaticAsset | PathClass::PublicApi | PathClass::PublicPage => {
            next.run(request).await
        }
        PathClass::ProtectedApi | PathClass::AdminApi => match token {
            None => reject_unauthenticated(),
            Some(token) => {
                if let Ok(value) = HeaderValue::from_str(&token) {
                    request.headers_mut().insert(SESSION_HEADER, value);
                }
                next.run(request).await
            }
        },
        PathClass::AuthPage => {
            // Optimistic: presence only, validity re-checked downstream
            if token.is_some() {
                Redirect::to("/").into_response()
            } else {
                next.run(request).await
            }
        }
        PathClass::ProtectedPage => {
            if token.is_some() {
                next.run(request).await
            } else {
                let target = format!("/login?redirect={}", urlencoding::encode(&path));
                Redirect::to(&target).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_api_paths() {
        assert_eq!(classify("/api/v1/auth/login"), PathClass::PublicApi);
        assert_eq!(classify("/api/v1/auth/register"), PathClass::PublicApi);
        assert_eq!(classify("/api/v1/auth/logout"), PathClass::PublicApi);
        assert_eq!(classify("/api/v1/auth/me"), PathClass::PublicApi);
        assert_eq!(classify("/api/v1/menu"), PathClass::ProtectedApi);
        assert_eq!(classify("/api/v1/recipes/42"), PathClass::ProtectedApi);
        assert_eq!(classify("/api/v1/admin"), PathClass::AdminApi);
        assert_eq!(classify("/api/v1/admin/users/7"), PathClass::AdminApi);
    }

    #[test]
    fn test_classify_pages_and_assets() {
        assert_eq!(classify("/"), PathClass::ProtectedPage);
        assert_eq!(classify("/checkout"), PathClass::ProtectedPage);
        assert_eq!(classify("/admin/users"), PathClass::ProtectedPage);
        assert_eq!(classify("/login"), PathClass::AuthPage);
        assert_eq!(classify("/register"), PathClass::AuthPage);
        assert_eq!(classify("/about"), PathClass::PublicPage);
        assert_eq!(classify("/favicon.ico"), PathClass::StaticAsset);
        assert_eq!(classify("/uploads/temp/x"), PathClass::StaticAsset);
        assert_eq!(classify("/assets/app.js"), PathClass::StaticAsset);
    }

    #[test]
    fn test_prefix_matching_is_segment_aware() {
        // "/administrator" is not under "/admin"
        assert_eq!(classify("/administrator"), PathClass::PublicPage);
        assert_eq!(classify("/api/v1/menus"), PathClass::PublicApi);
    }
}
