//! Admin user management endpoints: CRUD, self-modification guards and
//! session revocation on deactivation or role change.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tavola::config::Config;
use tavola::state::SharedState;
use tower::ServiceExt;

/// Default admin password seeded by migration (must match m20250601_initial.rs)
const DEFAULT_ADMIN_PASSWORD: &str = "ChangeMe123!";

async fn spawn_app() -> Router {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // One pooled connection, or each connection sees its own memory db
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.server.secure_cookies = false;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.images.upload_base_path = std::env::temp_dir()
        .join(format!("tavola-admin-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();

    let shared = SharedState::new(config)
        .await
        .expect("Failed to create shared state");
    let state = tavola::api::AppState::new(shared, None);
    tavola::api::router(state).await
}

fn json_request(method: &str, uri: &str, cookie: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({"username": username, "password": password}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing Set-Cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

/// Create a user via the admin endpoint, returning its id.
async fn create_user(app: &Router, cookie: &str, username: &str, role: Option<&str>) -> i64 {
    let mut payload = serde_json::json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "Str0ng!pass",
        "name": format!("{username} name"),
    });
    if let Some(role) = role {
        payload["role"] = serde_json::json!(role);
    }

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/admin/users", cookie, payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_create_get_list_users() {
    let app = spawn_app().await;
    let cookie = login(&app, "admin", DEFAULT_ADMIN_PASSWORD).await;

    let bob_id = create_user(&app, &cookie, "bob", None).await;

    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/api/v1/admin/users/{bob_id}"),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["username"], "bob");
    assert_eq!(body["data"]["role"], "user");
    assert_eq!(body["data"]["isActive"], true);

    // Search narrows the listing
    let response = app
        .clone()
        .oneshot(get_request("/api/v1/admin/users?search=bob", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["users"][0]["username"], "bob");

    // Unfiltered listing includes the seeded admin too
    let response = app
        .clone()
        .oneshot(get_request("/api/v1/admin/users", &cookie))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn test_create_user_duplicate_and_bad_role() {
    let app = spawn_app().await;
    let cookie = login(&app, "admin", DEFAULT_ADMIN_PASSWORD).await;

    create_user(&app, &cookie, "bob", None).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admin/users",
            &cookie,
            serde_json::json!({
                "username": "bob",
                "email": "bob2@example.com",
                "password": "Str0ng!pass",
                "name": "Bob Two"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admin/users",
            &cookie,
            serde_json::json!({
                "username": "carol",
                "email": "carol@example.com",
                "password": "Str0ng!pass",
                "name": "Carol",
                "role": "superuser"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["field"], "role");
}

#[tokio::test]
async fn test_self_modification_guards() {
    let app = spawn_app().await;
    let cookie = login(&app, "admin", DEFAULT_ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(get_request("/api/v1/auth/me", &cookie))
        .await
        .unwrap();
    let admin_id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/admin/users/{admin_id}"),
            &cookie,
            serde_json::json!({"isActive": false}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "CANNOT_DISABLE_SELF");

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/admin/users/{admin_id}"),
            &cookie,
            serde_json::json!({"role": "user"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "CANNOT_DEMOTE_SELF");

    let response = app
        .clone()
        .oneshot(json_request(
            "DELETE",
            &format!("/api/v1/admin/users/{admin_id}"),
            &cookie,
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "CANNOT_DELETE_SELF");

    // None of the guards touched the account
    let response = app
        .clone()
        .oneshot(get_request("/api/v1/auth/me", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["role"], "admin");
    assert_eq!(body["data"]["isActive"], true);
}

#[tokio::test]
async fn test_deactivation_revokes_target_sessions() {
    let app = spawn_app().await;
    let admin_cookie = login(&app, "admin", DEFAULT_ADMIN_PASSWORD).await;

    let bob_id = create_user(&app, &admin_cookie, "bob", None).await;
    let bob_cookie = login(&app, "bob", "Str0ng!pass").await;

    // Bob's session works before the change
    let response = app
        .clone()
        .oneshot(get_request("/api/v1/auth/me", &bob_cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/admin/users/{bob_id}"),
            &admin_cookie,
            serde_json::json!({"isActive": false}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["isActive"], false);

    // Revoked: bob's live session no longer validates
    let response = app
        .clone()
        .oneshot(get_request("/api/v1/auth/me", &bob_cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // And bob can no longer log in at all
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({"username": "bob", "password": "Str0ng!pass"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_change_revokes_target_sessions() {
    let app = spawn_app().await;
    let admin_cookie = login(&app, "admin", DEFAULT_ADMIN_PASSWORD).await;

    let bob_id = create_user(&app, &admin_cookie, "bob", None).await;
    let bob_cookie = login(&app, "bob", "Str0ng!pass").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/admin/users/{bob_id}"),
            &admin_cookie,
            serde_json::json!({"role": "admin"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["role"], "admin");

    // Promotion drops the old session; the new role applies on next login
    let response = app
        .clone()
        .oneshot(get_request("/api/v1/auth/me", &bob_cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let bob_cookie = login(&app, "bob", "Str0ng!pass").await;
    let response = app
        .clone()
        .oneshot(get_request("/api/v1/admin/users", &bob_cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_non_admin_is_forbidden() {
    let app = spawn_app().await;
    let admin_cookie = login(&app, "admin", DEFAULT_ADMIN_PASSWORD).await;
    create_user(&app, &admin_cookie, "bob", None).await;

    let bob_cookie = login(&app, "bob", "Str0ng!pass").await;

    let response = app
        .clone()
        .oneshot(get_request("/api/v1/admin/users", &bob_cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "AUTHORIZATION_ERROR");
}

#[tokio::test]
async fn test_delete_user() {
    let app = spawn_app().await;
    let cookie = login(&app, "admin", DEFAULT_ADMIN_PASSWORD).await;

    let bob_id = create_user(&app, &cookie, "bob", None).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "DELETE",
            &format!("/api/v1/admin/users/{bob_id}"),
            &cookie,
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/api/v1/admin/users/{bob_id}"),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Deleting again is a 404, not an error
    let response = app
        .clone()
        .oneshot(json_request(
            "DELETE",
            &format!("/api/v1/admin/users/{bob_id}"),
            &cookie,
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_weak_password_on_update_leaves_account_untouched() {
    let app = spawn_app().await;
    let cookie = login(&app, "admin", DEFAULT_ADMIN_PASSWORD).await;

    let bob_id = create_user(&app, &cookie, "bob", None).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/admin/users/{bob_id}"),
            &cookie,
            serde_json::json!({"role": "admin", "password": "weak"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["field"], "password");

    // The rejected request must not have applied the role change
    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/api/v1/admin/users/{bob_id}"),
            &cookie,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["role"], "user");

    // And the old password still works
    login(&app, "bob", "Str0ng!pass").await;
}

#[tokio::test]
async fn test_admin_create_normalizes_email() {
    let app = spawn_app().await;
    let cookie = login(&app, "admin", DEFAULT_ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admin/users",
            &cookie,
            serde_json::json!({
                "username": "carol",
                "email": "CaRoL@Example.COM",
                "password": "Str0ng!pass",
                "name": "Carol"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["email"], "carol@example.com");

    // Case variants collide with the stored form
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admin/users",
            &cookie,
            serde_json::json!({
                "username": "carol2",
                "email": "carol@example.com",
                "password": "Str0ng!pass",
                "name": "Carol Two"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cleanup_tolerates_extreme_age() {
    let app = spawn_app().await;
    let cookie = login(&app, "admin", DEFAULT_ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admin/cleanup-images",
            &cookie,
            serde_json::json!({"cleanupType": "temp", "olderThanHours": i64::MAX}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["deleted"], 0);
}

#[tokio::test]
async fn test_update_user_password_by_admin() {
    let app = spawn_app().await;
    let cookie = login(&app, "admin", DEFAULT_ADMIN_PASSWORD).await;

    let bob_id = create_user(&app, &cookie, "bob", None).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/admin/users/{bob_id}"),
            &cookie,
            serde_json::json!({"password": "Reset9#now"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    login(&app, "bob", "Reset9#now").await;
}
