use axum::{
    Json, Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod admin_images;
pub mod admin_users;
mod assets;
pub mod auth;
pub mod edge;
mod error;
pub mod guard;
mod observability;
mod types;
pub mod validation;

pub use error::{ApiError, ApiJson};
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: SharedState,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn new(shared: SharedState, prometheus_handle: Option<PrometheusHandle>) -> Arc<Self> {
        Arc::new(Self {
            shared,
            start_time: std::time::Instant::now(),
            prometheus_handle,
        })
    }

    pub async fn secure_cookies(&self) -> bool {
        self.shared.config.read().await.server.secure_cookies
    }
}

async fn health(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.shared.store.ping().await?;

    Ok(Json(ApiResponse::ok(
        "OK",
        MessageResponse {
            message: "healthy".to_string(),
        },
    )))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (upload_path, cors_origins) = {
        let config = state.shared.config.read().await;
        (
            config.images.upload_base_path.clone(),
            config.server.cors_allowed_origins.clone(),
        )
    };

    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/change-password", post(auth::change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_auth,
        ));

    let admin = Router::new()
        .route(
            "/admin/users",
            get(admin_users::list_users).post(admin_users::create_user),
        )
        .route(
            "/admin/users/{id}",
            get(admin_users::get_user)
                .put(admin_users::update_user)
                .delete(admin_users::delete_user),
        )
        .route(
            "/admin/cleanup-images",
            get(admin_images::cleanup_info).post(admin_images::run_cleanup),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_admin,
        ));

    let api_router = Router::new()
        .merge(protected)
        .merge(admin)
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/health", get(health))
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api/v1", api_router)
        .route("/metrics", get(observability::get_metrics).with_state(state))
        .nest_service("/uploads", ServeDir::new(upload_path))
        .fallback(assets::serve_asset)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(edge::edge_filter))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
}
