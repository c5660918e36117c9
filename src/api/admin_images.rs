use axum::{Extension, Json, extract::State};
use std::sync::Arc;
use tracing::info;

use super::guard::CurrentUser;
use super::{
    ApiError, ApiJson, ApiResponse, AppState, CleanupImagesRequest, CleanupImagesResponse,
    CleanupInfo,
};

const CLEANUP_TYPES: &[&str] = &["temp", "recipe", "all"];

/// GET /admin/cleanup-images
pub async fn cleanup_info() -> Json<ApiResponse<CleanupInfo>> {
    Json(ApiResponse::ok(
        "OK",
        CleanupInfo {
            available: true,
            cleanup_types: CLEANUP_TYPES.to_vec(),
        },
    ))
}

/// POST /admin/cleanup-images
pub async fn run_cleanup(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<CleanupImagesRequest>,
) -> Result<Json<ApiResponse<CleanupImagesResponse>>, ApiError> {
    // One year is far beyond any useful retention window
    let older_than_hours = payload.older_than_hours.unwrap_or(1).clamp(0, 24 * 365);
    let images = &state.shared.images;

    let deleted = match payload.cleanup_type.as_str() {
        "temp" => images.cleanup_temp(older_than_hours).await?,
        "recipe" => images.cleanup_all_recipe_images().await?,
        "all" => {
            images.cleanup_all_recipe_images().await? + images.cleanup_temp(older_than_hours).await?
        }
        other => {
            return Err(ApiError::validation(
                format!("Unknown cleanup type: {other}"),
                Some("cleanupType"),
            ));
        }
    };

    info!(
        admin_id = admin.id,
        cleanup_type = %payload.cleanup_type,
        deleted,
        "Admin ran image cleanup"
    );

    Ok(Json(ApiResponse::ok(
        "Cleanup complete",
        CleanupImagesResponse {
            cleanup_type: payload.cleanup_type,
            deleted,
        },
    )))
}
