//! Photo upload endpoint

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::services::{StoredPhoto, MAX_PHOTO_BYTES};
use crate::{ApiError, ApiResult, AppState};

/// Multipart field carrying the image
pub const PHOTO_FIELD: &str = "photo";

/// POST /api/photos (multipart, field `photo`)
pub async fn upload_photo(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<StoredPhoto>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(PHOTO_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Could not read photo: {}", e)))?;

        let stored = state.photo_store.upload(bytes.to_vec()).await?;
        tracing::info!(photo_id = %stored.photo_id, mime_type = %stored.mime_type, "Photo uploaded");
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(ApiError::BadRequest(format!(
        "Multipart field '{}' is required",
        PHOTO_FIELD
    )))
}

pub fn photo_routes() -> Router<AppState> {
    Router::new()
        .route("/api/photos", post(upload_photo))
        // Multipart framing overhead on top of the image itself
        .layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + 64 * 1024))
}
