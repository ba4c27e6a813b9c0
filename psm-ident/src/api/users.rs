//! User endpoints: creation, entitlement and sighting list

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use super::sightings::{sighting_detail, SightingDetail};
use crate::db;
use crate::models::{NewUser, User};
use crate::services::{entitlement_for_user, Entitlement};
use crate::{ApiError, ApiResult, AppState};

/// POST /api/users
///
/// Idempotent on email: an existing user is returned with 200, a new one
/// with 201.
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let (user, created) = db::users::create_user(&state.db, &payload).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(user)))
}

/// GET /api/users/:id/entitlement
pub async fn get_entitlement(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Entitlement>> {
    let user = load_user(&state, user_id).await?;
    let entitlement = entitlement_for_user(&state.db, &user, Utc::now()).await?;
    Ok(Json(entitlement))
}

/// GET /api/users/:id/sightings (newest first)
pub async fn list_sightings(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<SightingDetail>>> {
    load_user(&state, user_id).await?;
    let sightings = db::sightings::list_for_user(&state.db, user_id).await?;

    let mut details = Vec::with_capacity(sightings.len());
    for sighting in sightings {
        details.push(sighting_detail(&state, sighting).await?);
    }
    Ok(Json(details))
}

pub(crate) async fn load_user(state: &AppState, user_id: Uuid) -> ApiResult<User> {
    db::users::get_user(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", user_id)))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(create_user))
        .route("/api/users/:id/entitlement", get(get_entitlement))
        .route("/api/users/:id/sightings", get(list_sightings))
}
