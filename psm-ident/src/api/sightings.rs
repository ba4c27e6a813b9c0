//! Sighting endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::models::{NewSighting, PlantProfile, Sighting, SightingEdit};
use crate::{ApiResult, AppState};

/// Sighting joined with its profile (if identified) and photo URL
#[derive(Debug, Clone, Serialize)]
pub struct SightingDetail {
    #[serde(flatten)]
    pub sighting: Sighting,
    pub plant_profile: Option<PlantProfile>,
    pub photo_url: Option<String>,
}

pub(crate) async fn sighting_detail(state: &AppState, sighting: Sighting) -> ApiResult<SightingDetail> {
    let plant_profile = match sighting.plant_id {
        Some(plant_id) => db::profiles::get_profile(&state.db, plant_id).await?,
        None => None,
    };
    let photo_url = state.photo_store.resolve_url(&sighting.photo_id).await;
    Ok(SightingDetail {
        sighting,
        plant_profile,
        photo_url,
    })
}

/// POST /api/sightings
pub async fn create_sighting(
    State(state): State<AppState>,
    Json(payload): Json<NewSighting>,
) -> ApiResult<(StatusCode, Json<SightingDetail>)> {
    let sighting = state.lifecycle().create(&payload).await?;
    Ok((StatusCode::CREATED, Json(sighting_detail(&state, sighting).await?)))
}

/// GET /api/sightings/:id
pub async fn get_sighting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SightingDetail>> {
    let sighting = state.lifecycle().get(id).await?;
    Ok(Json(sighting_detail(&state, sighting).await?))
}

/// PATCH /api/sightings/:id
///
/// Edits name and notes only; identification state is untouched.
pub async fn edit_sighting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(edit): Json<SightingEdit>,
) -> ApiResult<Json<SightingDetail>> {
    let sighting = state.lifecycle().edit_user_fields(id, &edit).await?;
    Ok(Json(sighting_detail(&state, sighting).await?))
}

/// DELETE /api/sightings/:id
pub async fn delete_sighting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.lifecycle().delete(id).await?;
    tracing::info!(sighting_id = %id, "Sighting deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn sighting_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sightings", post(create_sighting))
        .route(
            "/api/sightings/:id",
            get(get_sighting).patch(edit_sighting).delete(delete_sighting),
        )
}
