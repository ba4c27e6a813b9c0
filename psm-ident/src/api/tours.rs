//! Tour endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::users::load_user;
use crate::db;
use crate::models::{NewTour, Tour, TourStop, TourStopDetail, TourWithStops};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct AddStopRequest {
    pub sighting_id: Uuid,
    #[serde(default)]
    pub custom_notes: Option<String>,
}

/// POST /api/tours
pub async fn create_tour(
    State(state): State<AppState>,
    Json(payload): Json<NewTour>,
) -> ApiResult<(StatusCode, Json<Tour>)> {
    load_user(&state, payload.user_id).await?;
    let tour = db::tours::insert_tour(&state.db, &payload).await?;
    tracing::info!(tour_id = %tour.id, is_public = tour.is_public, "Tour created");
    Ok((StatusCode::CREATED, Json(tour)))
}

/// GET /api/tours/:id
///
/// Stops come back in order; stops whose sighting is gone are skipped.
pub async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TourWithStops>> {
    let tour = db::tours::get_tour(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Tour {}", id)))?;

    let mut stops = Vec::new();
    for stop in db::tours::list_stops(&state.db, id).await? {
        let Some(sighting) = db::sightings::get_sighting(&state.db, stop.sighting_id).await? else {
            continue;
        };
        let plant_profile = match sighting.plant_id {
            Some(plant_id) => db::profiles::get_profile(&state.db, plant_id).await?,
            None => None,
        };
        let photo_url = state.photo_store.resolve_url(&sighting.photo_id).await;
        stops.push(TourStopDetail {
            stop,
            sighting,
            plant_profile,
            photo_url,
        });
    }

    Ok(Json(TourWithStops { tour, stops }))
}

/// DELETE /api/tours/:id
pub async fn delete_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !db::tours::delete_tour(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Tour {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/tours/:id/stops (appended at the end)
pub async fn add_stop(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
    Json(payload): Json<AddStopRequest>,
) -> ApiResult<(StatusCode, Json<TourStop>)> {
    let stop = db::tours::add_stop(
        &state.db,
        tour_id,
        payload.sighting_id,
        payload.custom_notes.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(stop)))
}

/// DELETE /api/tour_stops/:id (remaining stops renumbered)
pub async fn remove_stop(
    State(state): State<AppState>,
    Path(stop_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !db::tours::remove_stop(&state.db, stop_id).await? {
        return Err(ApiError::NotFound(format!("Tour stop {}", stop_id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn tour_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tours", post(create_tour))
        .route("/api/tours/:id", get(get_tour).delete(delete_tour))
        .route("/api/tours/:id/stops", post(add_stop))
        .route("/api/tour_stops/:id", delete(remove_stop))
}
