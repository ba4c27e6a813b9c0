//! Identification endpoints
//!
//! Results are always HTTP 200 with a `success` flag; expected failures
//! (no match, clarification, provider down) are data, not transport errors.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, usage::UsageKind};
use crate::models::{IdentificationMethod, PlantProfile};
use crate::services::{FailureKind, IdentificationOutcome};
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct IdentifyByNameRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdentifyByPhotoRequest {
    /// Photo to identify; defaults to the sighting's own photo
    #[serde(default)]
    pub photo_id: Option<String>,
}

/// Wire shape of an [`IdentificationOutcome`]
#[derive(Debug, Serialize)]
pub struct IdentificationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<PlantProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<IdentificationMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

impl From<IdentificationOutcome> for IdentificationResponse {
    fn from(outcome: IdentificationOutcome) -> Self {
        let empty = IdentificationResponse {
            success: false,
            plant_id: None,
            profile: None,
            method: None,
            confidence: None,
            suggestions: None,
            error: None,
            kind: None,
        };
        match outcome {
            IdentificationOutcome::Identified {
                plant_id,
                profile,
                method,
                confidence,
            } => IdentificationResponse {
                success: true,
                plant_id: Some(plant_id),
                profile: Some(profile),
                method: Some(method),
                confidence,
                ..empty
            },
            IdentificationOutcome::NeedsClarification {
                suggestions,
                message,
            } => IdentificationResponse {
                suggestions: Some(suggestions),
                error: Some(message),
                ..empty
            },
            IdentificationOutcome::Failed { kind, message } => IdentificationResponse {
                error: Some(message),
                kind: Some(kind),
                ..empty
            },
        }
    }
}

/// POST /api/sightings/:id/identify/name
pub async fn identify_by_name(
    State(state): State<AppState>,
    Path(sighting_id): Path<Uuid>,
    Json(payload): Json<IdentifyByNameRequest>,
) -> ApiResult<Json<IdentificationResponse>> {
    if !payload.name.trim().is_empty() {
        record_usage(&state, sighting_id, UsageKind::Name).await;
    }

    let outcome = state
        .orchestrator()
        .await
        .identify_by_name(sighting_id, &payload.name)
        .await;
    Ok(Json(finish(&state, outcome).await))
}

/// POST /api/sightings/:id/identify/photo
pub async fn identify_by_photo(
    State(state): State<AppState>,
    Path(sighting_id): Path<Uuid>,
    payload: Option<Json<IdentifyByPhotoRequest>>,
) -> ApiResult<Json<IdentificationResponse>> {
    let requested = payload.and_then(|Json(p)| p.photo_id);

    let photo_ref = match requested {
        Some(photo_id) => photo_id,
        None => match db::sightings::get_sighting(&state.db, sighting_id).await? {
            Some(sighting) => sighting.photo_id,
            None => {
                return Ok(Json(
                    IdentificationOutcome::failed(FailureKind::NotFound, "Sighting not found.").into(),
                ))
            }
        },
    };

    if !photo_ref.trim().is_empty() {
        record_usage(&state, sighting_id, UsageKind::Photo).await;
    }

    let outcome = state
        .orchestrator()
        .await
        .identify_by_photo(sighting_id, &photo_ref)
        .await;
    Ok(Json(finish(&state, outcome).await))
}

/// Count the attempt against the sighting owner's daily usage
async fn record_usage(state: &AppState, sighting_id: Uuid, kind: UsageKind) {
    let sighting = match db::sightings::get_sighting(&state.db, sighting_id).await {
        Ok(Some(sighting)) => sighting,
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(sighting_id = %sighting_id, error = %err, "Usage lookup failed");
            return;
        }
    };

    if let Err(err) =
        db::usage::record_identification(&state.db, sighting.user_id, kind, Utc::now()).await
    {
        tracing::warn!(user_id = %sighting.user_id, error = %err, "Recording usage failed");
    }
}

async fn finish(state: &AppState, outcome: IdentificationOutcome) -> IdentificationResponse {
    if let IdentificationOutcome::Failed {
        kind: FailureKind::Internal,
        message,
    } = &outcome
    {
        state.record_error(message.clone()).await;
    }
    outcome.into()
}

pub fn identification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sightings/:id/identify/name", post(identify_by_name))
        .route("/api/sightings/:id/identify/photo", post(identify_by_photo))
}
