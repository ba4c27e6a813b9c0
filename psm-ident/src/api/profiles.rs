//! Plant profile endpoints: search, lookup and enhancement

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;
use crate::models::PlantProfile;
use crate::services::{EnhancementOutcome, FailureKind};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct EnhanceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<PlantProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

impl From<EnhancementOutcome> for EnhanceResponse {
    fn from(outcome: EnhancementOutcome) -> Self {
        match outcome {
            EnhancementOutcome::Enhanced { profile } => EnhanceResponse {
                success: true,
                profile: Some(profile),
                error: None,
                kind: None,
            },
            EnhancementOutcome::Failed { kind, message } => EnhanceResponse {
                success: false,
                profile: None,
                error: Some(message),
                kind: Some(kind),
            },
        }
    }
}

/// GET /api/profiles?q=term
///
/// Exact scientific name first, then common name, partial scientific
/// name and family matches.
pub async fn search_profiles(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<PlantProfile>>> {
    let profiles = db::profiles::find_by_name_or_alias(&state.db, &query.q).await?;
    Ok(Json(profiles))
}

/// GET /api/profiles/:id
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PlantProfile>> {
    db::profiles::get_profile(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Plant profile {}", id)))
}

/// POST /api/profiles/:id/enhance
pub async fn enhance_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Json<EnhanceResponse> {
    let outcome = state.orchestrator().await.enhance_profile(id).await;
    if let EnhancementOutcome::Failed {
        kind: FailureKind::Internal,
        message,
    } = &outcome
    {
        state.record_error(message.clone()).await;
    }
    Json(outcome.into())
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/api/profiles", get(search_profiles))
        .route("/api/profiles/:id", get(get_profile))
        .route("/api/profiles/:id/enhance", post(enhance_profile))
}
