//! Settings API endpoint
//!
//! Provides POST /api/settings/provider_keys for runtime credential changes

use crate::config::{is_valid_key, resolve_provider_credentials};
use crate::providers::ProviderSet;
use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, routing::post, Json, Router};
use psm_common::config::{load_toml_config, write_toml_config};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Request payload; absent keys are left as they are
#[derive(Debug, Deserialize)]
pub struct SetProviderKeysRequest {
    #[serde(default)]
    pub plantnet_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
}

/// Response payload for API key configuration
#[derive(Debug, Serialize)]
pub struct SetProviderKeysResponse {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable status message
    pub message: String,
    /// Providers configured after the change
    pub visual_configured: bool,
    pub generative_configured: bool,
}

/// POST /api/settings/provider_keys handler
///
/// **Request:** `{"plantnet_api_key": "...", "gemini_api_key": "..."}`
///
/// **Behavior:**
/// 1. Validate every key given (non-empty, non-whitespace)
/// 2. Write to database (authoritative)
/// 3. Rebuild providers and swap them in for new requests
/// 4. Sync to TOML (best-effort backup)
///
/// **Errors:**
/// - 400 Bad Request: no key given, or an empty/whitespace-only key
/// - 500 Internal Server Error: database write failure
pub async fn set_provider_keys(
    State(state): State<AppState>,
    Json(payload): Json<SetProviderKeysRequest>,
) -> ApiResult<Json<SetProviderKeysResponse>> {
    if payload.plantnet_api_key.is_none() && payload.gemini_api_key.is_none() {
        return Err(ApiError::BadRequest("No provider key given".to_string()));
    }
    for key in [&payload.plantnet_api_key, &payload.gemini_api_key]
        .into_iter()
        .flatten()
    {
        if !is_valid_key(key) {
            return Err(ApiError::BadRequest(
                "API key cannot be empty or whitespace-only".to_string(),
            ));
        }
    }

    if let Some(key) = &payload.plantnet_api_key {
        crate::db::settings::set_plantnet_api_key(&state.db, key.trim().to_string())
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to save API key to database: {}", e)))?;
        info!("PlantNet API key configured via API");
    }
    if let Some(key) = &payload.gemini_api_key {
        crate::db::settings::set_gemini_api_key(&state.db, key.trim().to_string())
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to save API key to database: {}", e)))?;
        info!("Gemini API key configured via API");
    }

    let toml_config = match &state.config_path {
        Some(path) => load_toml_config(path).unwrap_or_else(|e| {
            warn!("Ignoring unreadable TOML while rebuilding providers: {}", e);
            Default::default()
        }),
        None => Default::default(),
    };
    let credentials = resolve_provider_credentials(&state.db, &toml_config).await?;
    let providers = ProviderSet::from_credentials(&credentials, &state.provider_settings)
        .map_err(|e| ApiError::Internal(format!("Failed to build providers: {}", e)))?;
    let visual_configured = providers.visual.is_some();
    let generative_configured = providers.generative.is_some();
    state.replace_providers(providers).await;

    if let Some(path) = state.config_path.clone() {
        sync_keys_to_toml(path, payload).await;
    }

    Ok(Json(SetProviderKeysResponse {
        success: true,
        message: "Provider keys configured successfully".to_string(),
        visual_configured,
        generative_configured,
    }))
}

/// Write keys into the TOML file; failures only warn
async fn sync_keys_to_toml(path: PathBuf, keys: SetProviderKeysRequest) {
    let result = tokio::task::spawn_blocking(move || {
        let mut config = load_toml_config(&path)?;
        if let Some(key) = keys.plantnet_api_key {
            config.plantnet_api_key = Some(key.trim().to_string());
        }
        if let Some(key) = keys.gemini_api_key {
            config.gemini_api_key = Some(key.trim().to_string());
        }
        write_toml_config(&config, &path).map(|()| path)
    })
    .await;

    match result {
        Ok(Ok(path)) => info!("Provider keys synced to TOML: {}", path.display()),
        Ok(Err(e)) => warn!("TOML sync failed (database write succeeded): {}", e),
        Err(e) => warn!("TOML sync task failed (database write succeeded): {}", e),
    }
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings/provider_keys", post(set_provider_keys))
}
