//! Health check endpoint
//!
//! Reports uptime, build identity, configured providers and the last
//! unexpected error.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Which providers are currently configured
#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub visual: bool,
    pub generative: bool,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("psm-ident")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Short git hash captured at build time
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    pub providers: ProviderStatus,
    /// Last error message if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();
    let orchestrator = state.orchestrator().await;
    let providers = orchestrator.providers();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "psm-ident".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        uptime_seconds,
        providers: ProviderStatus {
            visual: providers.visual.is_some(),
            generative: providers.generative.is_some(),
        },
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
