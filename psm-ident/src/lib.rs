//! psm-ident library interface
//!
//! Plant identification service: sightings, plant profiles, provider-backed
//! identification and plan entitlements. Exposed as a library so that the
//! HTTP surface and the orchestrator can be exercised from integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod providers;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use psm_common::config::ProviderSettings;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::providers::ProviderSet;
use crate::services::{IdentificationOrchestrator, PhotoStore, SightingLifecycle};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Current orchestrator; replaced when provider credentials change
    orchestrator: Arc<RwLock<Arc<IdentificationOrchestrator>>>,
    /// Stored photo collaborator
    pub photo_store: Arc<dyn PhotoStore>,
    /// Endpoint and timeout settings used when providers are rebuilt
    pub provider_settings: ProviderSettings,
    /// Directory served under `/photos` (local photo store only)
    pub photos_dir: Option<PathBuf>,
    /// TOML file that receives credential backups, if any
    pub config_path: Option<PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        providers: ProviderSet,
        photo_store: Arc<dyn PhotoStore>,
        provider_settings: ProviderSettings,
    ) -> Self {
        let orchestrator = IdentificationOrchestrator::new(db.clone(), providers, photo_store.clone());
        Self {
            db,
            orchestrator: Arc::new(RwLock::new(Arc::new(orchestrator))),
            photo_store,
            provider_settings,
            photos_dir: None,
            config_path: None,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_photos_dir(mut self, dir: PathBuf) -> Self {
        self.photos_dir = Some(dir);
        self
    }

    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Snapshot of the orchestrator; in-flight flows keep the one they started with
    pub async fn orchestrator(&self) -> Arc<IdentificationOrchestrator> {
        self.orchestrator.read().await.clone()
    }

    /// Swap in a new provider set for subsequent requests
    pub async fn replace_providers(&self, providers: ProviderSet) {
        let mut current = self.orchestrator.write().await;
        let next = current.with_providers(providers);
        *current = Arc::new(next);
    }

    pub fn lifecycle(&self) -> SightingLifecycle {
        SightingLifecycle::new(self.db.clone())
    }

    /// Remember the latest unexpected failure for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let photos_dir = state.photos_dir.clone();

    let mut router = Router::new()
        .merge(api::health_routes())
        .merge(api::user_routes())
        .merge(api::photo_routes())
        .merge(api::sighting_routes())
        .merge(api::identification_routes())
        .merge(api::profile_routes())
        .merge(api::tour_routes())
        .merge(api::settings_routes())
        .with_state(state);

    if let Some(dir) = photos_dir {
        router = router.nest_service("/photos", ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
