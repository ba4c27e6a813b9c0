//! Identification orchestrator
//!
//! Drives the provider clients, the plant profile repository and the
//! sighting lifecycle to resolve an identification:
//! - [`by_name`]: local match → verbatim profile (no generative provider) →
//!   generative validation with clarification
//! - [`by_photo`]: ordered [`PhotoStrategy`] list, first success wins
//! - [`enhancement`]: enrich an existing profile
//!
//! Expected failures come back as data ([`IdentificationOutcome`]). Errors
//! and panics inside a flow are caught at the flow boundary, and a sighting
//! is never left `pending` when a flow returns.

pub mod by_name;
pub mod by_photo;
pub mod enhancement;

pub use by_photo::PhotoStrategy;
pub use enhancement::EnhancementOutcome;

use futures::FutureExt;
use psm_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use uuid::Uuid;

use super::photo_store::PhotoStore;
use super::sighting_lifecycle::SightingLifecycle;
use crate::db;
use crate::models::{IdentificationMethod, PlantProfile, PlantProfileDraft};
use crate::providers::ProviderSet;

const GENERIC_FAILURE: &str = "Plant identification service temporarily unavailable.";

/// Why an identification did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rejected before any side effect
    InvalidInput,
    /// No provider configured for the requested operation
    NotConfigured,
    /// Transport failure, rate limit, timeout or malformed reply
    ProviderUnavailable,
    /// Providers ran but found nothing usable
    NoMatch,
    /// Sighting or profile does not exist
    NotFound,
    /// Stored photo could not be resolved or read
    PhotoUnavailable,
    /// Unexpected error caught at the flow boundary
    Internal,
}

/// Result of an identification flow
#[derive(Debug, Clone, PartialEq)]
pub enum IdentificationOutcome {
    Identified {
        plant_id: Uuid,
        profile: PlantProfile,
        method: IdentificationMethod,
        confidence: Option<f64>,
    },
    NeedsClarification {
        suggestions: Vec<String>,
        message: String,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

impl IdentificationOutcome {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        IdentificationOutcome::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, IdentificationOutcome::Identified { .. })
    }
}

pub struct IdentificationOrchestrator {
    db: SqlitePool,
    lifecycle: SightingLifecycle,
    providers: ProviderSet,
    photos: Arc<dyn PhotoStore>,
}

impl IdentificationOrchestrator {
    pub fn new(db: SqlitePool, providers: ProviderSet, photos: Arc<dyn PhotoStore>) -> Self {
        Self {
            lifecycle: SightingLifecycle::new(db.clone()),
            db,
            providers,
            photos,
        }
    }

    /// Same storage and photos, different providers (credential hot-swap)
    pub fn with_providers(&self, providers: ProviderSet) -> Self {
        Self::new(self.db.clone(), providers, self.photos.clone())
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    pub fn lifecycle(&self) -> &SightingLifecycle {
        &self.lifecycle
    }

    /// Store (or reuse) the profile and bind the sighting to it
    async fn bind_new_profile(
        &self,
        sighting_id: Uuid,
        draft: &PlantProfileDraft,
        method: IdentificationMethod,
        confidence: Option<f64>,
    ) -> Result<IdentificationOutcome> {
        let created = db::profiles::create_if_absent(&self.db, draft).await?;
        self.bind_existing_profile(sighting_id, created.id, method, confidence)
            .await
    }

    async fn bind_existing_profile(
        &self,
        sighting_id: Uuid,
        plant_id: Uuid,
        method: IdentificationMethod,
        confidence: Option<f64>,
    ) -> Result<IdentificationOutcome> {
        self.lifecycle
            .mark_identified(sighting_id, plant_id, method, confidence)
            .await?;
        let profile = db::profiles::get_profile(&self.db, plant_id)
            .await?
            .ok_or_else(|| psm_common::Error::NotFound(format!("Plant profile {}", plant_id)))?;

        Ok(IdentificationOutcome::Identified {
            plant_id,
            profile,
            method,
            confidence,
        })
    }

    /// Mark the attempt failed and build the matching outcome
    async fn fail(
        &self,
        sighting_id: Uuid,
        alternative_names: &[String],
        outcome: IdentificationOutcome,
    ) -> Result<IdentificationOutcome> {
        self.lifecycle
            .mark_failed(sighting_id, alternative_names)
            .await?;
        Ok(outcome)
    }

    /// Open an attempt and run a flow in it, converting errors and panics
    /// into a failed outcome and forcing the attempt out of `pending`
    async fn run_guarded<F>(
        &self,
        sighting_id: Uuid,
        flow: &'static str,
        typed_name: Option<&str>,
        body: F,
    ) -> IdentificationOutcome
    where
        F: Future<Output = Result<IdentificationOutcome>>,
    {
        let attempt = match self.lifecycle.begin_attempt(sighting_id, typed_name).await {
            Ok(attempt) => attempt,
            Err(psm_common::Error::NotFound(_)) => {
                return IdentificationOutcome::failed(FailureKind::NotFound, "Sighting not found.");
            }
            Err(err) => {
                tracing::error!(sighting_id = %sighting_id, flow, error = %err, "Could not open identification attempt");
                return IdentificationOutcome::failed(FailureKind::Internal, GENERIC_FAILURE);
            }
        };

        let outcome = match AssertUnwindSafe(body).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                tracing::error!(sighting_id = %sighting_id, flow, error = %err, "Identification flow failed");
                IdentificationOutcome::failed(FailureKind::Internal, GENERIC_FAILURE)
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(sighting_id = %sighting_id, flow, panic = %detail, "Identification flow panicked");
                IdentificationOutcome::failed(FailureKind::Internal, GENERIC_FAILURE)
            }
        };

        self.ensure_terminal(sighting_id, attempt, outcome).await
    }

    /// Only this flow's own attempt is forced to failed; a sighting already
    /// re-opened by a newer attempt belongs to that attempt
    async fn ensure_terminal(
        &self,
        sighting_id: Uuid,
        attempt: Uuid,
        outcome: IdentificationOutcome,
    ) -> IdentificationOutcome {
        match self.lifecycle.abandon_attempt(sighting_id, attempt).await {
            // Identified without a stored transition is not a success
            Ok(true) if outcome.is_success() => {
                IdentificationOutcome::failed(FailureKind::Internal, GENERIC_FAILURE)
            }
            Ok(_) => outcome,
            Err(err) => {
                tracing::error!(sighting_id = %sighting_id, error = %err, "Could not force sighting to failed");
                outcome
            }
        }
    }
}
