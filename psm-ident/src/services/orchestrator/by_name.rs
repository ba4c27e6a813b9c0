//! By-name identification
//!
//! Order of resolution:
//! 1. Existing profile matching the typed name (no provider call)
//! 2. No generative provider: verbatim minimal profile
//! 3. Generative validation: valid → profile; otherwise suggestions

use psm_common::Result;
use uuid::Uuid;

use super::{FailureKind, IdentificationOrchestrator, IdentificationOutcome};
use crate::db;
use crate::models::{IdentificationMethod, PlantProfileDraft};
use crate::providers::{NameValidation, ProviderError};

const CLARIFICATION_MESSAGE: &str = "Did you mean one of these plants?";

impl IdentificationOrchestrator {
    /// Identify a sighting from a user-typed plant name
    ///
    /// An empty name is rejected without touching the sighting. Every other
    /// path leaves the sighting `identified` or `failed`.
    pub async fn identify_by_name(&self, sighting_id: Uuid, typed_name: &str) -> IdentificationOutcome {
        let name = typed_name.trim();
        if name.is_empty() {
            return IdentificationOutcome::failed(
                FailureKind::InvalidInput,
                "Please enter a plant name.",
            );
        }

        match self.lifecycle.get(sighting_id).await {
            Ok(_) => {}
            Err(psm_common::Error::NotFound(_)) => {
                return IdentificationOutcome::failed(FailureKind::NotFound, "Sighting not found.");
            }
            Err(err) => {
                tracing::error!(sighting_id = %sighting_id, error = %err, "Sighting lookup failed");
                return IdentificationOutcome::failed(FailureKind::Internal, super::GENERIC_FAILURE);
            }
        }

        tracing::info!(sighting_id = %sighting_id, typed_name = name, "Identify by name");
        self.run_guarded(
            sighting_id,
            "identify_by_name",
            Some(name),
            self.by_name_flow(sighting_id, name),
        )
        .await
    }

    async fn by_name_flow(&self, sighting_id: Uuid, name: &str) -> Result<IdentificationOutcome> {
        let matches = db::profiles::find_by_name_or_alias(&self.db, name).await?;
        if let Some(existing) = matches.first() {
            tracing::info!(
                sighting_id = %sighting_id,
                plant_id = %existing.id,
                candidates = matches.len(),
                "Local profile match, skipping providers"
            );
            return self
                .bind_existing_profile(sighting_id, existing.id, IdentificationMethod::Manual, None)
                .await;
        }

        let Some(generative) = self.providers.generative.clone() else {
            tracing::info!(sighting_id = %sighting_id, "No generative provider, storing typed name verbatim");
            let draft = PlantProfileDraft::from_typed_name(name);
            return self
                .bind_new_profile(sighting_id, &draft, IdentificationMethod::Manual, None)
                .await;
        };

        match generative.validate_and_describe(name).await {
            Ok(NameValidation::Valid(draft)) => {
                self.bind_new_profile(sighting_id, &draft, IdentificationMethod::Manual, None)
                    .await
            }
            Ok(NameValidation::NeedsClarification { suggestions }) if suggestions.is_empty() => {
                tracing::info!(sighting_id = %sighting_id, "Name not recognized, no suggestions");
                let message = format!(
                    "Could not recognize \"{}\" as a plant name. Please check the spelling or try a different name.",
                    name
                );
                self.fail(sighting_id, &[], IdentificationOutcome::failed(FailureKind::NoMatch, message))
                    .await
            }
            Ok(NameValidation::NeedsClarification { suggestions }) => {
                tracing::info!(
                    sighting_id = %sighting_id,
                    suggestions = suggestions.len(),
                    "Name needs clarification"
                );
                let outcome = IdentificationOutcome::NeedsClarification {
                    suggestions: suggestions.clone(),
                    message: CLARIFICATION_MESSAGE.to_string(),
                };
                self.fail(sighting_id, &suggestions, outcome).await
            }
            Err(err) => {
                log_provider_failure(generative.name(), sighting_id, &err);
                self.fail(
                    sighting_id,
                    &[],
                    IdentificationOutcome::failed(FailureKind::ProviderUnavailable, super::GENERIC_FAILURE),
                )
                .await
            }
        }
    }
}

/// RateLimited and NoMatch are routine; everything else is worth a warning
pub(super) fn log_provider_failure(provider: &str, sighting_id: Uuid, err: &ProviderError) {
    match err {
        ProviderError::RateLimited | ProviderError::NoMatch | ProviderError::NotConfigured => {
            tracing::info!(sighting_id = %sighting_id, provider, kind = err.kind(), "Provider returned no result")
        }
        _ => {
            tracing::warn!(sighting_id = %sighting_id, provider, kind = err.kind(), error = %err, "Provider call failed")
        }
    }
}
