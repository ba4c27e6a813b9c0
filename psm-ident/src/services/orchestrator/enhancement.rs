//! Profile enhancement
//!
//! Merges generative descriptive content into an existing profile. Identity
//! fields (scientific name, common names) are never part of the patch.

use uuid::Uuid;

use super::{FailureKind, IdentificationOrchestrator};
use crate::db;
use crate::models::PlantProfile;
use crate::providers::ProviderError;

/// Result of [`IdentificationOrchestrator::enhance_profile`]
#[derive(Debug, Clone, PartialEq)]
pub enum EnhancementOutcome {
    Enhanced { profile: PlantProfile },
    Failed { kind: FailureKind, message: String },
}

impl EnhancementOutcome {
    fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        EnhancementOutcome::Failed {
            kind,
            message: message.into(),
        }
    }
}

impl IdentificationOrchestrator {
    /// Enrich a stored profile with generative content
    ///
    /// Nothing is written unless the provider returns usable fields.
    pub async fn enhance_profile(&self, plant_id: Uuid) -> EnhancementOutcome {
        let Some(generative) = self.providers.generative.clone() else {
            return EnhancementOutcome::failed(
                FailureKind::NotConfigured,
                "Profile enhancement requires a configured generative provider.",
            );
        };

        let profile = match db::profiles::get_profile(&self.db, plant_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                return EnhancementOutcome::failed(FailureKind::NotFound, "Plant profile not found.")
            }
            Err(err) => {
                tracing::error!(plant_id = %plant_id, error = %err, "Profile lookup failed");
                return EnhancementOutcome::failed(FailureKind::Internal, super::GENERIC_FAILURE);
            }
        };

        let mut patch = match generative
            .enhance(&profile.scientific_name, &profile.common_names)
            .await
        {
            Ok(patch) => patch,
            Err(err) => {
                let kind = match err {
                    ProviderError::NotConfigured => FailureKind::NotConfigured,
                    ProviderError::NoMatch => FailureKind::NoMatch,
                    _ => FailureKind::ProviderUnavailable,
                };
                tracing::warn!(
                    plant_id = %plant_id,
                    provider = generative.name(),
                    kind = err.kind(),
                    "Enhancement failed, profile unchanged"
                );
                return EnhancementOutcome::failed(kind, "Could not enhance plant profile right now.");
            }
        };

        // Family is taxonomy, only filled when missing
        if profile.family.is_some() {
            patch.family = None;
        }
        patch.ai_enhanced = Some(true);

        if let Err(err) = db::profiles::patch_fields(&self.db, plant_id, &patch).await {
            tracing::error!(plant_id = %plant_id, error = %err, "Storing enhancement failed");
            return EnhancementOutcome::failed(FailureKind::Internal, super::GENERIC_FAILURE);
        }

        match db::profiles::get_profile(&self.db, plant_id).await {
            Ok(Some(profile)) => {
                tracing::info!(plant_id = %plant_id, "Profile enhanced");
                EnhancementOutcome::Enhanced { profile }
            }
            Ok(None) => EnhancementOutcome::failed(FailureKind::NotFound, "Plant profile not found."),
            Err(err) => {
                tracing::error!(plant_id = %plant_id, error = %err, "Profile reload failed");
                EnhancementOutcome::failed(FailureKind::Internal, super::GENERIC_FAILURE)
            }
        }
    }
}
