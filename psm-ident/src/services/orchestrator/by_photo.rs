//! By-photo identification
//!
//! Strategies are tried in the order returned by
//! [`IdentificationOrchestrator::photo_strategies`]; the first success
//! binds the sighting. Any strategy failure (rate limit, timeout, malformed
//! reply, no match) moves on to the next one.

use psm_common::Result;
use uuid::Uuid;

use super::by_name::log_provider_failure;
use super::{FailureKind, IdentificationOrchestrator, IdentificationOutcome, GENERIC_FAILURE};
use crate::models::IdentificationMethod;
use crate::providers::{IdentifiedPlant, ImagePayload, ProviderError};

const PHOTO_UNAVAILABLE: &str = "Could not access uploaded image.";
const NO_MATCH: &str =
    "Could not identify plant automatically. Please try manual identification or take a clearer photo.";
const NOT_CONFIGURED: &str =
    "Photo identification is not configured. Please identify the plant by name.";

/// One way of turning a photo into a species
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoStrategy {
    /// Visual-recognition provider, enhanced by the generative provider when available
    Visual,
    /// Generative provider reading the image directly
    GenerativeImage,
}

impl PhotoStrategy {
    pub fn method(&self) -> IdentificationMethod {
        match self {
            PhotoStrategy::Visual => IdentificationMethod::VisualProvider,
            PhotoStrategy::GenerativeImage => IdentificationMethod::GenerativeProvider,
        }
    }
}

impl IdentificationOrchestrator {
    /// Strategies available with the configured providers, in priority order
    pub fn photo_strategies(&self) -> Vec<PhotoStrategy> {
        let mut strategies = Vec::with_capacity(2);
        if self.providers.visual.is_some() {
            strategies.push(PhotoStrategy::Visual);
        }
        if self
            .providers
            .generative
            .as_ref()
            .is_some_and(|g| g.supports_image_identification())
        {
            strategies.push(PhotoStrategy::GenerativeImage);
        }
        strategies
    }

    /// Identify a sighting from its stored photo
    pub async fn identify_by_photo(&self, sighting_id: Uuid, photo_ref: &str) -> IdentificationOutcome {
        let photo_ref = photo_ref.trim();
        if photo_ref.is_empty() {
            return IdentificationOutcome::failed(FailureKind::InvalidInput, "A photo is required.");
        }

        match self.lifecycle.get(sighting_id).await {
            Ok(_) => {}
            Err(psm_common::Error::NotFound(_)) => {
                return IdentificationOutcome::failed(FailureKind::NotFound, "Sighting not found.");
            }
            Err(err) => {
                tracing::error!(sighting_id = %sighting_id, error = %err, "Sighting lookup failed");
                return IdentificationOutcome::failed(FailureKind::Internal, GENERIC_FAILURE);
            }
        }

        tracing::info!(sighting_id = %sighting_id, photo_ref, "Identify by photo");
        self.run_guarded(
            sighting_id,
            "identify_by_photo",
            None,
            self.by_photo_flow(sighting_id, photo_ref),
        )
        .await
    }

    async fn by_photo_flow(&self, sighting_id: Uuid, photo_ref: &str) -> Result<IdentificationOutcome> {
        if self.photos.resolve_url(photo_ref).await.is_none() {
            tracing::warn!(sighting_id = %sighting_id, photo_ref, "Photo reference does not resolve");
            return self
                .fail(sighting_id, &[], IdentificationOutcome::failed(FailureKind::PhotoUnavailable, PHOTO_UNAVAILABLE))
                .await;
        }

        let image = match self.photos.fetch(photo_ref).await {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(sighting_id = %sighting_id, photo_ref, error = %err, "Photo could not be read");
                return self
                    .fail(sighting_id, &[], IdentificationOutcome::failed(FailureKind::PhotoUnavailable, PHOTO_UNAVAILABLE))
                    .await;
            }
        };

        let strategies = self.photo_strategies();
        if strategies.is_empty() {
            tracing::info!(sighting_id = %sighting_id, "No photo identification provider configured");
            return self
                .fail(sighting_id, &[], IdentificationOutcome::failed(FailureKind::NotConfigured, NOT_CONFIGURED))
                .await;
        }

        let mut saw_no_match = false;
        for strategy in strategies {
            match self.attempt_strategy(strategy, &image).await {
                Ok(identified) => {
                    tracing::info!(
                        sighting_id = %sighting_id,
                        strategy = ?strategy,
                        scientific_name = %identified.draft.scientific_name,
                        confidence = identified.confidence,
                        "Photo identified"
                    );
                    return self
                        .bind_new_profile(
                            sighting_id,
                            &identified.draft,
                            strategy.method(),
                            Some(identified.confidence.clamp(0.0, 1.0)),
                        )
                        .await;
                }
                Err((provider, err)) => {
                    log_provider_failure(provider, sighting_id, &err);
                    saw_no_match |= err == ProviderError::NoMatch;
                }
            }
        }

        let outcome = if saw_no_match {
            IdentificationOutcome::failed(FailureKind::NoMatch, NO_MATCH)
        } else {
            IdentificationOutcome::failed(FailureKind::ProviderUnavailable, GENERIC_FAILURE)
        };
        self.fail(sighting_id, &[], outcome).await
    }

    async fn attempt_strategy(
        &self,
        strategy: PhotoStrategy,
        image: &ImagePayload,
    ) -> std::result::Result<IdentifiedPlant, (&'static str, ProviderError)> {
        match strategy {
            PhotoStrategy::Visual => {
                let Some(visual) = self.providers.visual.as_ref() else {
                    return Err(("visual", ProviderError::NotConfigured));
                };
                let identified = visual
                    .identify(image)
                    .await
                    .map_err(|err| (visual.name(), err))?;
                Ok(self.enhance_best_effort(identified).await)
            }
            PhotoStrategy::GenerativeImage => {
                let Some(generative) = self.providers.generative.as_ref() else {
                    return Err(("generative", ProviderError::NotConfigured));
                };
                generative
                    .identify_image(image)
                    .await
                    .map_err(|err| (generative.name(), err))
            }
        }
    }

    /// Enrich a visual match; enhancement failure keeps the plain draft
    async fn enhance_best_effort(&self, identified: IdentifiedPlant) -> IdentifiedPlant {
        let Some(generative) = self.providers.generative.as_ref() else {
            return identified;
        };

        match generative
            .enhance(&identified.draft.scientific_name, &identified.draft.common_names)
            .await
        {
            Ok(patch) => IdentifiedPlant {
                draft: identified.draft.enhanced_with(patch),
                confidence: identified.confidence,
            },
            Err(err) => {
                tracing::warn!(
                    provider = generative.name(),
                    scientific_name = %identified.draft.scientific_name,
                    kind = err.kind(),
                    "Enhancement failed, keeping visual result"
                );
                identified
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_methods() {
        assert_eq!(PhotoStrategy::Visual.method(), IdentificationMethod::VisualProvider);
        assert_eq!(
            PhotoStrategy::GenerativeImage.method(),
            IdentificationMethod::GenerativeProvider
        );
    }
}
