//! Sighting lifecycle manager
//!
//! Owns every write to a sighting's identification state:
//! ```text
//!   create ──► PENDING ──┬──► IDENTIFIED (plant_id, method, confidence)
//!                ▲       └──► FAILED     (alternative names)
//!                └──── begin_attempt (re-open for retry / re-identify)
//! ```
//! Terminal transitions only apply to a pending sighting, so each attempt
//! reaches exactly one terminal state.

use psm_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::models::{IdentificationMethod, IdentificationStatus, NewSighting, Sighting, SightingEdit};

#[derive(Debug, Clone)]
pub struct SightingLifecycle {
    db: SqlitePool,
}

impl SightingLifecycle {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a sighting in `pending`
    pub async fn create(&self, new: &NewSighting) -> Result<Sighting> {
        new.location.validate().map_err(Error::InvalidInput)?;
        if new.photo_id.trim().is_empty() {
            return Err(Error::InvalidInput("A photo is required".to_string()));
        }
        if db::users::get_user(&self.db, new.user_id).await?.is_none() {
            return Err(Error::NotFound(format!("User {}", new.user_id)));
        }

        let sighting = db::sightings::insert_sighting(&self.db, new).await?;
        tracing::info!(sighting_id = %sighting.id, user_id = %sighting.user_id, "Created sighting");
        Ok(sighting)
    }

    pub async fn get(&self, id: Uuid) -> Result<Sighting> {
        db::sightings::get_sighting(&self.db, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Sighting {}", id)))
    }

    /// Re-open for a new attempt, recording the typed name if any
    ///
    /// Returns the attempt token. The latest attempt owns the sighting.
    pub async fn begin_attempt(&self, id: Uuid, typed_name: Option<&str>) -> Result<Uuid> {
        let attempt = Uuid::new_v4();
        if db::sightings::reopen(&self.db, id, attempt, typed_name).await? == 0 {
            return Err(Error::NotFound(format!("Sighting {}", id)));
        }
        tracing::debug!(sighting_id = %id, attempt = %attempt, "Identification attempt started");
        Ok(attempt)
    }

    /// pending → identified
    pub async fn mark_identified(
        &self,
        id: Uuid,
        plant_id: Uuid,
        method: IdentificationMethod,
        confidence: Option<f64>,
    ) -> Result<()> {
        if let Some(score) = confidence {
            if !(0.0..=1.0).contains(&score) {
                return Err(Error::InvalidInput(format!(
                    "Confidence score out of range: {}",
                    score
                )));
            }
        }
        if db::profiles::get_profile(&self.db, plant_id).await?.is_none() {
            return Err(Error::InvalidInput(format!(
                "Unknown plant profile {}",
                plant_id
            )));
        }

        let changed =
            db::sightings::set_identified(&self.db, id, plant_id, method, confidence).await?;
        if changed == 0 {
            return Err(self.transition_error(id, "identified").await);
        }

        tracing::info!(
            sighting_id = %id,
            plant_id = %plant_id,
            method = method.as_str(),
            confidence,
            "Sighting identified"
        );
        Ok(())
    }

    /// pending → failed; the user-provided name is kept
    pub async fn mark_failed(&self, id: Uuid, alternative_names: &[String]) -> Result<()> {
        if db::sightings::set_failed(&self.db, id, alternative_names).await? == 0 {
            return Err(self.transition_error(id, "failed").await);
        }
        tracing::info!(
            sighting_id = %id,
            suggestions = alternative_names.len(),
            "Sighting identification failed"
        );
        Ok(())
    }

    /// Edit name/notes in any state without touching identification
    pub async fn edit_user_fields(&self, id: Uuid, edit: &SightingEdit) -> Result<Sighting> {
        if !edit.is_empty() && db::sightings::update_user_fields(&self.db, id, edit).await? == 0 {
            return Err(Error::NotFound(format!("Sighting {}", id)));
        }
        self.get(id).await
    }

    /// Delete the sighting and the tour stops that reference it
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !db::sightings::delete_sighting(&self.db, id).await? {
            return Err(Error::NotFound(format!("Sighting {}", id)));
        }
        Ok(())
    }

    async fn transition_error(&self, id: Uuid, target: &str) -> Error {
        match db::sightings::get_sighting(&self.db, id).await {
            Ok(Some(sighting)) => Error::Conflict(format!(
                "Sighting {} is {}, cannot mark {}",
                id,
                sighting.identification_status.as_str(),
                target
            )),
            Ok(None) => Error::NotFound(format!("Sighting {}", id)),
            Err(e) => e,
        }
    }

    /// Force `attempt` to failed if it is still the open attempt
    ///
    /// True when this call made the transition. A sighting re-opened by a
    /// newer attempt is left alone.
    pub async fn abandon_attempt(&self, id: Uuid, attempt: Uuid) -> Result<bool> {
        let forced = db::sightings::abandon_attempt(&self.db, id, attempt).await? > 0;
        if forced {
            tracing::warn!(sighting_id = %id, attempt = %attempt, "Forced unfinished attempt to failed");
        }
        Ok(forced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Location, NewUser, PlantProfileDraft};
    use psm_common::db::init_memory_database;

    async fn setup() -> (SightingLifecycle, SqlitePool, Uuid) {
        let pool = init_memory_database().await.unwrap();
        let (user, _) = db::users::create_user(&pool, &NewUser::free("d@example.org", "D"))
            .await
            .unwrap();
        (SightingLifecycle::new(pool.clone()), pool, user.id)
    }

    fn new_sighting(user_id: Uuid) -> NewSighting {
        NewSighting {
            user_id,
            photo_id: "photo.jpg".to_string(),
            location: Location {
                latitude: 48.85,
                longitude: 2.35,
                address: Some("Paris".to_string()),
            },
            user_provided_name: None,
            private_notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let (lifecycle, _, user_id) = setup().await;
        let sighting = lifecycle.create(&new_sighting(user_id)).await.unwrap();

        assert_eq!(sighting.identification_status, IdentificationStatus::Pending);
        assert!(sighting.plant_id.is_none());
        assert!(sighting.identification_method.is_none());
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let (lifecycle, _, user_id) = setup().await;

        let mut bad = new_sighting(user_id);
        bad.location.latitude = 123.0;
        assert!(matches!(lifecycle.create(&bad).await, Err(Error::InvalidInput(_))));

        let mut no_photo = new_sighting(user_id);
        no_photo.photo_id = " ".to_string();
        assert!(matches!(lifecycle.create(&no_photo).await, Err(Error::InvalidInput(_))));

        let unknown_user = new_sighting(Uuid::new_v4());
        assert!(matches!(lifecycle.create(&unknown_user).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_identified_requires_existing_profile() {
        let (lifecycle, _, user_id) = setup().await;
        let sighting = lifecycle.create(&new_sighting(user_id)).await.unwrap();

        let err = lifecycle
            .mark_identified(sighting.id, Uuid::new_v4(), IdentificationMethod::Manual, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(
            lifecycle.get(sighting.id).await.unwrap().identification_status,
            IdentificationStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_terminal_transition_happens_once_per_attempt() {
        let (lifecycle, pool, user_id) = setup().await;
        let sighting = lifecycle.create(&new_sighting(user_id)).await.unwrap();
        let plant = db::profiles::create_if_absent(&pool, &PlantProfileDraft::new("Rosa canina"))
            .await
            .unwrap();

        lifecycle
            .mark_identified(sighting.id, plant.id, IdentificationMethod::VisualProvider, Some(0.9))
            .await
            .unwrap();

        let again = lifecycle.mark_failed(sighting.id, &[]).await.unwrap_err();
        assert!(matches!(again, Error::Conflict(_)));

        let stored = lifecycle.get(sighting.id).await.unwrap();
        assert_eq!(stored.identification_status, IdentificationStatus::Identified);
        assert_eq!(stored.plant_id, Some(plant.id));
        assert_eq!(stored.identification_method, Some(IdentificationMethod::VisualProvider));
        assert_eq!(stored.confidence_score, Some(0.9));
    }

    #[tokio::test]
    async fn test_reopen_clears_previous_result_and_keeps_name_on_failure() {
        let (lifecycle, pool, user_id) = setup().await;
        let sighting = lifecycle.create(&new_sighting(user_id)).await.unwrap();
        let plant = db::profiles::create_if_absent(&pool, &PlantProfileDraft::new("Rosa canina"))
            .await
            .unwrap();
        lifecycle
            .mark_identified(sighting.id, plant.id, IdentificationMethod::Manual, None)
            .await
            .unwrap();

        lifecycle.begin_attempt(sighting.id, Some("Rosa rubigonosa")).await.unwrap();
        let reopened = lifecycle.get(sighting.id).await.unwrap();
        assert_eq!(reopened.identification_status, IdentificationStatus::Pending);
        assert!(reopened.plant_id.is_none());

        let suggestions = vec!["Rosa rubiginosa".to_string()];
        lifecycle.mark_failed(sighting.id, &suggestions).await.unwrap();

        let failed = lifecycle.get(sighting.id).await.unwrap();
        assert_eq!(failed.identification_status, IdentificationStatus::Failed);
        assert_eq!(failed.user_provided_name.as_deref(), Some("Rosa rubigonosa"));
        assert_eq!(failed.alternative_names, suggestions);
        assert!(failed.identification_method.is_none());
    }

    #[tokio::test]
    async fn test_abandon_only_touches_own_attempt() {
        let (lifecycle, pool, user_id) = setup().await;
        let sighting = lifecycle.create(&new_sighting(user_id)).await.unwrap();
        let plant = db::profiles::create_if_absent(&pool, &PlantProfileDraft::new("Rosa canina"))
            .await
            .unwrap();

        let first = lifecycle.begin_attempt(sighting.id, None).await.unwrap();
        let second = lifecycle.begin_attempt(sighting.id, None).await.unwrap();
        assert_ne!(first, second);

        // Superseded attempt cannot fail the newer one
        assert!(!lifecycle.abandon_attempt(sighting.id, first).await.unwrap());
        assert_eq!(
            lifecycle.get(sighting.id).await.unwrap().identification_status,
            IdentificationStatus::Pending
        );

        lifecycle
            .mark_identified(sighting.id, plant.id, IdentificationMethod::Manual, None)
            .await
            .unwrap();
        assert!(!lifecycle.abandon_attempt(sighting.id, second).await.unwrap());

        let third = lifecycle.begin_attempt(sighting.id, None).await.unwrap();
        assert!(lifecycle.abandon_attempt(sighting.id, third).await.unwrap());
        assert_eq!(
            lifecycle.get(sighting.id).await.unwrap().identification_status,
            IdentificationStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_edit_does_not_touch_status() {
        let (lifecycle, _, user_id) = setup().await;
        let sighting = lifecycle.create(&new_sighting(user_id)).await.unwrap();
        lifecycle.mark_failed(sighting.id, &[]).await.unwrap();

        let edited = lifecycle
            .edit_user_fields(
                sighting.id,
                &SightingEdit {
                    name: Some("My rose".to_string()),
                    notes: Some("By the gate".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.user_provided_name.as_deref(), Some("My rose"));
        assert_eq!(edited.private_notes.as_deref(), Some("By the gate"));
        assert_eq!(edited.identification_status, IdentificationStatus::Failed);

        let cleared = lifecycle
            .edit_user_fields(
                sighting.id,
                &SightingEdit {
                    name: None,
                    notes: Some(String::new()),
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.user_provided_name.as_deref(), Some("My rose"));
        assert!(cleared.private_notes.is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (lifecycle, _, _) = setup().await;
        assert!(matches!(lifecycle.delete(Uuid::new_v4()).await, Err(Error::NotFound(_))));
    }
}
