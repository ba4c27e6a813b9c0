//! Sighting persistence
//!
//! State transitions are guarded in SQL (`WHERE identification_status = ...`)
//! so that two writers can never both move the same attempt to a terminal
//! state. Functions that transition return the number of rows changed; the
//! lifecycle service turns zero into NotFound or Conflict.

use psm_common::time;
use psm_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{
    IdentificationMethod, IdentificationStatus, Location, NewSighting, Sighting, SightingEdit,
};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

const SIGHTING_COLUMNS: &str = r#"
    guid, user_id, plant_id, user_provided_name, private_notes, photo_id,
    latitude, longitude, address, identification_status, identification_method,
    confidence_score, alternative_names, created_at, updated_at
"#;

/// Insert a new sighting in `pending`
pub async fn insert_sighting(pool: &SqlitePool, new: &NewSighting) -> Result<Sighting> {
    let id = Uuid::new_v4();
    let now = time::now();
    let stamp = time::to_db(now);
    let name = non_blank(new.user_provided_name.as_deref());
    let notes = non_blank(new.private_notes.as_deref());
    let address = non_blank(new.location.address.as_deref());

    sqlx::query(
        r#"
        INSERT INTO sightings (
            guid, user_id, plant_id, user_provided_name, private_notes, photo_id,
            latitude, longitude, address, identification_status, alternative_names,
            created_at, updated_at
        ) VALUES (?, ?, NULL, ?, ?, ?, ?, ?, ?, 'pending', '[]', ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(new.user_id.to_string())
    .bind(&name)
    .bind(&notes)
    .bind(new.photo_id.trim())
    .bind(new.location.latitude)
    .bind(new.location.longitude)
    .bind(&address)
    .bind(&stamp)
    .bind(&stamp)
    .execute(pool)
    .await?;

    Ok(Sighting {
        id,
        user_id: new.user_id,
        plant_id: None,
        user_provided_name: name,
        private_notes: notes,
        photo_id: new.photo_id.trim().to_string(),
        location: Location {
            latitude: new.location.latitude,
            longitude: new.location.longitude,
            address,
        },
        identification_status: IdentificationStatus::Pending,
        identification_method: None,
        confidence_score: None,
        alternative_names: Vec::new(),
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_sighting(pool: &SqlitePool, id: Uuid) -> Result<Option<Sighting>> {
    let sql = format!("SELECT {} FROM sightings WHERE guid = ?", SIGHTING_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| sighting_from_row(&r)).transpose()
}

/// A user's sightings, newest first
pub async fn list_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Sighting>> {
    let sql = format!(
        "SELECT {} FROM sightings WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        SIGHTING_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(sighting_from_row).collect()
}

/// Re-open a sighting for a new identification attempt
///
/// Clears the previous result and stamps `attempt`. `typed_name`, when
/// given, is recorded as the user-provided name.
pub async fn reopen(pool: &SqlitePool, id: Uuid, attempt: Uuid, typed_name: Option<&str>) -> Result<u64> {
    let typed_name = non_blank(typed_name);
    let now = time::to_db(time::now());

    retry_on_lock("reopen sighting", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let done = sqlx::query(
            r#"
            UPDATE sightings SET
                identification_status = 'pending',
                plant_id = NULL,
                identification_method = NULL,
                confidence_score = NULL,
                alternative_names = '[]',
                user_provided_name = COALESCE(?, user_provided_name),
                attempt_id = ?,
                updated_at = ?
            WHERE guid = ?
            "#,
        )
        .bind(&typed_name)
        .bind(attempt.to_string())
        .bind(&now)
        .bind(id.to_string())
        .execute(pool)
        .await?;
        Ok(done.rows_affected())
    })
    .await
}

/// pending → identified
pub async fn set_identified(
    pool: &SqlitePool,
    id: Uuid,
    plant_id: Uuid,
    method: IdentificationMethod,
    confidence: Option<f64>,
) -> Result<u64> {
    let now = time::to_db(time::now());

    retry_on_lock("mark sighting identified", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let done = sqlx::query(
            r#"
            UPDATE sightings SET
                identification_status = 'identified',
                plant_id = ?,
                identification_method = ?,
                confidence_score = ?,
                alternative_names = '[]',
                updated_at = ?
            WHERE guid = ? AND identification_status = 'pending'
            "#,
        )
        .bind(plant_id.to_string())
        .bind(method.as_str())
        .bind(confidence)
        .bind(&now)
        .bind(id.to_string())
        .execute(pool)
        .await?;
        Ok(done.rows_affected())
    })
    .await
}

/// pending → failed, keeping the user-provided name
pub async fn set_failed(pool: &SqlitePool, id: Uuid, alternative_names: &[String]) -> Result<u64> {
    let alternatives = serde_json::to_string(alternative_names)?;
    let now = time::to_db(time::now());

    retry_on_lock("mark sighting failed", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let done = sqlx::query(
            r#"
            UPDATE sightings SET
                identification_status = 'failed',
                plant_id = NULL,
                identification_method = NULL,
                confidence_score = NULL,
                alternative_names = ?,
                updated_at = ?
            WHERE guid = ? AND identification_status = 'pending'
            "#,
        )
        .bind(&alternatives)
        .bind(&now)
        .bind(id.to_string())
        .execute(pool)
        .await?;
        Ok(done.rows_affected())
    })
    .await
}

/// pending → failed, but only while `attempt` still holds the sighting
///
/// Zero rows means the attempt already reached a terminal state or a newer
/// attempt has re-opened the sighting.
pub async fn abandon_attempt(pool: &SqlitePool, id: Uuid, attempt: Uuid) -> Result<u64> {
    let now = time::to_db(time::now());

    retry_on_lock("abandon identification attempt", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let done = sqlx::query(
            r#"
            UPDATE sightings SET
                identification_status = 'failed',
                plant_id = NULL,
                identification_method = NULL,
                confidence_score = NULL,
                updated_at = ?
            WHERE guid = ? AND identification_status = 'pending' AND attempt_id = ?
            "#,
        )
        .bind(&now)
        .bind(id.to_string())
        .bind(attempt.to_string())
        .execute(pool)
        .await?;
        Ok(done.rows_affected())
    })
    .await
}

/// Apply user edits; an empty string clears the field
pub async fn update_user_fields(pool: &SqlitePool, id: Uuid, edit: &SightingEdit) -> Result<u64> {
    let now = time::to_db(time::now());

    let done = sqlx::query(
        r#"
        UPDATE sightings SET
            user_provided_name = CASE WHEN ? THEN ? ELSE user_provided_name END,
            private_notes = CASE WHEN ? THEN ? ELSE private_notes END,
            updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(edit.name.is_some())
    .bind(non_blank(edit.name.as_deref()))
    .bind(edit.notes.is_some())
    .bind(non_blank(edit.notes.as_deref()))
    .bind(&now)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(done.rows_affected())
}

/// Delete a sighting and every tour stop that references it
///
/// Tours that lose a stop are renumbered in the same transaction.
pub async fn delete_sighting(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let affected_tours: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT tour_id FROM tour_stops WHERE sighting_id = ?")
            .bind(id.to_string())
            .fetch_all(&mut *tx)
            .await?;

    let stops = sqlx::query("DELETE FROM tour_stops WHERE sighting_id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM sightings WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    for (tour_id,) in &affected_tours {
        super::tours::renumber_stops(&mut *tx, tour_id).await?;
    }

    tx.commit().await?;

    if deleted.rows_affected() > 0 {
        tracing::info!(
            sighting_id = %id,
            removed_stops = stops.rows_affected(),
            "Deleted sighting"
        );
    }

    Ok(deleted.rows_affected() > 0)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn sighting_from_row(row: &SqliteRow) -> Result<Sighting> {
    let guid: String = row.try_get("guid")?;
    let user_id: String = row.try_get("user_id")?;
    let plant_id: Option<String> = row.try_get("plant_id")?;
    let status: String = row.try_get("identification_status")?;
    let method: Option<String> = row.try_get("identification_method")?;
    let alternatives: String = row.try_get("alternative_names")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let identification_status = IdentificationStatus::parse(&status).ok_or_else(|| {
        psm_common::Error::Internal(format!("Unknown identification status '{}'", status))
    })?;
    let identification_method = match method {
        Some(tag) => Some(IdentificationMethod::parse(&tag).ok_or_else(|| {
            psm_common::Error::Internal(format!("Unknown identification method '{}'", tag))
        })?),
        None => None,
    };

    Ok(Sighting {
        id: Uuid::parse_str(&guid)?,
        user_id: Uuid::parse_str(&user_id)?,
        plant_id: plant_id.as_deref().map(Uuid::parse_str).transpose()?,
        user_provided_name: row.try_get("user_provided_name")?,
        private_notes: row.try_get("private_notes")?,
        photo_id: row.try_get("photo_id")?,
        location: Location {
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            address: row.try_get("address")?,
        },
        identification_status,
        identification_method,
        confidence_score: row.try_get("confidence_score")?,
        alternative_names: serde_json::from_str(&alternatives)?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}
