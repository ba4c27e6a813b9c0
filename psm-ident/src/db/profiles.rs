//! Plant profile repository
//!
//! One row per scientific name, enforced by a unique index on its Unicode
//! lowercased key.
//! Creation is insert-or-fetch against that index, so concurrent creators of
//! the same species always converge on a single row.

use psm_common::db::scientific_name_key;
use psm_common::time;
use psm_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{PlantProfile, PlantProfileDraft, ProfileDetails, ProfilePatch};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

const PROFILE_COLUMNS: &str = r#"
    guid, scientific_name, common_names, family, habitat, description,
    detailed_description, care_instructions, ecological_role, cultural_significance,
    growth_habits, seasonal_changes, blooming_season, light_requirements, water_needs,
    soil_preferences, native_regions, conservation_status, image_url, ai_enhanced,
    created_at, updated_at
"#;

/// Result of [`create_if_absent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateResult {
    pub id: Uuid,
    /// False when an existing profile was returned and the draft discarded
    pub created: bool,
}

/// Insert a profile for the draft's scientific name unless one exists
///
/// On a hit the existing id is returned unchanged and the draft is discarded.
pub async fn create_if_absent(pool: &SqlitePool, draft: &PlantProfileDraft) -> Result<CreateResult> {
    let scientific_name = draft.scientific_name.trim();
    if scientific_name.is_empty() {
        return Err(Error::InvalidInput("Scientific name must not be empty".to_string()));
    }
    let name_key = scientific_name_key(scientific_name);

    let common_names = serde_json::to_string(&draft.effective_common_names())?;
    let description = draft.effective_description();
    let details = draft.details.clone().normalized();
    let native_regions = serde_json::to_string(&details.native_regions.clone().unwrap_or_default())?;

    let result = retry_on_lock("create plant profile", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let candidate_id = Uuid::new_v4();
        let now = time::to_db(time::now());

        let inserted = sqlx::query(
            r#"
            INSERT INTO plant_profiles (
                guid, scientific_name, scientific_name_key, common_names, family, habitat,
                description, detailed_description, care_instructions, ecological_role,
                cultural_significance, growth_habits, seasonal_changes, blooming_season,
                light_requirements, water_needs, soil_preferences, native_regions,
                conservation_status, image_url, ai_enhanced, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(candidate_id.to_string())
        .bind(scientific_name)
        .bind(&name_key)
        .bind(&common_names)
        .bind(&draft.family)
        .bind(&details.habitat)
        .bind(&description)
        .bind(&details.detailed_description)
        .bind(&details.care_instructions)
        .bind(&details.ecological_role)
        .bind(&details.cultural_significance)
        .bind(&details.growth_habits)
        .bind(&details.seasonal_changes)
        .bind(&details.blooming_season)
        .bind(&details.light_requirements)
        .bind(&details.water_needs)
        .bind(&details.soil_preferences)
        .bind(&native_regions)
        .bind(&details.conservation_status)
        .bind(&details.image_url)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;

        if inserted.rows_affected() == 1 {
            return Ok(CreateResult { id: candidate_id, created: true });
        }

        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT guid FROM plant_profiles WHERE scientific_name_key = ?",
        )
        .bind(&name_key)
        .fetch_optional(pool)
        .await?;

        match existing {
            Some((guid,)) => Ok(CreateResult { id: Uuid::parse_str(&guid)?, created: false }),
            None => Err(Error::Internal(format!(
                "Profile insert for '{}' conflicted but no row was found",
                scientific_name
            ))),
        }
    })
    .await?;

    if result.created {
        tracing::info!(plant_id = %result.id, scientific_name, "Created plant profile");
    } else {
        tracing::debug!(plant_id = %result.id, scientific_name, "Reused existing plant profile");
    }

    Ok(result)
}

/// Load a profile by id
pub async fn get_profile(pool: &SqlitePool, id: Uuid) -> Result<Option<PlantProfile>> {
    let sql = format!("SELECT {} FROM plant_profiles WHERE guid = ?", PROFILE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| profile_from_row(&r)).transpose()
}

/// Case-insensitive substring search over scientific name, common names and family
///
/// Ordering: exact scientific name, common-name match, partial scientific
/// name, family match; ties in insertion order.
pub async fn find_by_name_or_alias(pool: &SqlitePool, term: &str) -> Result<Vec<PlantProfile>> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Err(Error::InvalidInput("Search term must not be empty".to_string()));
    }

    // SQLite lower() and NOCASE fold ASCII only, so matching happens here
    let sql = format!(
        "SELECT {}, rowid AS insertion_order FROM plant_profiles ORDER BY rowid",
        PROFILE_COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    let mut ranked = Vec::with_capacity(rows.len());
    for row in rows {
        let order: i64 = row.try_get("insertion_order")?;
        let profile = profile_from_row(&row)?;
        if let Some(rank) = match_rank(&profile, &needle) {
            ranked.push((rank, order, profile));
        }
    }
    ranked.sort_by_key(|(rank, order, _)| (*rank, *order));

    Ok(ranked.into_iter().map(|(_, _, profile)| profile).collect())
}

/// Rank of a profile for a lowercase needle, `None` when it does not match
fn match_rank(profile: &PlantProfile, needle: &str) -> Option<u8> {
    let scientific = profile.scientific_name.to_lowercase();
    if scientific == needle {
        return Some(0);
    }
    if profile
        .common_names
        .iter()
        .any(|name| name.to_lowercase().contains(needle))
    {
        return Some(1);
    }
    if scientific.contains(needle) {
        return Some(2);
    }
    if profile
        .family
        .as_deref()
        .is_some_and(|family| family.to_lowercase().contains(needle))
    {
        return Some(3);
    }
    None
}

/// Merge the fields present in `patch` into the stored profile
///
/// Absent fields are untouched. An empty patch is a no-op. Identity fields
/// cannot be patched.
pub async fn patch_fields(pool: &SqlitePool, id: Uuid, patch: &ProfilePatch) -> Result<()> {
    let details = patch.details.clone().normalized();
    let description = patch
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    let family = patch
        .family
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string);

    let effective = ProfilePatch {
        description,
        family,
        details,
        ai_enhanced: patch.ai_enhanced,
    };
    if effective.is_empty() {
        tracing::debug!(plant_id = %id, "Profile patch has no effective fields, skipping");
        return Ok(());
    }

    let native_regions = effective
        .details
        .native_regions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let now = time::to_db(time::now());

    let updated = retry_on_lock("patch plant profile", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let done = sqlx::query(
            r#"
            UPDATE plant_profiles SET
                description = COALESCE(?, description),
                family = COALESCE(?, family),
                habitat = COALESCE(?, habitat),
                detailed_description = COALESCE(?, detailed_description),
                care_instructions = COALESCE(?, care_instructions),
                ecological_role = COALESCE(?, ecological_role),
                cultural_significance = COALESCE(?, cultural_significance),
                growth_habits = COALESCE(?, growth_habits),
                seasonal_changes = COALESCE(?, seasonal_changes),
                blooming_season = COALESCE(?, blooming_season),
                light_requirements = COALESCE(?, light_requirements),
                water_needs = COALESCE(?, water_needs),
                soil_preferences = COALESCE(?, soil_preferences),
                native_regions = COALESCE(?, native_regions),
                conservation_status = COALESCE(?, conservation_status),
                image_url = COALESCE(?, image_url),
                ai_enhanced = COALESCE(?, ai_enhanced),
                updated_at = ?
            WHERE guid = ?
            "#,
        )
        .bind(&effective.description)
        .bind(&effective.family)
        .bind(&effective.details.habitat)
        .bind(&effective.details.detailed_description)
        .bind(&effective.details.care_instructions)
        .bind(&effective.details.ecological_role)
        .bind(&effective.details.cultural_significance)
        .bind(&effective.details.growth_habits)
        .bind(&effective.details.seasonal_changes)
        .bind(&effective.details.blooming_season)
        .bind(&effective.details.light_requirements)
        .bind(&effective.details.water_needs)
        .bind(&effective.details.soil_preferences)
        .bind(&native_regions)
        .bind(&effective.details.conservation_status)
        .bind(&effective.details.image_url)
        .bind(effective.ai_enhanced)
        .bind(&now)
        .bind(id.to_string())
        .execute(pool)
        .await?;
        Ok(done.rows_affected())
    })
    .await?;

    if updated == 0 {
        return Err(Error::NotFound(format!("Plant profile {}", id)));
    }

    tracing::debug!(plant_id = %id, "Patched plant profile");
    Ok(())
}

fn profile_from_row(row: &SqliteRow) -> Result<PlantProfile> {
    let guid: String = row.try_get("guid")?;
    let common_names: String = row.try_get("common_names")?;
    let native_regions: String = row.try_get("native_regions")?;
    let native_regions: Vec<String> = serde_json::from_str(&native_regions)?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(PlantProfile {
        id: Uuid::parse_str(&guid)?,
        scientific_name: row.try_get("scientific_name")?,
        common_names: serde_json::from_str(&common_names)?,
        family: row.try_get("family")?,
        description: row.try_get("description")?,
        details: ProfileDetails {
            habitat: row.try_get("habitat")?,
            detailed_description: row.try_get("detailed_description")?,
            care_instructions: row.try_get("care_instructions")?,
            ecological_role: row.try_get("ecological_role")?,
            cultural_significance: row.try_get("cultural_significance")?,
            growth_habits: row.try_get("growth_habits")?,
            seasonal_changes: row.try_get("seasonal_changes")?,
            blooming_season: row.try_get("blooming_season")?,
            light_requirements: row.try_get("light_requirements")?,
            water_needs: row.try_get("water_needs")?,
            soil_preferences: row.try_get("soil_preferences")?,
            native_regions: Some(native_regions).filter(|r| !r.is_empty()),
            conservation_status: row.try_get("conservation_status")?,
            image_url: row.try_get("image_url")?,
        },
        ai_enhanced: row.try_get::<i64, _>("ai_enhanced")? != 0,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use psm_common::db::init_memory_database;

    fn draft(name: &str, common: &[&str], family: Option<&str>) -> PlantProfileDraft {
        let mut draft = PlantProfileDraft::new(name);
        draft.common_names = common.iter().map(|s| s.to_string()).collect();
        draft.family = family.map(str::to_string);
        draft
    }

    #[tokio::test]
    async fn test_create_if_absent_is_idempotent() {
        let pool = init_memory_database().await.unwrap();

        let first = create_if_absent(&pool, &draft("Quercus alba", &["White oak"], None))
            .await
            .unwrap();
        let mut second_draft = draft("quercus ALBA", &["Other"], Some("Fagaceae"));
        second_draft.description = Some("Different".to_string());
        let second = create_if_absent(&pool, &second_draft).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);

        let stored = get_profile(&pool, first.id).await.unwrap().unwrap();
        assert_eq!(stored.common_names, vec!["White oak".to_string()]);
        assert!(stored.family.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let pool = init_memory_database().await.unwrap();
        let err = create_if_absent(&pool, &PlantProfileDraft::new("  ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_search_ordering() {
        let pool = init_memory_database().await.unwrap();
        // Family match inserted first, exact match last
        create_if_absent(&pool, &draft("Malus domestica", &["Apple"], Some("Rosaceae")))
            .await
            .unwrap();
        create_if_absent(&pool, &draft("Rosa canina", &["Dog rose"], Some("Rosaceae")))
            .await
            .unwrap();
        create_if_absent(&pool, &draft("Rosmarinus officinalis", &["Rosemary"], Some("Lamiaceae")))
            .await
            .unwrap();
        create_if_absent(&pool, &draft("Rosa", &["Rose"], Some("Rosaceae")))
            .await
            .unwrap();

        let names: Vec<String> = find_by_name_or_alias(&pool, "ROSA")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.scientific_name)
            .collect();

        assert_eq!(
            names,
            vec![
                "Rosa".to_string(),
                "Rosa canina".to_string(),
                "Malus domestica".to_string(),
            ]
        );

        let by_common = find_by_name_or_alias(&pool, "rosemary").await.unwrap();
        assert_eq!(by_common.len(), 1);
        assert_eq!(by_common[0].scientific_name, "Rosmarinus officinalis");
    }

    #[tokio::test]
    async fn test_search_rejects_empty_term() {
        let pool = init_memory_database().await.unwrap();
        assert!(find_by_name_or_alias(&pool, "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let pool = init_memory_database().await.unwrap();
        create_if_absent(&pool, &draft("Picea mariana", &["Épinette noire"], Some("Pinaceae")))
            .await
            .unwrap();
        create_if_absent(&pool, &draft("Ärtemisia vulgaris", &["Mugwort"], Some("Asteraceae")))
            .await
            .unwrap();

        let by_common = find_by_name_or_alias(&pool, "épinette").await.unwrap();
        assert_eq!(by_common.len(), 1);
        assert_eq!(by_common[0].scientific_name, "Picea mariana");

        let by_scientific = find_by_name_or_alias(&pool, "ärtemisia VULGARIS").await.unwrap();
        assert_eq!(by_scientific.len(), 1);
        assert_eq!(by_scientific[0].scientific_name, "Ärtemisia vulgaris");
    }

    #[tokio::test]
    async fn test_create_if_absent_folds_non_ascii_case() {
        let pool = init_memory_database().await.unwrap();

        let first = create_if_absent(&pool, &draft("Ärtemisia test", &[], None)).await.unwrap();
        let second = create_if_absent(&pool, &draft("ärtemisia TEST", &[], None)).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_patch_merges_and_keeps_identity() {
        let pool = init_memory_database().await.unwrap();
        let mut initial = draft("Ficus lyrata", &["Fiddle-leaf fig"], Some("Moraceae"));
        initial.details.habitat = Some("Rainforest".to_string());
        let created = create_if_absent(&pool, &initial).await.unwrap();

        let patch = ProfilePatch {
            description: Some("Broad-leaved fig.".to_string()),
            details: ProfileDetails {
                care_instructions: Some("Bright indirect light".to_string()),
                native_regions: Some(vec!["West Africa".to_string()]),
                ..Default::default()
            },
            ai_enhanced: Some(true),
            ..Default::default()
        };
        patch_fields(&pool, created.id, &patch).await.unwrap();

        let stored = get_profile(&pool, created.id).await.unwrap().unwrap();
        assert_eq!(stored.scientific_name, "Ficus lyrata");
        assert_eq!(stored.common_names, vec!["Fiddle-leaf fig".to_string()]);
        assert_eq!(stored.description, "Broad-leaved fig.");
        assert_eq!(stored.details.habitat.as_deref(), Some("Rainforest"));
        assert_eq!(stored.details.care_instructions.as_deref(), Some("Bright indirect light"));
        assert_eq!(stored.details.native_regions, Some(vec!["West Africa".to_string()]));
        assert!(stored.ai_enhanced);
    }

    #[tokio::test]
    async fn test_empty_patch_is_noop() {
        let pool = init_memory_database().await.unwrap();
        // Unknown id with nothing to apply is still fine
        patch_fields(&pool, Uuid::new_v4(), &ProfilePatch::default()).await.unwrap();

        let blank = ProfilePatch {
            description: Some("   ".to_string()),
            ..Default::default()
        };
        patch_fields(&pool, Uuid::new_v4(), &blank).await.unwrap();
    }

    #[tokio::test]
    async fn test_patch_unknown_profile_is_not_found() {
        let pool = init_memory_database().await.unwrap();
        let patch = ProfilePatch {
            ai_enhanced: Some(true),
            ..Default::default()
        };
        let err = patch_fields(&pool, Uuid::new_v4(), &patch).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
