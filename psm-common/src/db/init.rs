//! Database initialization
//!
//! Opens (creating on first run) the shared SQLite database and applies the
//! schema. Every statement is idempotent, so this runs on each startup.
//!
//! Integrity rules that the identification workflow depends on are enforced
//! by the schema itself rather than by callers:
//! - one plant profile per scientific name (unique index on a Unicode
//!   lowercased key, see [`scientific_name_key`])
//! - `plant_id` present exactly when a sighting is `identified`
//! - tour stops disappear with their sighting or tour (`ON DELETE CASCADE`)

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas set through connect options apply to every pooled connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(250));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema (single connection)
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_users_table(pool).await?;
    create_plant_profiles_table(pool).await?;
    create_sightings_table(pool).await?;
    create_tours_table(pool).await?;
    create_tour_stops_table(pool).await?;
    create_identification_usage_table(pool).await?;

    tracing::debug!("Database schema ensured");
    Ok(())
}

/// Key-value settings (runtime configuration such as provider credentials)
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            name TEXT NOT NULL,
            subscription_plan TEXT NOT NULL DEFAULT 'free'
                CHECK (subscription_plan IN ('free', 'pro', 'premium')),
            subscription_status TEXT NOT NULL DEFAULT 'active'
                CHECK (subscription_status IN ('active', 'cancelled', 'expired')),
            subscription_end_date TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_plant_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plant_profiles (
            guid TEXT PRIMARY KEY,
            scientific_name TEXT NOT NULL,
            scientific_name_key TEXT NOT NULL,
            common_names TEXT NOT NULL DEFAULT '[]',
            family TEXT,
            habitat TEXT,
            description TEXT NOT NULL DEFAULT '',
            detailed_description TEXT,
            care_instructions TEXT,
            ecological_role TEXT,
            cultural_significance TEXT,
            growth_habits TEXT,
            seasonal_changes TEXT,
            blooming_season TEXT,
            light_requirements TEXT,
            water_needs TEXT,
            soil_preferences TEXT,
            native_regions TEXT NOT NULL DEFAULT '[]',
            conservation_status TEXT,
            image_url TEXT,
            ai_enhanced INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    backfill_scientific_name_keys(pool).await?;

    // SQLite NOCASE folds ASCII only; the key column carries full Unicode folding
    sqlx::query("DROP INDEX IF EXISTS idx_plant_profiles_scientific_name")
        .execute(pool)
        .await?;
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_plant_profiles_scientific_name_key
        ON plant_profiles (scientific_name_key)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Uniqueness key for a scientific name: trimmed, Unicode lowercased
pub fn scientific_name_key(scientific_name: &str) -> String {
    scientific_name.trim().to_lowercase()
}

/// Add and fill `scientific_name_key` on databases created before the column existed
async fn backfill_scientific_name_keys(pool: &SqlitePool) -> Result<()> {
    add_column_if_missing(pool, "plant_profiles", "scientific_name_key", "TEXT NOT NULL DEFAULT ''").await?;

    let stale: Vec<(String, String)> =
        sqlx::query_as("SELECT guid, scientific_name FROM plant_profiles WHERE scientific_name_key = ''")
            .fetch_all(pool)
            .await?;

    for (guid, scientific_name) in &stale {
        sqlx::query("UPDATE plant_profiles SET scientific_name_key = ? WHERE guid = ?")
            .bind(scientific_name_key(scientific_name))
            .bind(guid)
            .execute(pool)
            .await?;
    }

    if !stale.is_empty() {
        info!(rows = stale.len(), "Backfilled plant profile name keys");
    }

    Ok(())
}

/// `ALTER TABLE ... ADD COLUMN` for databases created by an older schema
async fn add_column_if_missing(pool: &SqlitePool, table: &str, column: &str, decl: &str) -> Result<()> {
    let has_column: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;

    if has_column == 0 {
        sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl))
            .execute(pool)
            .await?;
        info!(table, column, "Added missing column");
    }
    Ok(())
}

async fn create_sightings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sightings (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            plant_id TEXT REFERENCES plant_profiles(guid),
            user_provided_name TEXT,
            private_notes TEXT,
            photo_id TEXT NOT NULL,
            latitude REAL NOT NULL CHECK (latitude BETWEEN -90.0 AND 90.0),
            longitude REAL NOT NULL CHECK (longitude BETWEEN -180.0 AND 180.0),
            address TEXT,
            identification_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (identification_status IN ('pending', 'identified', 'failed')),
            identification_method TEXT
                CHECK (identification_method IN ('plantnet', 'gemini', 'manual')),
            confidence_score REAL
                CHECK (confidence_score BETWEEN 0.0 AND 1.0),
            alternative_names TEXT NOT NULL DEFAULT '[]',
            attempt_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK ((identification_status = 'identified') = (plant_id IS NOT NULL)),
            CHECK (identification_method IS NULL OR identification_status <> 'pending')
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Token of the identification attempt currently holding the sighting
    add_column_if_missing(pool, "sightings", "attempt_id", "TEXT").await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sightings_user ON sightings (user_id, created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sightings_plant ON sightings (plant_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_tours_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tours (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            is_public INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tours_user ON tours (user_id, is_public)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_tour_stops_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tour_stops (
            guid TEXT PRIMARY KEY,
            tour_id TEXT NOT NULL REFERENCES tours(guid) ON DELETE CASCADE,
            sighting_id TEXT NOT NULL REFERENCES sightings(guid) ON DELETE CASCADE,
            stop_order INTEGER NOT NULL,
            custom_notes TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tour_stops_tour ON tour_stops (tour_id, stop_order)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tour_stops_sighting ON tour_stops (sighting_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_identification_usage_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS identification_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            method TEXT NOT NULL CHECK (method IN ('name', 'photo')),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_identification_usage_user ON identification_usage (user_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
