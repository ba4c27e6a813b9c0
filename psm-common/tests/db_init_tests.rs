//! Database initialization tests
//!
//! Covers first-run creation, reopening, and the schema-level integrity
//! rules the identification workflow relies on.

use psm_common::db::init::{init_database, init_memory_database, scientific_name_key};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn insert_user(pool: &SqlitePool, guid: &str) {
    sqlx::query("INSERT INTO users (guid, email, name, created_at) VALUES (?, ?, 'Tester', '2024-01-01T00:00:00.000Z')")
        .bind(guid)
        .bind(format!("{}@example.org", guid))
        .execute(pool)
        .await
        .unwrap();
}

async fn insert_profile(pool: &SqlitePool, guid: &str, scientific_name: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO plant_profiles (guid, scientific_name, scientific_name_key, created_at, updated_at) VALUES (?, ?, ?, '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z')",
    )
    .bind(guid)
    .bind(scientific_name)
    .bind(scientific_name_key(scientific_name))
    .execute(pool)
    .await
    .map(|_| ())
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("psm.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("psm.db");

    let pool1 = init_database(&db_path).await.unwrap();
    insert_user(&pool1, "u-1").await;
    pool1.close().await;

    // Second open keeps existing data
    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = init_memory_database().await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in [
        "identification_usage",
        "plant_profiles",
        "settings",
        "sightings",
        "tour_stops",
        "tours",
        "users",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_scientific_name_unique_ignoring_case() {
    let pool = init_memory_database().await.unwrap();

    insert_profile(&pool, "p-1", "Quercus alba").await.unwrap();
    let duplicate = insert_profile(&pool, "p-2", "quercus ALBA").await;

    assert!(duplicate.is_err(), "second profile with same scientific name must be rejected");
}

#[tokio::test]
async fn test_scientific_name_unique_ignoring_non_ascii_case() {
    let pool = init_memory_database().await.unwrap();

    insert_profile(&pool, "p-1", "Ärtemisia test").await.unwrap();
    let duplicate = insert_profile(&pool, "p-2", "ärtemisia TEST").await;

    assert!(duplicate.is_err(), "case variants differing only in non-ASCII letters must collide");
}

#[tokio::test]
async fn test_name_key_backfilled_on_older_database() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("psm.db");

    let legacy = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true),
    )
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE plant_profiles (guid TEXT PRIMARY KEY, scientific_name TEXT NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL)",
    )
    .execute(&legacy)
    .await
    .unwrap();
    sqlx::query("INSERT INTO plant_profiles VALUES ('p-1', 'Épilobium Angustifolium', '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z')")
        .execute(&legacy)
        .await
        .unwrap();
    legacy.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let key: String = sqlx::query_scalar("SELECT scientific_name_key FROM plant_profiles WHERE guid = 'p-1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(key, "épilobium angustifolium");

    let duplicate = insert_profile(&pool, "p-2", "ÉPILOBIUM angustifolium").await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_identified_sighting_requires_plant() {
    let pool = init_memory_database().await.unwrap();
    insert_user(&pool, "u-1").await;

    let result = sqlx::query(
        r#"INSERT INTO sightings (guid, user_id, photo_id, latitude, longitude,
               identification_status, created_at, updated_at)
           VALUES ('s-1', 'u-1', 'photo.jpg', 10.0, 20.0, 'identified', 'x', 'x')"#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "identified status without plant_id must violate the schema");
}

#[tokio::test]
async fn test_deleting_sighting_cascades_to_stops() {
    let pool = init_memory_database().await.unwrap();
    insert_user(&pool, "u-1").await;

    sqlx::query(
        r#"INSERT INTO sightings (guid, user_id, photo_id, latitude, longitude, created_at, updated_at)
           VALUES ('s-1', 'u-1', 'photo.jpg', 10.0, 20.0, 'x', 'x')"#,
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO tours (guid, user_id, name, created_at) VALUES ('t-1', 'u-1', 'Walk', 'x')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO tour_stops (guid, tour_id, sighting_id, stop_order, created_at) VALUES ('ts-1', 't-1', 's-1', 0, 'x')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query("DELETE FROM sightings WHERE guid = 's-1'")
        .execute(&pool)
        .await
        .unwrap();

    let stops: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tour_stops")
        .fetch_one(&pool)
        .await
        .unwrap();
    let tours: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tours")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stops, 0);
    assert_eq!(tours, 1);
}
