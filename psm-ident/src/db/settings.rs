//! Settings database operations
//!
//! Key-value accessors over the `settings` table. Provider credentials set
//! through the API are stored here and take precedence over the environment
//! and the TOML file.

use psm_common::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Settings key for the visual provider credential
pub const PLANTNET_API_KEY: &str = "plantnet_api_key";

/// Settings key for the generative provider credential
pub const GEMINI_API_KEY: &str = "gemini_api_key";

pub async fn get_plantnet_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, PLANTNET_API_KEY).await
}

pub async fn set_plantnet_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, PLANTNET_API_KEY, key).await
}

pub async fn get_gemini_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, GEMINI_API_KEY).await
}

pub async fn set_gemini_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, GEMINI_API_KEY, key).await
}

/// Remove a setting (e.g. to un-configure a provider)
pub async fn clear_setting(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(db)
        .await
        .map_err(Error::Database)?;
    Ok(())
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((Some(value),)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting failed: {}", e)))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
