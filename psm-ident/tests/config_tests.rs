//! Provider credential resolution (Database → ENV → TOML)
//!
//! Tests touching process environment run serially.

use psm_common::config::{load_toml_config, write_toml_config, TomlConfig};
use psm_ident::config::{
    resolve_provider_credentials, ProviderCredentials, GEMINI_API_KEY_ENV, PLANTNET_API_KEY_ENV,
};
use psm_ident::db;
use serial_test::serial;
use tempfile::TempDir;

fn clear_env() {
    std::env::remove_var(PLANTNET_API_KEY_ENV);
    std::env::remove_var(GEMINI_API_KEY_ENV);
}

#[tokio::test]
#[serial]
async fn test_absent_everywhere_means_not_configured() {
    clear_env();
    let pool = db::init_memory_database().await.unwrap();

    let creds = resolve_provider_credentials(&pool, &TomlConfig::default())
        .await
        .unwrap();

    assert_eq!(creds, ProviderCredentials::default());
}

#[tokio::test]
#[serial]
async fn test_database_beats_environment_beats_toml() {
    clear_env();
    let pool = db::init_memory_database().await.unwrap();
    let toml = TomlConfig {
        plantnet_api_key: Some("toml-plantnet".to_string()),
        gemini_api_key: Some("toml-gemini".to_string()),
        ..Default::default()
    };

    let creds = resolve_provider_credentials(&pool, &toml).await.unwrap();
    assert_eq!(creds.plantnet_api_key.as_deref(), Some("toml-plantnet"));
    assert_eq!(creds.gemini_api_key.as_deref(), Some("toml-gemini"));

    std::env::set_var(GEMINI_API_KEY_ENV, "env-gemini");
    let creds = resolve_provider_credentials(&pool, &toml).await.unwrap();
    assert_eq!(creds.gemini_api_key.as_deref(), Some("env-gemini"));
    assert_eq!(creds.plantnet_api_key.as_deref(), Some("toml-plantnet"));

    db::settings::set_gemini_api_key(&pool, "db-gemini".to_string())
        .await
        .unwrap();
    let creds = resolve_provider_credentials(&pool, &toml).await.unwrap();
    assert_eq!(creds.gemini_api_key.as_deref(), Some("db-gemini"));

    clear_env();
}

#[tokio::test]
#[serial]
async fn test_whitespace_keys_are_ignored() {
    clear_env();
    std::env::set_var(PLANTNET_API_KEY_ENV, "   ");
    let pool = db::init_memory_database().await.unwrap();
    db::settings::set_gemini_api_key(&pool, "\t".to_string())
        .await
        .unwrap();

    let creds = resolve_provider_credentials(&pool, &TomlConfig::default())
        .await
        .unwrap();

    assert_eq!(creds.plantnet_api_key, None);
    assert_eq!(creds.gemini_api_key, None);
    clear_env();
}

#[test]
fn test_toml_round_trip_keeps_keys_and_provider_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("psm").join("psm-ident.toml");

    let mut config = TomlConfig {
        port: Some(6001),
        gemini_api_key: Some("g-key".to_string()),
        ..Default::default()
    };
    config.providers.timeout_secs = 9;
    write_toml_config(&config, &path).unwrap();

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded.port(), 6001);
    assert_eq!(loaded.gemini_api_key.as_deref(), Some("g-key"));
    assert_eq!(loaded.providers.timeout_secs, 9);
    assert_eq!(loaded.providers.plantnet_project, "weurope");
}

#[test]
fn test_malformed_toml_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    assert!(load_toml_config(&path).is_err());
}
