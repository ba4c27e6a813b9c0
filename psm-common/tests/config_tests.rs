//! Configuration tests
//!
//! Note: Uses serial_test to prevent ENV variable race conditions.
//! Tests that manipulate PSM_ROOT_FOLDER are marked with #[serial].

use psm_common::config::{
    default_root_folder, load_toml_config, write_toml_config, RootFolderInitializer,
    RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolver = RootFolderResolver::new("test-module");
    assert_eq!(resolver.resolve(), default_root_folder());
}

#[test]
#[serial]
fn test_resolver_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/psm-test-env-folder");

    let resolver = RootFolderResolver::new("test-module")
        .with_toml_root(Some(PathBuf::from("/tmp/psm-test-toml-folder")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/psm-test-env-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_beats_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/psm-test-env-folder");

    let resolver = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/psm-test-cli-folder")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/psm-test-cli-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_uses_toml_when_env_absent() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolver = RootFolderResolver::new("test-module")
        .with_toml_root(Some(PathBuf::from("/tmp/psm-test-toml-folder")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/psm-test-toml-folder"));
}

#[test]
fn test_missing_toml_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(&temp_dir.path().join("absent.toml")).unwrap();
    assert!(config.root_folder.is_none());
    assert!(config.plantnet_api_key.is_none());
}

#[test]
fn test_malformed_toml_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "port = \"not a number").unwrap();

    assert!(load_toml_config(&path).is_err());
}

#[test]
fn test_write_then_load_keeps_credentials() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cfg").join("psm-ident.toml");

    let config = TomlConfig {
        gemini_api_key: Some("gem-key".to_string()),
        port: Some(6100),
        ..Default::default()
    };
    write_toml_config(&config, &path).unwrap();

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded.gemini_api_key.as_deref(), Some("gem-key"));
    assert_eq!(loaded.port(), 6100);
}

#[test]
fn test_initializer_creates_photo_dir() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert!(!initializer.database_exists());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert!(initializer.photos_path().is_dir());
}
