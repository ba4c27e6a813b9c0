//! Bootstrap configuration and root folder resolution
//!
//! Bootstrap settings come from a small TOML file. Everything the service
//! can change at runtime (provider credentials set through the API) lives in
//! the database `settings` table instead.
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. `PSM_ROOT_FOLDER` environment variable
//! 3. TOML config file `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "PSM_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "psm.db";

/// Photo directory name inside the root folder
pub const PHOTOS_DIR: &str = "photos";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Root folder holding the database and stored photos
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port (default 5740)
    #[serde(default)]
    pub port: Option<u16>,

    /// Base URL clients use to reach this service (photo URLs are built from it)
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Visual-recognition provider credential
    #[serde(default)]
    pub plantnet_api_key: Option<String>,

    /// Generative-text provider credential
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    /// Provider endpoint and timeout tuning
    #[serde(default)]
    pub providers: ProviderSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Provider endpoint, timeout and throttling settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderSettings {
    /// Total request timeout per provider call (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Visual provider base URL
    #[serde(default = "default_plantnet_base_url")]
    pub plantnet_base_url: String,

    /// Visual provider flora project
    #[serde(default = "default_plantnet_project")]
    pub plantnet_project: String,

    /// Generative provider base URL
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    /// Generative provider model name
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Total attempts for retryable generative provider failures
    #[serde(default = "default_gemini_max_attempts")]
    pub gemini_max_attempts: u32,

    /// Local throttle per provider client
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            plantnet_base_url: default_plantnet_base_url(),
            plantnet_project: default_plantnet_project(),
            gemini_base_url: default_gemini_base_url(),
            gemini_model: default_gemini_model(),
            gemini_max_attempts: default_gemini_max_attempts(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_plantnet_base_url() -> String {
    "https://my-api.plantnet.org/v1".to_string()
}

fn default_plantnet_project() -> String {
    "weurope".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}

fn default_gemini_max_attempts() -> u32 {
    2
}

fn default_requests_per_second() -> u32 {
    5
}

/// Default HTTP port for psm-ident
pub const DEFAULT_PORT: u16 = 5740;

impl TomlConfig {
    /// Effective port
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Effective public base URL (no trailing slash)
    pub fn public_base_url(&self) -> String {
        self.public_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.port()))
    }
}

/// Default TOML location for a module: `<config_dir>/psm/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("psm").join(format!("{}.toml", module_name)))
}

/// Load TOML config with graceful degradation
///
/// A missing file yields defaults; a malformed file is an error so that a
/// typo does not silently drop credentials.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write TOML config (used when settings are persisted back)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    // Write to a sibling temp file then rename so readers never see a partial file
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Standard user agent for outbound HTTP
pub fn get_user_agent() -> String {
    format!("PSM/{} (plant-sightings-mapper)", env!("CARGO_PKG_VERSION"))
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    /// Command-line override (highest priority)
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Root folder from the TOML config (below the environment)
    pub fn with_toml_root(mut self, path: Option<PathBuf>) -> Self {
        self.toml_root = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!(module = %self.module_name, "Root folder from TOML config: {}", path.display());
            return path.clone();
        }

        let default = default_root_folder();
        info!(module = %self.module_name, "Root folder from compiled default: {}", default.display());
        default
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("psm"))
        .unwrap_or_else(|| PathBuf::from("./psm_data"))
}

/// Creates the root folder layout on first run
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create root and photo directories if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
        }
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.photos_path())?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn photos_path(&self) -> PathBuf {
        self.root_folder.join(PHOTOS_DIR)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}
