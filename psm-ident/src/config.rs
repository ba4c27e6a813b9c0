//! Provider credential resolution for psm-ident
//!
//! Each credential resolves with Database → ENV → TOML priority. An absent
//! credential is not an error: the matching provider is simply not
//! configured and the orchestrator takes its reduced-capability path.

use psm_common::config::TomlConfig;
use psm_common::Result;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::db::settings;

/// Environment variable for the visual provider credential
pub const PLANTNET_API_KEY_ENV: &str = "PLANTNET_API_KEY";

/// Environment variable for the generative provider credential
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Credentials handed to provider constructors
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub plantnet_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("plantnet_api_key", &self.plantnet_api_key.as_ref().map(|_| "<set>"))
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// Resolve both provider credentials
pub async fn resolve_provider_credentials(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<ProviderCredentials> {
    Ok(ProviderCredentials {
        plantnet_api_key: resolve_plantnet_api_key(db, toml_config).await?,
        gemini_api_key: resolve_gemini_api_key(db, toml_config).await?,
    })
}

/// Resolve the visual provider key (Database → ENV → TOML)
pub async fn resolve_plantnet_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_key = settings::get_plantnet_api_key(db).await?;
    let env_key = std::env::var(PLANTNET_API_KEY_ENV).ok();
    Ok(pick_key(
        "PlantNet",
        db_key,
        env_key,
        toml_config.plantnet_api_key.clone(),
    ))
}

/// Resolve the generative provider key (Database → ENV → TOML)
pub async fn resolve_gemini_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_key = settings::get_gemini_api_key(db).await?;
    let env_key = std::env::var(GEMINI_API_KEY_ENV).ok();
    Ok(pick_key(
        "Gemini",
        db_key,
        env_key,
        toml_config.gemini_api_key.clone(),
    ))
}

fn pick_key(
    provider: &str,
    db_key: Option<String>,
    env_key: Option<String>,
    toml_key: Option<String>,
) -> Option<String> {
    let candidates = [
        ("database", db_key),
        ("environment", env_key),
        ("TOML", toml_key),
    ];

    let valid: Vec<(&str, String)> = candidates
        .into_iter()
        .filter_map(|(source, key)| key.filter(|k| is_valid_key(k)).map(|k| (source, k)))
        .collect();

    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(source, _)| *source).collect();
        warn!(
            "{} API key found in multiple sources: {}. Using {} (highest priority).",
            provider,
            sources.join(", "),
            sources[0]
        );
    }

    match valid.into_iter().next() {
        Some((source, key)) => {
            info!("{} API key loaded from {}", provider, source);
            Some(key.trim().to_string())
        }
        None => {
            info!("{} API key not configured, provider disabled", provider);
            None
        }
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
