//! psm-ident - Plant Identification Microservice
//!
//! **Module Identity:**
//! - Name: psm-ident (Plant Identification)
//! - Port: 5740 (configurable)
//!
//! Identifies plant sightings by typed name or photo using a visual
//! recognition provider and a generative provider, and serves sightings,
//! plant profiles, tours and plan entitlements over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use psm_common::config::{
    default_config_path, load_toml_config, RootFolderInitializer, RootFolderResolver,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use psm_ident::config::resolve_provider_credentials;
use psm_ident::providers::ProviderSet;
use psm_ident::services::LocalPhotoStore;
use psm_ident::AppState;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(version, about = "Plant identification service")]
struct Args {
    /// Root folder holding the database and stored photos
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "PSM_IDENT_PORT")]
    port: Option<u16>,

    /// TOML bootstrap config (default: <config dir>/psm/psm-ident.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: Bootstrap config (before tracing so the TOML level applies)
    let config_path = args
        .config
        .clone()
        .or_else(|| default_config_path("psm-ident"));
    let mut toml_config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load TOML config")?,
        None => Default::default(),
    };
    if let Some(port) = args.port {
        toml_config.port = Some(port);
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(toml_config.logging.level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting psm-ident (Plant Identification) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build: {} ({}, {})",
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    // Step 2: Resolve root folder and create its layout
    let root_folder = RootFolderResolver::new("psm-ident")
        .with_cli_arg(args.root_folder)
        .with_toml_root(toml_config.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    // Step 3: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = psm_ident::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    // Step 4: Providers from resolved credentials
    let credentials = resolve_provider_credentials(&db_pool, &toml_config)
        .await
        .context("Failed to resolve provider credentials")?;
    let providers = ProviderSet::from_credentials(&credentials, &toml_config.providers)
        .context("Failed to build provider clients")?;

    // Step 5: Photo storage served under /photos
    let photos_dir = initializer.photos_path();
    let photo_store = Arc::new(LocalPhotoStore::new(
        photos_dir.clone(),
        &toml_config.public_base_url(),
    ));

    let mut state = AppState::new(
        db_pool,
        providers,
        photo_store,
        toml_config.providers.clone(),
    )
    .with_photos_dir(photos_dir);
    if let Some(path) = config_path {
        state = state.with_config_path(path);
    }

    let app = psm_ident::build_router(state);

    let port = toml_config.port();
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on http://0.0.0.0:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
