//! readlab-api - study data collection service
//!
//! Serves the reading-comprehension study pipeline over HTTP: session
//! lifecycle, deterministic randomization, passage/question serving, MCQ
//! grading, post-task ratings, the vocabulary task, and telemetry.

use anyhow::{anyhow, Result};
use axum::http::HeaderValue;
use clap::Parser;
use readlab_common::config::{ConfigOverrides, StorageBackend, StudyConfig};
use readlab_common::content::{lint_catalog, Catalog};
use readlab_common::store::{MemoryStore, SqliteStore, StudyStore};
use readlab_api::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "readlab-api", version, about = "Reading study backend")]
struct Cli {
    /// Listen address (host:port)
    #[arg(long)]
    bind: Option<String>,

    /// Session store backend: memory or sqlite
    #[arg(long)]
    storage: Option<String>,

    /// SQLite database path (used with --storage sqlite)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Content catalog TOML; omit to serve the built-in sample catalog
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Config file path (default: readlab.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting readlab-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = Cli::parse();
    let config = StudyConfig::resolve(&ConfigOverrides {
        bind_addr: cli.bind,
        storage: cli.storage,
        database_path: cli.database,
        catalog_path: cli.catalog,
        config_file: cli.config,
    })?;

    let catalog = match &config.catalog_path {
        Some(path) => {
            info!("Loading catalog from {}", path.display());
            Catalog::load(path)?
        }
        None => {
            info!("No catalog configured; serving the built-in sample catalog");
            Catalog::sample()
        }
    };

    // Lint gate: errors abort startup, warnings are logged and tolerated
    let report = lint_catalog(&catalog);
    for warning in &report.warnings {
        warn!("Catalog lint: {}", warning);
    }
    if !report.is_clean() {
        for error in &report.errors {
            tracing::error!("Catalog lint: {}", error);
        }
        return Err(anyhow!(
            "Catalog failed lint with {} error(s)",
            report.errors.len()
        ));
    }
    info!(
        "Catalog loaded: {} passages, {} vocabulary items",
        catalog.passages.len(),
        catalog.vocab.len()
    );

    info!("Session store: {}", config.storage.as_str());
    let store: Arc<dyn StudyStore> = match config.storage {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Sqlite => {
            info!("Database path: {}", config.database_path.display());
            Arc::new(SqliteStore::connect(&config.database_path).await?)
        }
    };

    let mut origins = Vec::new();
    for origin in &config.allowed_origins {
        match origin.parse::<HeaderValue>() {
            Ok(value) => origins.push(value),
            Err(_) => warn!("Ignoring unparseable CORS origin: {}", origin),
        }
    }
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let state = AppState::new(store, Arc::new(catalog));
    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("readlab-api listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/api/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
