//! MediLingua REST API server binary.
//!
//! ## Purpose
//! Runs the history REST API with OpenAPI/Swagger UI.
//!
//! Configuration is resolved once from the environment at startup and passed
//! into the core services; no environment reads happen during request
//! handling.
//!
//! # Environment Variables
//! - `MEDILINGUA_REST_ADDR`: server address (default: "0.0.0.0:3000")
//! - `HISTORY_DATA_DIR`: directory for history storage (default:
//!   "./history_data", created if absent)
//! - `MEDILINGUA_API_SECRET`: shared secret for bearer credentials (required)
//! - `MEDILINGUA_LIST_LIMIT`: cap on listed entries (default: 50)
//! - `MEDILINGUA_STORAGE_TIMEOUT_SECS`: bound on any storage operation
//!   (default: 5)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medilingua_core::{
    config::{DEFAULT_LIST_LIMIT, DEFAULT_STORAGE_TIMEOUT},
    CoreConfig, FileHistoryStore, HistoryService, SharedSecretUserContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("medilingua_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("MEDILINGUA_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let history_data_dir = PathBuf::from(
        std::env::var("HISTORY_DATA_DIR").unwrap_or_else(|_| "./history_data".into()),
    );
    std::fs::create_dir_all(&history_data_dir)?;

    let secret = std::env::var("MEDILINGUA_API_SECRET")
        .map_err(|_| anyhow::anyhow!("MEDILINGUA_API_SECRET must be set"))?;

    let list_limit = match std::env::var("MEDILINGUA_LIST_LIMIT") {
        Ok(value) => value.parse::<usize>()?,
        Err(_) => DEFAULT_LIST_LIMIT,
    };
    let storage_timeout = match std::env::var("MEDILINGUA_STORAGE_TIMEOUT_SECS") {
        Ok(value) => Duration::from_secs(value.parse::<u64>()?),
        Err(_) => DEFAULT_STORAGE_TIMEOUT,
    };

    let cfg = Arc::new(CoreConfig::new(history_data_dir, list_limit, storage_timeout)?);
    let store = Arc::new(FileHistoryStore::new(cfg.clone()));
    let users = Arc::new(SharedSecretUserContext::new(secret)?);
    let service = Arc::new(HistoryService::new(cfg, store, users));

    let app = api_rest::build_router(service);

    tracing::info!("-- Starting MediLingua REST API on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
