mod audit;
mod cache;
mod config;
mod content;
mod db;
mod errors;
mod export;
mod headers;
mod hubspot;
mod models;
mod reconcile;
mod routes;
mod sheets;
mod state;
mod syncback;
mod value;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::audit::AuditLogger;
use crate::cache::TtlCache;
use crate::config::Config;
use crate::db::create_pool;
use crate::hubspot::HubSpotClient;
use crate::routes::build_router;
use crate::sheets::SheetsClient;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("hubsync_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hubsync API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Vendor clients
    let hubspot = Arc::new(HubSpotClient::new(config.hubspot_token.clone()));
    let sheets = Arc::new(SheetsClient::new(config.google_access_token.clone()));
    info!("HubSpot and Google Sheets clients initialized");

    // In-process TTL cache for discovery results and poll hashes
    let cache = Arc::new(TtlCache::new(Duration::from_secs(config.cache_ttl_secs)));

    // Audit writer task
    let audit = AuditLogger::spawn(db.clone());

    let state = AppState {
        db,
        hubspot,
        sheets,
        cache,
        audit,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
