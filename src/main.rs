//! snapify server binary.
//!
//! Reads configuration from the environment (and `.env` when present),
//! opens the document store (SQLite when `DATABASE_URL` is set, memory
//! otherwise), wires the Shopify token exchanger and the durable log sink,
//! and serves the HTTP routes until Ctrl+C or SIGTERM.

use std::sync::Arc;

use snapify::auth::oauth::ShopifyTokenExchanger;
use snapify::diagnostics::{StoreLogSink, LOGS_COLLECTION};
use snapify::install::Installer;
use snapify::products::ProductSync;
use snapify::server::{self, AppState};
use snapify::store::{DocumentStore, MemoryStore, ShopRepository, SqliteStore};
use snapify::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log events kept when running without a database.
const MEMORY_LOG_CAPACITY: usize = 10_000;

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "snapify=info,tower_http=info".into());

    // Structured output for log collectors, text locally
    let is_json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let json_layer = is_json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!is_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    init_tracing();

    let config = Arc::new(AppConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?);
    if config.credentials().is_err() {
        tracing::warn!("App credentials missing; install routes will answer 500");
    }

    let store: Arc<dyn DocumentStore> = match config.database_url() {
        Some(url) => {
            let store = SqliteStore::connect(url).await.inspect_err(|e| {
                tracing::error!(error = %e, "Failed to open document store");
            })?;
            tracing::info!("Using SQLite document store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; shop records and logs are lost on restart");
            Arc::new(MemoryStore::new().with_max_documents(LOGS_COLLECTION, MEMORY_LOG_CAPACITY))
        }
    };
    let shops = ShopRepository::new(Arc::clone(&store));
    let log = Arc::new(StoreLogSink::new(Arc::clone(&store)));
    let exchanger = Arc::new(ShopifyTokenExchanger::new(Arc::clone(&config))?);

    let installer = Installer::new(Arc::clone(&config), shops.clone(), exchanger, log.clone());
    let products = ProductSync::new(Arc::clone(&config), shops, log);
    let app = server::router(AppState::new(installer, products));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    server::serve(listener, app).await?;

    tracing::info!("Server stopped");
    Ok(())
}
