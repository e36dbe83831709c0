use std::sync::Arc;

use anyhow::Context;
use moovelabs_api::config::{self, Environment};
use moovelabs_api::database::{seed_catalog, MemoryStore, PgStore, Store};
use moovelabs_api::workflow::N8nClient;
use moovelabs_api::{app, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    tracing::info!("Starting MooveLabs API in {:?} mode", config.environment);

    let store = open_store().await?;
    let engine = Arc::new(N8nClient::new(&config.workflow));
    let app = app(AppState::new(store, engine));

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("MooveLabs API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Postgres when DATABASE_URL is set; otherwise a seeded in-memory store,
/// which production refuses.
async fn open_store() -> anyhow::Result<Arc<dyn Store>> {
    let config = config::config();

    match &config.database.url {
        Some(url) => {
            let store = PgStore::connect(url, &config.database).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None if config.environment == Environment::Production => {
            anyhow::bail!("DATABASE_URL is required in production")
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
            let report = seed_catalog(store.clone()).await?;
            tracing::info!(plans = report.plans, templates = report.templates, "Seeded catalog");
            Ok(store)
        }
    }
}
