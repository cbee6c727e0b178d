//! Distribution Ledger - Backend Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use distribution_ledger_backend::{
    config::{Config, StorageBackend},
    create_app, AppState, MemoryStore, PgStore, Store,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dl_server=debug,distribution_ledger_backend=debug,tower_http=debug,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Distribution Ledger Server");
    tracing::info!("Environment: {}", config.environment);

    let store = connect_store(&config).await?;
    tracing::info!("Using {} store", store.name());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = create_app(AppState::new(store, config));

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match config.database.backend {
        StorageBackend::Memory => {
            tracing::warn!("In-memory store selected; state is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
                .connect(&config.database.url)
                .await?;
            tracing::info!("Database connection established");

            // Run migrations in development
            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&pool).await?;
                tracing::info!("Migrations completed");
            }

            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}
