//! Stock ledger server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stock_ledger_backend::{
    config::{Config, StoreBackend},
    create_app,
    store::{MemoryStore, PgStore},
    AppError, AppState,
};

const DEFAULT_LOG_FILTER: &str =
    "stock_ledger_server=debug,stock_ledger_backend=debug,tower_http=debug,sqlx=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting stock ledger server");
    tracing::info!("Environment: {}", config.environment);

    let state = match config.store.backend {
        StoreBackend::Postgres => {
            if config.database.url.is_empty() {
                return Err(AppError::Configuration(
                    "database.url is required for the postgres store".to_string(),
                )
                .into());
            }

            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&config.database.url)
                .await?;
            tracing::info!("Database connection established");

            let store = Arc::new(PgStore::new(db_pool));

            // Run migrations in development
            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                store.migrate().await?;
                tracing::info!("Migrations completed");
            }

            AppState::new(store.clone(), store, config.clone())
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory ledger store; data is lost on shutdown");
            let store = Arc::new(MemoryStore::new());
            AppState::new(store.clone(), store, config.clone())
        }
    };

    // Build application
    let app = create_app(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
