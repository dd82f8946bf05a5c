//! Stock ledger backend
//!
//! Records unit movements of physical goods, keeps derived stock levels,
//! alerts and warehouse capacity in step, and serves valuation, forecasting
//! and optimisation reports over the ledger.

use std::{sync::Arc, time::Duration};

use axum::{routing::get, Router};
use tokio::time::Instant;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::{
    AlertEngine, CostingEngine, ForecastingEngine, MovementProcessor, OptimizationEngine,
};
use store::{LedgerStore, ProductCatalog};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, catalog: Arc<dyn ProductCatalog>, config: Config) -> Self {
        Self {
            store,
            catalog,
            config: Arc::new(config),
        }
    }

    /// Deadline for an analytical request starting now; `None` when disabled
    pub fn deadline(&self) -> Option<Instant> {
        match self.config.engine.analytics_timeout_ms {
            0 => None,
            ms => Some(Instant::now() + Duration::from_millis(ms)),
        }
    }

    pub fn movement_processor(&self) -> MovementProcessor {
        MovementProcessor::new(self.store.clone(), self.catalog.clone())
    }

    pub fn alert_engine(&self) -> AlertEngine {
        AlertEngine::new(self.store.clone(), self.catalog.clone())
    }

    pub fn costing_engine(&self) -> CostingEngine {
        CostingEngine::new(self.store.clone(), self.catalog.clone())
    }

    pub fn forecasting_engine(&self) -> ForecastingEngine {
        ForecastingEngine::new(
            self.store.clone(),
            self.catalog.clone(),
            self.config.engine.clone(),
        )
    }

    pub fn optimization_engine(&self) -> OptimizationEngine {
        OptimizationEngine::new(
            self.store.clone(),
            self.catalog.clone(),
            self.config.engine.clone(),
        )
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Stock Ledger API v1"
}
