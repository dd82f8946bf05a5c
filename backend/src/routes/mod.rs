//! Route definitions for the stock ledger API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - movement ledger and stock positions
        .merge(ledger_routes(state.clone()))
        // Protected routes - warehouses
        .nest("/warehouses", warehouse_routes(state.clone()))
        // Protected routes - alerts
        .nest("/alerts", alert_routes(state.clone()))
        // Protected routes - valuation
        .nest("/valuation", valuation_routes(state.clone()))
        // Protected routes - forecasting and optimisation
        .merge(analytics_routes(state))
}

/// Movement ledger, stock level and catalog routes (protected)
fn ledger_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/movements",
            post(handlers::commit_movements).get(handlers::list_movements),
        )
        .route("/stock-levels", get(handlers::list_stock_levels))
        .route("/products", get(handlers::list_products))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Warehouse routes (protected)
fn warehouse_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/:warehouse_id/capacity",
            get(handlers::get_warehouse_capacity),
        )
        .route(
            "/:warehouse_id/valuation",
            get(handlers::get_warehouse_valuation),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Alert routes (protected)
fn alert_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_alerts))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Valuation routes (protected)
fn valuation_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/:product_id/:warehouse_id",
            get(handlers::get_valuation),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Forecast, optimisation and trend routes (protected)
fn analytics_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/forecast/:product_id", get(handlers::get_forecast))
        .route("/optimization", get(handlers::get_optimization))
        .route("/trends", get(handlers::get_trends))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
