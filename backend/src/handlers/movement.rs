//! HTTP handlers for the movement ledger and stock positions

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::models::{Movement, MovementType, Product, StockLevel, WarehouseCapacity};
use crate::services::movement::{CommitOutcome, CommitRequest};
use crate::store::{MovementQuery, StockLevelFilter};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MovementListQuery {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct StockLevelQuery {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub category_id: Option<Uuid>,
}

/// Commit a batch of movements atomically
pub async fn commit_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<CommitRequest>,
) -> AppResult<Json<CommitOutcome>> {
    let outcome = state
        .movement_processor()
        .commit_movements(request, current_user.0.user_id)
        .await?;
    Ok(Json(outcome))
}

/// List ledger entries in commit order
pub async fn list_movements(
    State(state): State<AppState>,
    Query(params): Query<MovementListQuery>,
) -> AppResult<Json<Vec<Movement>>> {
    let mut query = MovementQuery::new();
    if let Some(product_id) = params.product_id {
        query = query.product(product_id);
    }
    if let Some(warehouse_id) = params.warehouse_id {
        query = query.warehouse(warehouse_id);
    }
    if let Some(kind) = params.movement_type {
        query = query.kinds(&[kind]);
    }
    if let Some(since) = params.since {
        query = query.since(since);
    }
    if let Some(until) = params.until {
        query = query.until(until);
    }

    let movements = state.store.list_movements(&query).await?;
    Ok(Json(movements))
}

/// Current stock levels
pub async fn list_stock_levels(
    State(state): State<AppState>,
    Query(params): Query<StockLevelQuery>,
) -> AppResult<Json<Vec<StockLevel>>> {
    let filter = StockLevelFilter {
        product_id: params.product_id,
        warehouse_id: params.warehouse_id,
    };
    let levels = state.store.list_stock_levels(filter).await?;
    Ok(Json(levels))
}

/// Capacity and utilisation of one warehouse
pub async fn get_warehouse_capacity(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<WarehouseCapacity>> {
    let warehouse = state
        .store
        .get_warehouse(warehouse_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Warehouse {}", warehouse_id)))?;
    Ok(Json(warehouse.capacity_snapshot()))
}

/// Catalog listing, optionally narrowed to one category
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListQuery>,
) -> AppResult<Json<Vec<Product>>> {
    let products = state.catalog.list_products(params.category_id).await?;
    Ok(Json(products))
}
