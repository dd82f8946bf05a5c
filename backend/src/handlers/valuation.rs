//! HTTP handlers for inventory valuation

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::CostingMethod;
use crate::services::costing::{ValuationReport, WarehouseValuation};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ValuationQuery {
    pub method: Option<String>,
    pub as_of: Option<DateTime<Utc>>,
}

/// Costing method from a query parameter; FIFO when absent
fn parse_method(method: Option<&str>) -> AppResult<CostingMethod> {
    match method {
        None => Ok(CostingMethod::default()),
        Some(m) => CostingMethod::parse(m).ok_or_else(|| {
            AppError::validation(
                "method",
                format!("Unknown costing method '{}', expected FIFO, LIFO or AVERAGE", m),
            )
        }),
    }
}

/// Value one product in one warehouse
pub async fn get_valuation(
    State(state): State<AppState>,
    Path((product_id, warehouse_id)): Path<(Uuid, Uuid)>,
    Query(params): Query<ValuationQuery>,
) -> AppResult<Json<ValuationReport>> {
    let method = parse_method(params.method.as_deref())?;
    let report = state
        .costing_engine()
        .value(product_id, warehouse_id, method, params.as_of, state.deadline())
        .await?;
    Ok(Json(report))
}

/// Value everything held in one warehouse
pub async fn get_warehouse_valuation(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
    Query(params): Query<ValuationQuery>,
) -> AppResult<Json<WarehouseValuation>> {
    let method = parse_method(params.method.as_deref())?;
    let report = state
        .costing_engine()
        .value_warehouse(warehouse_id, method, state.deadline())
        .await?;
    Ok(Json(report))
}
