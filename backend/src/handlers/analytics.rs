//! HTTP handlers for forecasting, optimisation and trend reports

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::forecasting::{
    ForecastReport, ForecastRequest, DEFAULT_FORECAST_DAYS, DEFAULT_PERIOD_DAYS,
};
use crate::services::optimization::{OptimizationReport, TrendAnalysis};
use crate::AppState;

const DEFAULT_TREND_PERIOD_DAYS: u32 = 365;

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub warehouse_id: Option<Uuid>,
    pub period_days: Option<u32>,
    pub forecast_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct OptimizationQuery {
    pub warehouse_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub product_id: Option<Uuid>,
    pub period_days: Option<u32>,
}

/// Demand forecast and reorder recommendation for one product
pub async fn get_forecast(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(params): Query<ForecastQuery>,
) -> AppResult<Json<ForecastReport>> {
    let mut request = ForecastRequest::new(
        product_id,
        params.period_days.unwrap_or(DEFAULT_PERIOD_DAYS),
        params.forecast_days.unwrap_or(DEFAULT_FORECAST_DAYS),
    );
    if let Some(warehouse_id) = params.warehouse_id {
        request = request.in_warehouse(warehouse_id);
    }

    let report = state
        .forecasting_engine()
        .forecast(request, state.deadline())
        .await?;
    Ok(Json(report))
}

/// Stock level targets ranked by potential savings
pub async fn get_optimization(
    State(state): State<AppState>,
    Query(params): Query<OptimizationQuery>,
) -> AppResult<Json<OptimizationReport>> {
    let report = state
        .optimization_engine()
        .optimize_levels(params.warehouse_id, params.category_id, state.deadline())
        .await?;
    Ok(Json(report))
}

/// Monthly demand trends, strongest first
pub async fn get_trends(
    State(state): State<AppState>,
    Query(params): Query<TrendQuery>,
) -> AppResult<Json<Vec<TrendAnalysis>>> {
    let trends = state
        .optimization_engine()
        .analyze_trend(
            params.product_id,
            params.period_days.unwrap_or(DEFAULT_TREND_PERIOD_DAYS),
            state.deadline(),
        )
        .await?;
    Ok(Json(trends))
}
