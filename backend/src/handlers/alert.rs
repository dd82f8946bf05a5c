//! HTTP handlers for stock alerts

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{AlertStatus, StockAlert};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AlertListQuery {
    pub status: Option<String>,
}

/// List alerts, newest first
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertListQuery>,
) -> AppResult<Json<Vec<StockAlert>>> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            AlertStatus::parse(s).ok_or_else(|| {
                AppError::validation("status", format!("Unknown alert status '{}'", s))
            })
        })
        .transpose()?;

    let alerts = state.alert_engine().list_alerts(status).await?;
    Ok(Json(alerts))
}
