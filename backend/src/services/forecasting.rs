//! Forecasting engine: trailing daily demand, seasonal projection and a
//! reorder recommendation

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::EngineSettings;
use crate::error::{AppError, AppResult};
use crate::models::{
    daily_demand_series, days_until_stockout, mean, project_demand, safety_stock,
    sample_std_dev, stockout_risk, ForecastPoint, MonthlyFactorTable, MovementType, PairKey,
    Product, SeasonalModel, StockoutRisk,
};
use crate::services::with_deadline;
use crate::store::{LedgerStore, MovementQuery, ProductCatalog, StockLevelFilter};

pub const MAX_PERIOD_DAYS: u32 = 3650;
pub const MAX_FORECAST_DAYS: u32 = 365;

pub const DEFAULT_PERIOD_DAYS: u32 = 90;
pub const DEFAULT_FORECAST_DAYS: u32 = 30;

fn default_period_days() -> u32 {
    DEFAULT_PERIOD_DAYS
}

fn default_forecast_days() -> u32 {
    DEFAULT_FORECAST_DAYS
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastRequest {
    pub product_id: Uuid,
    /// All warehouses when absent
    #[serde(default)]
    pub warehouse_id: Option<Uuid>,
    #[serde(default = "default_period_days")]
    pub period_days: u32,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
}

impl ForecastRequest {
    pub fn new(product_id: Uuid, period_days: u32, forecast_days: u32) -> Self {
        Self {
            product_id,
            warehouse_id: None,
            period_days,
            forecast_days,
        }
    }

    pub fn in_warehouse(mut self, warehouse_id: Uuid) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReorderRecommendation {
    pub current_stock: f64,
    pub baseline_daily_demand: f64,
    pub demand_std_dev: f64,
    /// `None` when there is no demand to run the stock down
    pub days_until_stockout: Option<f64>,
    pub reorder_date: Option<NaiveDate>,
    pub safety_stock: f64,
    pub recommended_order_quantity: f64,
    pub lead_time_days: u32,
    pub stockout_risk: StockoutRisk,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub product_id: Uuid,
    pub warehouse_id: Option<Uuid>,
    pub period_days: u32,
    pub forecast_days: u32,
    pub forecasts: Vec<ForecastPoint>,
    pub recommendation: ReorderRecommendation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasonal_factors: Option<[f64; 12]>,
}

pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[derive(Clone)]
pub struct ForecastingEngine {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn ProductCatalog>,
    settings: EngineSettings,
    seasonal: Arc<dyn SeasonalModel>,
}

impl ForecastingEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        catalog: Arc<dyn ProductCatalog>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            settings,
            seasonal: Arc::new(MonthlyFactorTable::default()),
        }
    }

    /// Replace the seasonal model
    pub fn with_seasonal_model(mut self, seasonal: Arc<dyn SeasonalModel>) -> Self {
        self.seasonal = seasonal;
        self
    }

    pub async fn forecast(&self, request: ForecastRequest, deadline: Option<Instant>) -> AppResult<ForecastReport> {
        self.forecast_at(request, Utc::now(), deadline).await
    }

    /// Forecast as if the current time were `now`
    pub async fn forecast_at(
        &self,
        request: ForecastRequest,
        now: DateTime<Utc>,
        deadline: Option<Instant>,
    ) -> AppResult<ForecastReport> {
        if request.period_days == 0 || request.period_days > MAX_PERIOD_DAYS {
            return Err(AppError::validation(
                "period_days",
                format!("period_days must be between 1 and {}", MAX_PERIOD_DAYS),
            ));
        }
        if request.forecast_days == 0 || request.forecast_days > MAX_FORECAST_DAYS {
            return Err(AppError::validation(
                "forecast_days",
                format!("forecast_days must be between 1 and {}", MAX_FORECAST_DAYS),
            ));
        }

        with_deadline(deadline, "forecast", self.run(request, now)).await
    }

    async fn run(&self, request: ForecastRequest, now: DateTime<Utc>) -> AppResult<ForecastReport> {
        let product = self
            .catalog
            .get_product(request.product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", request.product_id)))?;

        if let Some(warehouse_id) = request.warehouse_id {
            if self.store.get_warehouse(warehouse_id).await?.is_none() {
                return Err(AppError::NotFound(format!("Warehouse {}", warehouse_id)));
            }
        }

        // Trailing window ending today, one slot per calendar day
        let today = now.date_naive();
        let start = today - Duration::days(i64::from(request.period_days) - 1);
        let mut query = MovementQuery::new()
            .product(product.id)
            .kinds(&[MovementType::Out])
            .since(start.and_time(NaiveTime::MIN).and_utc())
            .until(now);
        if let Some(warehouse_id) = request.warehouse_id {
            query = query.warehouse(warehouse_id);
        }
        let outbound = self.store.list_movements(&query).await?;
        let events: Vec<(NaiveDate, f64)> = outbound
            .iter()
            .map(|m| (m.created_at.date_naive(), to_f64(m.quantity)))
            .collect();

        let series = daily_demand_series(&events, start, request.period_days);
        let baseline = mean(&series);
        let std_dev = sample_std_dev(&series);

        let forecasts = project_demand(
            baseline,
            std_dev,
            today,
            request.forecast_days,
            self.seasonal.as_ref(),
            self.settings.forecast_confidence,
        );

        let current_stock = self.current_stock(&product, request.warehouse_id).await?;
        let recommendation = self.recommend(&product, current_stock, baseline, std_dev, now);

        tracing::debug!(
            product_id = %product.id,
            baseline,
            std_dev,
            risk = ?recommendation.stockout_risk,
            "Forecast computed"
        );

        Ok(ForecastReport {
            product_id: product.id,
            warehouse_id: request.warehouse_id,
            period_days: request.period_days,
            forecast_days: request.forecast_days,
            forecasts,
            recommendation,
            seasonal_factors: self.seasonal.monthly_factors(),
        })
    }

    async fn current_stock(&self, product: &Product, warehouse_id: Option<Uuid>) -> AppResult<f64> {
        let quantity = match warehouse_id {
            Some(w) => self.store.pair_quantity(PairKey::new(product.id, w)).await?,
            None => self
                .store
                .list_stock_levels(StockLevelFilter {
                    product_id: Some(product.id),
                    warehouse_id: None,
                })
                .await?
                .iter()
                .map(|l| l.quantity)
                .sum(),
        };
        Ok(to_f64(quantity))
    }

    fn recommend(
        &self,
        product: &Product,
        current_stock: f64,
        baseline: f64,
        std_dev: f64,
        now: DateTime<Utc>,
    ) -> ReorderRecommendation {
        let lead_time_days = product.lead_time_days.unwrap_or(self.settings.lead_time_days);
        let lead = f64::from(lead_time_days);

        let cover = days_until_stockout(current_stock, baseline);
        let reorder_date = cover.and_then(|days| {
            let seconds = ((days - lead) * 86_400.0).round() as i64;
            Duration::try_seconds(seconds)
                .and_then(|offset| now.checked_add_signed(offset))
                .map(|at| at.date_naive())
        });

        let safety = safety_stock(self.settings.service_level_z, std_dev, lead);
        let recommended_order_quantity =
            to_f64(product.reorder_quantity).max((baseline * lead).round() + safety);

        ReorderRecommendation {
            current_stock,
            baseline_daily_demand: baseline,
            demand_std_dev: std_dev,
            days_until_stockout: cover,
            reorder_date,
            safety_stock: safety,
            recommended_order_quantity,
            lead_time_days,
            stockout_risk: stockout_risk(cover),
        }
    }
}
