//! Optimization and trend engine

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::EngineSettings;
use crate::error::{AppError, AppResult};
use crate::models::{
    linear_fit, stock_target, turnover_rate, MovementType, Product, StockAction, StockTarget,
    TrendDirection, MIN_TREND_BUCKETS,
};
use crate::services::forecasting::{to_f64, MAX_PERIOD_DAYS};
use crate::services::with_deadline;
use crate::store::{LedgerStore, MovementQuery, ProductCatalog, StockLevelFilter};

/// Outbound history used to derive turnover
pub const TURNOVER_WINDOW_DAYS: i64 = 365;

#[derive(Debug, Clone, Serialize)]
pub struct StockRecommendation {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub current_stock: f64,
    pub turnover_rate: f64,
    #[serde(flatten)]
    pub target: StockTarget,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizationSummary {
    pub products_analyzed: usize,
    pub reduce_count: usize,
    pub increase_count: usize,
    pub maintain_count: usize,
    pub total_excess_stock: f64,
    pub total_potential_savings: f64,
}

impl OptimizationSummary {
    fn add(&mut self, target: &StockTarget) {
        self.products_analyzed += 1;
        match target.action {
            StockAction::Reduce => self.reduce_count += 1,
            StockAction::Increase => self.increase_count += 1,
            StockAction::Maintain => self.maintain_count += 1,
        }
        self.total_excess_stock += target.excess_stock;
        self.total_potential_savings += target.potential_savings;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub warehouse_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub recommendations: Vec<StockRecommendation>,
    /// Covers every product analysed, not only the reported top entries
    pub summary: OptimizationSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyVolume {
    pub year: i32,
    pub month: u32,
    /// Outbound minus inbound quantity
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendAnalysis {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub months_analyzed: usize,
    pub slope: f64,
    pub intercept: f64,
    pub correlation: f64,
    pub trend_strength: f64,
    pub direction: TrendDirection,
    /// Change in monthly volume over the next three months at the fitted slope
    pub projected_change: f64,
    pub monthly_volumes: Vec<MonthlyVolume>,
}

#[derive(Clone)]
pub struct OptimizationEngine {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn ProductCatalog>,
    settings: EngineSettings,
}

impl OptimizationEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        catalog: Arc<dyn ProductCatalog>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            settings,
        }
    }

    pub async fn optimize_levels(
        &self,
        warehouse_id: Option<Uuid>,
        category_id: Option<Uuid>,
        deadline: Option<Instant>,
    ) -> AppResult<OptimizationReport> {
        self.optimize_levels_at(warehouse_id, category_id, Utc::now(), deadline)
            .await
    }

    /// Stock targets for every stocked product in scope, largest savings first
    pub async fn optimize_levels_at(
        &self,
        warehouse_id: Option<Uuid>,
        category_id: Option<Uuid>,
        now: DateTime<Utc>,
        deadline: Option<Instant>,
    ) -> AppResult<OptimizationReport> {
        with_deadline(deadline, "stock optimization", async {
            if let Some(w) = warehouse_id {
                if self.store.get_warehouse(w).await?.is_none() {
                    return Err(AppError::NotFound(format!("Warehouse {}", w)));
                }
            }

            let levels = self
                .store
                .list_stock_levels(StockLevelFilter {
                    product_id: None,
                    warehouse_id,
                })
                .await?;
            let mut stock: HashMap<Uuid, Decimal> = HashMap::new();
            for level in &levels {
                *stock.entry(level.product_id).or_default() += level.quantity;
            }

            let mut query = MovementQuery::new()
                .kinds(&[MovementType::Out])
                .since(now - Duration::days(TURNOVER_WINDOW_DAYS))
                .until(now);
            if let Some(w) = warehouse_id {
                query = query.warehouse(w);
            }
            let mut annual_out: HashMap<Uuid, Decimal> = HashMap::new();
            for movement in self.store.list_movements(&query).await? {
                *annual_out.entry(movement.product_id).or_default() += movement.quantity;
            }

            let products = self.catalog.list_products(category_id).await?;
            let mut summary = OptimizationSummary::default();
            let mut recommendations = Vec::new();

            for product in products {
                let Some(quantity) = stock.get(&product.id) else {
                    continue;
                };
                let current_stock = to_f64(*quantity);
                let outbound = annual_out.get(&product.id).copied().unwrap_or_default();
                let turnover = turnover_rate(to_f64(outbound), current_stock);

                let mut params = self.settings.optimization_params();
                if let Some(days) = product.lead_time_days {
                    params.lead_time_days = f64::from(days);
                }
                let target = stock_target(current_stock, turnover, to_f64(product.unit_price), &params);
                summary.add(&target);

                recommendations.push(StockRecommendation {
                    product_id: product.id,
                    sku: product.sku,
                    name: product.name,
                    current_stock,
                    turnover_rate: turnover,
                    target,
                });
            }

            recommendations.sort_by(|a, b| {
                b.target
                    .potential_savings
                    .total_cmp(&a.target.potential_savings)
                    .then_with(|| a.sku.cmp(&b.sku))
            });
            recommendations.truncate(self.settings.optimization_top_n);

            tracing::debug!(
                analyzed = summary.products_analyzed,
                reduce = summary.reduce_count,
                increase = summary.increase_count,
                "Stock optimization computed"
            );

            Ok(OptimizationReport {
                warehouse_id,
                category_id,
                recommendations,
                summary,
            })
        })
        .await
    }

    pub async fn analyze_trend(
        &self,
        product_id: Option<Uuid>,
        period_days: u32,
        deadline: Option<Instant>,
    ) -> AppResult<Vec<TrendAnalysis>> {
        self.analyze_trend_at(product_id, period_days, Utc::now(), deadline)
            .await
    }

    /// Linear trend of monthly net demand per product, strongest first.
    /// Products with fewer than three active months are left out.
    pub async fn analyze_trend_at(
        &self,
        product_id: Option<Uuid>,
        period_days: u32,
        now: DateTime<Utc>,
        deadline: Option<Instant>,
    ) -> AppResult<Vec<TrendAnalysis>> {
        if period_days == 0 || period_days > MAX_PERIOD_DAYS {
            return Err(AppError::validation(
                "period_days",
                format!("period_days must be between 1 and {}", MAX_PERIOD_DAYS),
            ));
        }

        with_deadline(deadline, "trend analysis", async {
            let mut query = MovementQuery::new()
                .kinds(&[MovementType::In, MovementType::Out])
                .since(now - Duration::days(i64::from(period_days)))
                .until(now);
            if let Some(p) = product_id {
                query = query.product(p);
            }

            let mut buckets: BTreeMap<Uuid, BTreeMap<(i32, u32), f64>> = BTreeMap::new();
            for movement in self.store.list_movements(&query).await? {
                let month = (movement.created_at.year(), movement.created_at.month());
                let signed = match movement.movement_type {
                    MovementType::Out => to_f64(movement.quantity),
                    _ => -to_f64(movement.quantity),
                };
                *buckets
                    .entry(movement.product_id)
                    .or_default()
                    .entry(month)
                    .or_default() += signed;
            }

            let products: HashMap<Uuid, Product> = self
                .catalog
                .list_products(None)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect();

            let mut analyses = Vec::new();
            for (id, months) in buckets {
                if months.len() < MIN_TREND_BUCKETS {
                    continue;
                }
                let Some(product) = products.get(&id) else {
                    tracing::debug!(product_id = %id, "Skipping trend for product missing from catalog");
                    continue;
                };
                if let Some(analysis) = trend_for(product, &months) {
                    analyses.push(analysis);
                }
            }

            analyses.sort_by(|a, b| {
                b.trend_strength
                    .total_cmp(&a.trend_strength)
                    .then_with(|| a.sku.cmp(&b.sku))
            });
            Ok(analyses)
        })
        .await
    }
}

/// Fits volume against month offset from the first active month
fn trend_for(product: &Product, months: &BTreeMap<(i32, u32), f64>) -> Option<TrendAnalysis> {
    let (&(first_year, first_month), _) = months.iter().next()?;
    let origin = first_year * 12 + first_month as i32;

    let points: Vec<(f64, f64)> = months
        .iter()
        .map(|(&(year, month), &volume)| (f64::from(year * 12 + month as i32 - origin), volume))
        .collect();
    let fit = linear_fit(&points)?;

    Some(TrendAnalysis {
        product_id: product.id,
        sku: product.sku.clone(),
        name: product.name.clone(),
        months_analyzed: months.len(),
        slope: fit.slope,
        intercept: fit.intercept,
        correlation: fit.correlation,
        trend_strength: fit.strength(),
        direction: fit.direction(),
        projected_change: fit.projected_change(),
        monthly_volumes: months
            .iter()
            .map(|(&(year, month), &volume)| MonthlyVolume {
                year,
                month,
                volume,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_uses_month_offsets_across_year_end() {
        let product = Product::new("SKU-T", "Trend", Decimal::ONE);
        let mut months = BTreeMap::new();
        months.insert((2023, 11), 10.0);
        months.insert((2023, 12), 20.0);
        months.insert((2024, 2), 40.0);

        let analysis = trend_for(&product, &months).unwrap();
        // x = 0, 1, 3 lies exactly on y = 10x + 10
        assert!((analysis.slope - 10.0).abs() < 1e-9);
        assert!((analysis.intercept - 10.0).abs() < 1e-9);
        assert_eq!(analysis.direction, TrendDirection::Increasing);
        assert!((analysis.projected_change - 30.0).abs() < 1e-9);
        assert_eq!(analysis.months_analyzed, 3);
    }

    #[test]
    fn test_summary_counts_actions() {
        let mut summary = OptimizationSummary::default();
        let target = StockTarget {
            avg_daily_demand: 1.0,
            safety_stock: 1.0,
            optimal_stock: 8.0,
            excess_stock: 92.0,
            action: StockAction::Reduce,
            potential_savings: 13.8,
        };
        summary.add(&target);
        summary.add(&StockTarget {
            action: StockAction::Increase,
            excess_stock: 0.0,
            potential_savings: 0.0,
            ..target.clone()
        });
        assert_eq!(summary.products_analyzed, 2);
        assert_eq!(summary.reduce_count, 1);
        assert_eq!(summary.increase_count, 1);
        assert!((summary.total_potential_savings - 13.8).abs() < 1e-9);
    }
}
