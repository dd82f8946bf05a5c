//! Demand forecasting calculations

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Demand below this is treated as no demand when projecting stockout
pub const DEMAND_EPSILON: f64 = 1e-9;

/// Source of the per-date seasonal multiplier applied to the baseline
pub trait SeasonalModel: Send + Sync {
    fn factor_for(&self, date: NaiveDate) -> f64;

    /// The twelve monthly factors, when the model is a monthly table
    fn monthly_factors(&self) -> Option<[f64; 12]> {
        None
    }
}

/// January through December
pub const DEFAULT_MONTHLY_FACTORS: [f64; 12] = [
    0.85, 0.90, 0.95, 1.00, 1.05, 1.05, 1.00, 1.00, 1.05, 1.10, 1.15, 1.20,
];

/// Fixed twelve-month multiplier table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyFactorTable {
    factors: [f64; 12],
}

impl MonthlyFactorTable {
    pub fn new(factors: [f64; 12]) -> Self {
        Self { factors }
    }

    /// No seasonality
    pub fn flat() -> Self {
        Self { factors: [1.0; 12] }
    }
}

impl Default for MonthlyFactorTable {
    fn default() -> Self {
        Self::new(DEFAULT_MONTHLY_FACTORS)
    }
}

impl SeasonalModel for MonthlyFactorTable {
    fn factor_for(&self, date: NaiveDate) -> f64 {
        self.factors[date.month0() as usize]
    }

    fn monthly_factors(&self) -> Option<[f64; 12]> {
        Some(self.factors)
    }
}

/// One projected day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_demand: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockoutRisk {
    Low,
    Medium,
    High,
}

/// Buckets `(date, quantity)` events into a fixed-length daily series
/// starting at `start`. Days without events are zero; events outside the
/// window are ignored.
pub fn daily_demand_series(events: &[(NaiveDate, f64)], start: NaiveDate, days: u32) -> Vec<f64> {
    let mut series = vec![0.0; days as usize];
    for (date, quantity) in events {
        let offset = (*date - start).num_days();
        if offset >= 0 && (offset as usize) < series.len() {
            series[offset as usize] += quantity;
        }
    }
    series
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1); zero for fewer than two values
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Projects `days` points after `today` using a ±2σ band.
/// Bounds are not clamped at zero.
pub fn project_demand(
    baseline: f64,
    std_dev: f64,
    today: NaiveDate,
    days: u32,
    seasonal: &dyn SeasonalModel,
    confidence: f64,
) -> Vec<ForecastPoint> {
    (1..=i64::from(days))
        .map(|i| {
            let date = today + Duration::days(i);
            let predicted_demand = (baseline * seasonal.factor_for(date)).round();
            ForecastPoint {
                date,
                predicted_demand,
                lower_bound: predicted_demand - 2.0 * std_dev,
                upper_bound: predicted_demand + 2.0 * std_dev,
                confidence,
            }
        })
        .collect()
}

/// Days of cover at the baseline rate; `None` when there is no demand
pub fn days_until_stockout(current_stock: f64, baseline: f64) -> Option<f64> {
    if baseline <= DEMAND_EPSILON {
        None
    } else {
        Some(current_stock / baseline)
    }
}

pub fn stockout_risk(days_until_stockout: Option<f64>) -> StockoutRisk {
    match days_until_stockout {
        Some(days) if days < 7.0 => StockoutRisk::High,
        Some(days) if days < 14.0 => StockoutRisk::Medium,
        _ => StockoutRisk::Low,
    }
}

/// `round(z × σ × √lead_time)`
pub fn safety_stock(service_level_z: f64, std_dev: f64, lead_time_days: f64) -> f64 {
    (service_level_z * std_dev * lead_time_days.max(0.0).sqrt()).round()
}
