//! Stock target optimization formulas

use serde::{Deserialize, Serialize};

/// Tunables for stock target calculations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationParams {
    pub service_level_z: f64,
    pub lead_time_days: f64,
    pub demand_variability_factor: f64,
    /// Annual holding cost as a fraction of unit price
    pub holding_cost_rate: f64,
}

impl Default for OptimizationParams {
    fn default() -> Self {
        Self {
            service_level_z: 1.65,
            lead_time_days: 7.0,
            demand_variability_factor: 0.3,
            holding_cost_rate: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockAction {
    Reduce,
    Increase,
    Maintain,
}

/// Computed target for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTarget {
    pub avg_daily_demand: f64,
    pub safety_stock: f64,
    pub optimal_stock: f64,
    pub excess_stock: f64,
    pub action: StockAction,
    pub potential_savings: f64,
}

/// Excess above this share of current stock triggers a `reduce`
pub const EXCESS_REDUCE_RATIO: f64 = 0.2;

pub fn stock_target(current_stock: f64, turnover_rate: f64, unit_price: f64, params: &OptimizationParams) -> StockTarget {
    let avg_daily_demand = current_stock / (turnover_rate * 365.0).max(1.0);
    let safety_stock = params.service_level_z
        * params.lead_time_days.max(0.0).sqrt()
        * avg_daily_demand
        * params.demand_variability_factor;
    let optimal_stock = (avg_daily_demand * params.lead_time_days + safety_stock).round();
    let excess_stock = (current_stock - optimal_stock).max(0.0);

    let action = if excess_stock > current_stock * EXCESS_REDUCE_RATIO {
        StockAction::Reduce
    } else if current_stock < optimal_stock {
        StockAction::Increase
    } else {
        StockAction::Maintain
    };

    StockTarget {
        avg_daily_demand,
        safety_stock,
        optimal_stock,
        excess_stock,
        action,
        potential_savings: excess_stock * unit_price * params.holding_cost_rate,
    }
}

/// Annual outbound quantity over current stock; zero without stock
pub fn turnover_rate(annual_outbound: f64, current_stock: f64) -> f64 {
    if current_stock > 0.0 {
        annual_outbound / current_stock
    } else {
        0.0
    }
}
