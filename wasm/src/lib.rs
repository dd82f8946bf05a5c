//! WebAssembly module for the stock ledger
//!
//! Provides client-side previews of:
//! - Movement validation before submission
//! - FIFO / LIFO / average valuation of a set of layers
//! - Safety stock, stockout risk and alert level

use rust_decimal::Decimal;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("stock ledger module loaded"));
}

fn js_error(context: &str, e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, e))
}

/// Checks one movement's shape. Returns `null` when valid, otherwise the
/// offending field and message as JSON.
#[wasm_bindgen]
pub fn validate_movement_json(movement_json: &str) -> Result<Option<String>, JsValue> {
    let input: MovementInput =
        serde_json::from_str(movement_json).map_err(|e| js_error("Invalid movement JSON", e))?;

    Ok(validate_movement(&input).err().map(|e| {
        serde_json::json!({ "field": e.field(), "message": e.to_string() }).to_string()
    }))
}

#[derive(Deserialize)]
struct PreviewLayer {
    date: chrono::DateTime<chrono::Utc>,
    quantity: Decimal,
    unit_cost: Decimal,
}

/// Values `quantity` against client-held inbound layers
/// (`[{date, quantity, unit_cost}]`) and returns the valuation as JSON
#[wasm_bindgen]
pub fn preview_valuation(
    layers_json: &str,
    quantity: &str,
    method: &str,
    fallback_price: &str,
) -> Result<String, JsValue> {
    let layers: Vec<PreviewLayer> =
        serde_json::from_str(layers_json).map_err(|e| js_error("Invalid layers JSON", e))?;
    let quantity: Decimal = quantity.parse().map_err(|e| js_error("Invalid quantity", e))?;
    let fallback_price: Decimal = fallback_price
        .parse()
        .map_err(|e| js_error("Invalid fallback price", e))?;
    let method = CostingMethod::parse(method)
        .ok_or_else(|| JsValue::from_str("Unknown costing method, expected FIFO, LIFO or AVERAGE"))?;

    let inbound = layers
        .into_iter()
        .enumerate()
        .map(|(i, l)| InboundLayer {
            movement_id: None,
            sequence: i as i64,
            date: l.date,
            quantity: l.quantity,
            unit_cost: l.unit_cost,
        })
        .collect();

    let valuation =
        value_layers(inbound, quantity, method, fallback_price).map_err(|e| js_error("Valuation failed", e))?;
    serde_json::to_string(&valuation).map_err(|e| js_error("Serialization failed", e))
}

/// Safety stock for a demand standard deviation and lead time
#[wasm_bindgen]
pub fn calculate_safety_stock(service_level_z: f64, std_dev: f64, lead_time_days: f64) -> f64 {
    safety_stock(service_level_z, std_dev, lead_time_days)
}

/// Stockout risk band (`high`, `medium`, `low`) for current stock at a daily demand rate
#[wasm_bindgen]
pub fn classify_stockout_risk(current_stock: f64, daily_demand: f64) -> String {
    let risk = stockout_risk(days_until_stockout(current_stock, daily_demand));
    match risk {
        StockoutRisk::High => "high",
        StockoutRisk::Medium => "medium",
        StockoutRisk::Low => "low",
    }
    .to_string()
}

/// Alert level a quantity would raise: `critical`, `warning` or `healthy`
#[wasm_bindgen]
pub fn classify_stock_level(quantity: &str, min_stock_level: &str, reorder_point: &str) -> Result<String, JsValue> {
    let parse = |s: &str| s.parse::<Decimal>().map_err(|e| js_error("Invalid decimal", e));
    let condition = StockCondition::classify(parse(quantity)?, parse(min_stock_level)?, parse(reorder_point)?);
    Ok(condition
        .severity()
        .map_or("healthy", |s| s.as_str())
        .to_string())
}
