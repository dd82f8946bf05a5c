//! Cost layer accounting
//!
//! Layers are never persisted. They are rebuilt from inbound movement history
//! on every valuation and only mutated inside one computation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::Movement;

/// Decimal places kept on monetary outputs
pub const MONEY_DP: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CostingMethod {
    #[default]
    Fifo,
    Lifo,
    Average,
}

impl CostingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostingMethod::Fifo => "FIFO",
            CostingMethod::Lifo => "LIFO",
            CostingMethod::Average => "AVERAGE",
        }
    }

    /// Case-insensitive parse
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FIFO" => Some(CostingMethod::Fifo),
            "LIFO" => Some(CostingMethod::Lifo),
            "AVERAGE" | "AVG" => Some(CostingMethod::Average),
            _ => None,
        }
    }
}

/// An inbound chunk of stock with its original unit cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundLayer {
    pub movement_id: Option<Uuid>,
    pub sequence: i64,
    pub date: DateTime<Utc>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

impl InboundLayer {
    /// Layer created by `movement` in `warehouse_id`, if it is inbound there.
    /// Movements without a recorded cost are costed at `fallback_cost`.
    pub fn from_movement(movement: &Movement, warehouse_id: Uuid, fallback_cost: Decimal) -> Option<Self> {
        movement.inbound_quantity(warehouse_id).map(|quantity| Self {
            movement_id: Some(movement.id),
            sequence: movement.sequence,
            date: movement.created_at,
            quantity,
            unit_cost: movement.unit_cost.unwrap_or(fallback_cost),
        })
    }
}

/// Where a reported layer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerSource {
    #[serde(rename = "inbound")]
    Inbound,
    /// Stock the inbound history could not explain, valued at catalog price
    #[serde(rename = "Default Price")]
    DefaultPrice,
    #[serde(rename = "weighted_average")]
    WeightedAverage,
}

/// A layer as reported in a valuation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLayer {
    pub movement_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
    pub quantity_in: Decimal,
    pub unit_cost: Decimal,
    pub remaining_quantity: Decimal,
    pub source: LayerSource,
}

/// Result of valuing one quantity against a set of layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerValuation {
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_value: Decimal,
    pub layers: Vec<CostLayer>,
    /// Quantity valued at the fallback price because history ran out
    pub unexplained_quantity: Decimal,
}

/// Non-fatal notice that part of the stock was valued at catalog price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataGapWarning {
    pub code: String,
    pub message: String,
    pub unexplained_quantity: Decimal,
    pub fallback_unit_cost: Decimal,
}

impl DataGapWarning {
    pub fn new(unexplained_quantity: Decimal, fallback_unit_cost: Decimal) -> Self {
        Self {
            code: "DATA_GAP".to_string(),
            message: format!(
                "Inbound history explains less than the stock on hand; {} units valued at default price {}",
                unexplained_quantity.normalize(),
                fallback_unit_cost.normalize()
            ),
            unexplained_quantity,
            fallback_unit_cost,
        }
    }
}

/// Quantities or costs too large for a valuation to be represented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("valuation exceeds the representable decimal range")]
pub struct ValuationOverflow;

fn checked_value(total: Decimal, quantity: Decimal, unit_cost: Decimal) -> Result<Decimal, ValuationOverflow> {
    quantity
        .checked_mul(unit_cost)
        .and_then(|value| total.checked_add(value))
        .ok_or(ValuationOverflow)
}

/// Orders layers for the walk: oldest first for FIFO, newest first for LIFO.
/// Ties on date fall back to commit sequence.
pub fn order_layers(layers: &mut [InboundLayer], method: CostingMethod) {
    layers.sort_by(|a, b| (a.date, a.sequence).cmp(&(b.date, b.sequence)));
    if method == CostingMethod::Lifo {
        layers.reverse();
    }
}

/// Explains `quantity` from `layers` in the given order.
///
/// Each layer contributes `min(layer.quantity, still_unexplained)`; the walk
/// stops once the quantity is explained. Anything left when the layers run
/// out becomes a single "Default Price" layer at `fallback_price`.
pub fn walk_layers(
    layers: &[InboundLayer],
    quantity: Decimal,
    fallback_price: Decimal,
) -> Result<LayerValuation, ValuationOverflow> {
    let quantity = quantity.max(Decimal::ZERO);
    let mut remaining = quantity;
    let mut total = Decimal::ZERO;
    let mut reported = Vec::new();

    for layer in layers {
        if remaining.is_zero() {
            break;
        }
        if layer.quantity <= Decimal::ZERO {
            continue;
        }
        let consumed = layer.quantity.min(remaining);
        total = checked_value(total, consumed, layer.unit_cost)?;
        remaining -= consumed;
        reported.push(CostLayer {
            movement_id: layer.movement_id,
            date: Some(layer.date),
            quantity_in: layer.quantity,
            unit_cost: layer.unit_cost,
            remaining_quantity: consumed,
            source: LayerSource::Inbound,
        });
    }

    if remaining > Decimal::ZERO {
        total = checked_value(total, remaining, fallback_price)?;
        reported.push(CostLayer {
            movement_id: None,
            date: None,
            quantity_in: remaining,
            unit_cost: fallback_price,
            remaining_quantity: remaining,
            source: LayerSource::DefaultPrice,
        });
    }

    finish(quantity, total, reported, remaining)
}

/// Weighted average cost across all inbound layers, applied to `quantity`.
/// Order of `layers` does not matter.
pub fn weighted_average(
    layers: &[InboundLayer],
    quantity: Decimal,
    fallback_price: Decimal,
) -> Result<LayerValuation, ValuationOverflow> {
    let quantity = quantity.max(Decimal::ZERO);
    let (quantity_in, value_in) = layers
        .iter()
        .filter(|l| l.quantity > Decimal::ZERO)
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(q, v), l| {
            let q = q.checked_add(l.quantity).ok_or(ValuationOverflow)?;
            Ok::<_, ValuationOverflow>((q, checked_value(v, l.quantity, l.unit_cost)?))
        })?;

    if quantity_in > Decimal::ZERO {
        let average = value_in.checked_div(quantity_in).ok_or(ValuationOverflow)?;
        let layer = CostLayer {
            movement_id: None,
            date: layers.iter().map(|l| l.date).max(),
            quantity_in,
            unit_cost: average.round_dp(MONEY_DP),
            remaining_quantity: quantity,
            source: LayerSource::WeightedAverage,
        };
        let total = checked_value(Decimal::ZERO, quantity, average)?;
        return finish(quantity, total, vec![layer], Decimal::ZERO);
    }

    if quantity.is_zero() {
        return finish(quantity, Decimal::ZERO, Vec::new(), Decimal::ZERO);
    }

    let layer = CostLayer {
        movement_id: None,
        date: None,
        quantity_in: quantity,
        unit_cost: fallback_price,
        remaining_quantity: quantity,
        source: LayerSource::DefaultPrice,
    };
    let total = checked_value(Decimal::ZERO, quantity, fallback_price)?;
    finish(quantity, total, vec![layer], quantity)
}

/// Values `quantity` with the requested method
pub fn value_layers(
    mut layers: Vec<InboundLayer>,
    quantity: Decimal,
    method: CostingMethod,
    fallback_price: Decimal,
) -> Result<LayerValuation, ValuationOverflow> {
    match method {
        CostingMethod::Average => weighted_average(&layers, quantity, fallback_price),
        CostingMethod::Fifo | CostingMethod::Lifo => {
            order_layers(&mut layers, method);
            walk_layers(&layers, quantity, fallback_price)
        }
    }
}

fn finish(
    quantity: Decimal,
    total: Decimal,
    layers: Vec<CostLayer>,
    unexplained: Decimal,
) -> Result<LayerValuation, ValuationOverflow> {
    let total_value = total.round_dp(MONEY_DP);
    let unit_cost = if quantity > Decimal::ZERO {
        total.checked_div(quantity).ok_or(ValuationOverflow)?.round_dp(MONEY_DP)
    } else {
        Decimal::ZERO
    };
    Ok(LayerValuation {
        quantity,
        unit_cost,
        total_value,
        layers,
        unexplained_quantity: unexplained,
    })
}
