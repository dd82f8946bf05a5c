//! Stock movement models
//!
//! A movement is an immutable ledger entry. Stock levels, cost layers and
//! demand history are all derived from the sequence of committed movements.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Location;

/// Kind of unit movement recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Goods received into a location
    In,
    /// Goods leaving a location (sale, consumption)
    Out,
    /// Goods moved between two locations
    Transfer,
    /// Signed correction of a location's quantity
    Adjustment,
    /// Cycle count: the quantity is the physically counted amount
    Count,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Transfer => "transfer",
            MovementType::Adjustment => "adjustment",
            MovementType::Count => "count",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(MovementType::In),
            "out" => Some(MovementType::Out),
            "transfer" => Some(MovementType::Transfer),
            "adjustment" => Some(MovementType::Adjustment),
            "count" => Some(MovementType::Count),
            _ => None,
        }
    }

    pub fn requires_source(&self) -> bool {
        matches!(self, MovementType::Out | MovementType::Transfer)
    }

    pub fn requires_destination(&self) -> bool {
        !matches!(self, MovementType::Out)
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: Uuid,
    /// Store-assigned commit order, strictly increasing
    pub sequence: i64,
    pub movement_type: MovementType,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub from_warehouse_id: Option<Uuid>,
    pub from_position_id: Option<Uuid>,
    pub to_warehouse_id: Option<Uuid>,
    pub to_position_id: Option<Uuid>,
    pub unit_cost: Option<Decimal>,
    pub lot_number: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    pub fn source(&self) -> Option<Location> {
        self.from_warehouse_id
            .map(|w| Location::new(w, self.from_position_id))
    }

    pub fn destination(&self) -> Option<Location> {
        self.to_warehouse_id
            .map(|w| Location::new(w, self.to_position_id))
    }

    /// Whether this movement touches the warehouse on either side
    pub fn touches_warehouse(&self, warehouse_id: Uuid) -> bool {
        self.from_warehouse_id == Some(warehouse_id) || self.to_warehouse_id == Some(warehouse_id)
    }

    /// Quantity this movement brings into `warehouse_id` as a new cost layer.
    ///
    /// Receipts, transfers from another warehouse and positive adjustments
    /// create layers. Counts, moves between positions of the same warehouse
    /// and everything leaving the warehouse do not.
    pub fn inbound_quantity(&self, warehouse_id: Uuid) -> Option<Decimal> {
        if self.to_warehouse_id != Some(warehouse_id) || self.from_warehouse_id == Some(warehouse_id) {
            return None;
        }
        match self.movement_type {
            MovementType::In | MovementType::Transfer => Some(self.quantity),
            MovementType::Adjustment if self.quantity > Decimal::ZERO => Some(self.quantity),
            _ => None,
        }
    }
}

/// A movement as submitted by a caller, before it is committed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementInput {
    pub movement_type: MovementType,
    pub product_id: Uuid,
    pub quantity: Decimal,
    #[serde(default)]
    pub from_warehouse_id: Option<Uuid>,
    #[serde(default)]
    pub from_position_id: Option<Uuid>,
    #[serde(default)]
    pub to_warehouse_id: Option<Uuid>,
    #[serde(default)]
    pub to_position_id: Option<Uuid>,
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
    #[serde(default)]
    pub lot_number: Option<String>,
    #[serde(default)]
    pub reference_type: Option<String>,
    #[serde(default)]
    pub reference_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Business timestamp for back-dated entries; defaults to commit time
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl MovementInput {
    fn blank(movement_type: MovementType, product_id: Uuid, quantity: Decimal) -> Self {
        Self {
            movement_type,
            product_id,
            quantity,
            from_warehouse_id: None,
            from_position_id: None,
            to_warehouse_id: None,
            to_position_id: None,
            unit_cost: None,
            lot_number: None,
            reference_type: None,
            reference_id: None,
            notes: None,
            occurred_at: None,
        }
    }

    /// Receipt of goods into a warehouse at a unit cost
    pub fn receipt(product_id: Uuid, warehouse_id: Uuid, quantity: Decimal, unit_cost: Decimal) -> Self {
        let mut input = Self::blank(MovementType::In, product_id, quantity);
        input.to_warehouse_id = Some(warehouse_id);
        input.unit_cost = Some(unit_cost);
        input
    }

    /// Goods issued out of a warehouse
    pub fn issue(product_id: Uuid, warehouse_id: Uuid, quantity: Decimal) -> Self {
        let mut input = Self::blank(MovementType::Out, product_id, quantity);
        input.from_warehouse_id = Some(warehouse_id);
        input
    }

    pub fn transfer(product_id: Uuid, from: Location, to: Location, quantity: Decimal) -> Self {
        let mut input = Self::blank(MovementType::Transfer, product_id, quantity);
        input.from_warehouse_id = Some(from.warehouse_id);
        input.from_position_id = from.position_id;
        input.to_warehouse_id = Some(to.warehouse_id);
        input.to_position_id = to.position_id;
        input
    }

    /// Signed correction applied to a warehouse
    pub fn adjustment(product_id: Uuid, warehouse_id: Uuid, delta: Decimal) -> Self {
        let mut input = Self::blank(MovementType::Adjustment, product_id, delta);
        input.to_warehouse_id = Some(warehouse_id);
        input
    }

    /// Cycle count result for a warehouse
    pub fn count(product_id: Uuid, warehouse_id: Uuid, counted: Decimal) -> Self {
        let mut input = Self::blank(MovementType::Count, product_id, counted);
        input.to_warehouse_id = Some(warehouse_id);
        input
    }

    /// Builder: pin the movement's single location to a position
    pub fn at_position(mut self, position_id: Uuid) -> Self {
        if self.movement_type == MovementType::Out {
            self.from_position_id = Some(position_id);
        } else {
            self.to_position_id = Some(position_id);
        }
        self
    }

    /// Builder: back-date the movement
    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    /// Builder: set the lot number
    pub fn with_lot(mut self, lot_number: impl Into<String>) -> Self {
        self.lot_number = Some(lot_number.into());
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    pub fn source(&self) -> Option<Location> {
        self.from_warehouse_id
            .map(|w| Location::new(w, self.from_position_id))
    }

    pub fn destination(&self) -> Option<Location> {
        self.to_warehouse_id
            .map(|w| Location::new(w, self.to_position_id))
    }
}

/// Replays movements (in commit order) and returns the product's quantity
/// held in `warehouse_id`, summed across positions.
///
/// Counts reset the counted position to the counted amount, so replay is
/// tracked per position before rolling up.
pub fn replay_pair_quantity(movements: &[Movement], product_id: Uuid, warehouse_id: Uuid) -> Decimal {
    let mut positions: HashMap<Option<Uuid>, Decimal> = HashMap::new();

    let mut ordered: Vec<&Movement> = movements
        .iter()
        .filter(|m| m.product_id == product_id && m.touches_warehouse(warehouse_id))
        .collect();
    ordered.sort_by_key(|m| m.sequence);

    for m in ordered {
        if let Some(src) = m.source().filter(|l| l.warehouse_id == warehouse_id) {
            *positions.entry(src.position_id).or_default() -= m.quantity;
        }
        if let Some(dst) = m.destination().filter(|l| l.warehouse_id == warehouse_id) {
            let slot = positions.entry(dst.position_id).or_default();
            match m.movement_type {
                MovementType::Count => *slot = m.quantity,
                _ => *slot += m.quantity,
            }
        }
    }

    positions.values().copied().sum()
}
