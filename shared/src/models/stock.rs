//! Stock level and warehouse models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::StockKey;

/// Derived quantity of a product at a warehouse position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub position_id: Option<Uuid>,
    /// Never negative
    pub quantity: Decimal,
    /// Optimistic concurrency token, bumped on every write
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl StockLevel {
    pub fn key(&self) -> StockKey {
        StockKey {
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            position_id: self.position_id,
        }
    }
}

/// A storage site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    /// Total storable units
    pub capacity: Decimal,
    /// Sum of all stock levels held here, recomputed after each commit
    pub used: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Warehouse {
    pub fn new(code: impl Into<String>, name: impl Into<String>, capacity: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            capacity,
            used: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn capacity_snapshot(&self) -> WarehouseCapacity {
        WarehouseCapacity::new(self.id, self.capacity, self.used)
    }
}

/// A bin, shelf or zone inside a warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub code: String,
}

impl Position {
    pub fn new(warehouse_id: Uuid, code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            warehouse_id,
            code: code.into(),
        }
    }
}

/// Warehouse utilization after a commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseCapacity {
    pub warehouse_id: Uuid,
    pub total: Decimal,
    pub used: Decimal,
    pub available: Decimal,
    pub utilization_percent: Decimal,
}

impl WarehouseCapacity {
    pub fn new(warehouse_id: Uuid, total: Decimal, used: Decimal) -> Self {
        let utilization_percent = if total > Decimal::ZERO {
            (used / total * Decimal::from(100)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        Self {
            warehouse_id,
            total,
            used,
            available: (total - used).max(Decimal::ZERO),
            utilization_percent,
        }
    }
}
