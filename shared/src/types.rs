//! Common keys and value types used across the ledger

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical location: a warehouse and, optionally, a position inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub warehouse_id: Uuid,
    pub position_id: Option<Uuid>,
}

impl Location {
    pub fn new(warehouse_id: Uuid, position_id: Option<Uuid>) -> Self {
        Self {
            warehouse_id,
            position_id,
        }
    }
}

/// Key of a stock level row: product at a warehouse position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub position_id: Option<Uuid>,
}

impl StockKey {
    pub fn new(product_id: Uuid, location: Location) -> Self {
        Self {
            product_id,
            warehouse_id: location.warehouse_id,
            position_id: location.position_id,
        }
    }

    /// The product × warehouse pair this row rolls up into
    pub fn pair(&self) -> PairKey {
        PairKey {
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
        }
    }
}

/// Product × warehouse pair, the grain of alerts and valuations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
}

impl PairKey {
    pub fn new(product_id: Uuid, warehouse_id: Uuid) -> Self {
        Self {
            product_id,
            warehouse_id,
        }
    }
}
