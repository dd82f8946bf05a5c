//! Product catalog models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalogued product with its replenishment thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub category_id: Option<Uuid>,
    /// Current catalog price, also the fallback cost for unexplained stock
    pub unit_price: Decimal,
    pub min_stock_level: Decimal,
    pub reorder_point: Decimal,
    pub reorder_quantity: Decimal,
    /// Supplier lead time; engine default applies when absent
    pub lead_time_days: Option<u32>,
}

impl Product {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, unit_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            sku: sku.into(),
            name: name.into(),
            category_id: None,
            unit_price,
            min_stock_level: Decimal::ZERO,
            reorder_point: Decimal::ZERO,
            reorder_quantity: Decimal::ZERO,
            lead_time_days: None,
        }
    }

    /// Builder: set min stock level and reorder point
    pub fn with_thresholds(mut self, min_stock_level: Decimal, reorder_point: Decimal) -> Self {
        self.min_stock_level = min_stock_level;
        self.reorder_point = reorder_point;
        self
    }

    pub fn with_reorder_quantity(mut self, reorder_quantity: Decimal) -> Self {
        self.reorder_quantity = reorder_quantity;
        self
    }

    pub fn with_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_lead_time(mut self, days: u32) -> Self {
        self.lead_time_days = Some(days);
        self
    }

    /// Display label used in alert messages
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.sku)
    }
}
