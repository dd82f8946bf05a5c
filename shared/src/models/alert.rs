//! Stock alert models and the threshold decision table

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "warning" => Some(AlertSeverity::Warning),
            "critical" => Some(AlertSeverity::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AlertStatus::Active),
            "resolved" => Some(AlertStatus::Resolved),
            _ => None,
        }
    }
}

/// The single alert record kept per product × warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlert {
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub current_stock: Decimal,
    pub min_stock_level: Decimal,
    pub reorder_point: Decimal,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Outcome of checking a quantity against a product's thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockCondition {
    /// Below the minimum stock level
    Critical,
    /// At or above the minimum, below the reorder point
    BelowReorderPoint,
    /// At or above the reorder point
    Healthy,
}

impl StockCondition {
    /// First match wins: critical, then warning, then healthy
    pub fn classify(quantity: Decimal, min_stock_level: Decimal, reorder_point: Decimal) -> Self {
        if quantity < min_stock_level {
            StockCondition::Critical
        } else if quantity < reorder_point {
            StockCondition::BelowReorderPoint
        } else {
            StockCondition::Healthy
        }
    }

    pub fn severity(&self) -> Option<AlertSeverity> {
        match self {
            StockCondition::Critical => Some(AlertSeverity::Critical),
            StockCondition::BelowReorderPoint => Some(AlertSeverity::Warning),
            StockCondition::Healthy => None,
        }
    }
}

/// Human readable alert text for a product
pub fn alert_message(product: &Product, severity: AlertSeverity, quantity: Decimal) -> String {
    match severity {
        AlertSeverity::Critical => format!(
            "{} is critically low: {} on hand, minimum {}",
            product.label(),
            quantity.normalize(),
            product.min_stock_level.normalize()
        ),
        AlertSeverity::Warning => format!(
            "{} is below its reorder point: {} on hand, reorder at {}",
            product.label(),
            quantity.normalize(),
            product.reorder_point.normalize()
        ),
    }
}
