//! Alert engine: keeps one alert record per product × warehouse in step with
//! the pair's stock level.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    alert_message, AlertStatus, PairKey, Product, StockAlert, StockCondition,
};
use crate::store::{LedgerStore, ProductCatalog};

/// What an evaluation does to the pair's alert record
#[derive(Debug, Clone, PartialEq)]
pub enum AlertTransition {
    /// First alert ever for the pair
    Raised(StockAlert),
    /// A resolved record became active again
    Reopened(StockAlert),
    /// Active record refreshed; severity may have changed
    Updated(StockAlert),
    Resolved(StockAlert),
    /// Healthy stock and nothing active
    Unchanged,
}

impl AlertTransition {
    /// The record to persist, if any
    pub fn record(&self) -> Option<&StockAlert> {
        match self {
            AlertTransition::Raised(a)
            | AlertTransition::Reopened(a)
            | AlertTransition::Updated(a)
            | AlertTransition::Resolved(a) => Some(a),
            AlertTransition::Unchanged => None,
        }
    }
}

/// Decides the next state of a pair's alert record.
///
/// Below minimum is critical, below the reorder point is a warning, anything
/// else resolves an active record.
pub fn next_alert_state(
    existing: Option<&StockAlert>,
    product: &Product,
    warehouse_id: Uuid,
    quantity: Decimal,
    now: DateTime<Utc>,
) -> AlertTransition {
    let condition =
        StockCondition::classify(quantity, product.min_stock_level, product.reorder_point);

    match (condition.severity(), existing) {
        (Some(severity), None) => AlertTransition::Raised(StockAlert {
            id: Uuid::new_v4(),
            product_id: product.id,
            warehouse_id,
            severity,
            status: AlertStatus::Active,
            current_stock: quantity,
            min_stock_level: product.min_stock_level,
            reorder_point: product.reorder_point,
            message: alert_message(product, severity, quantity),
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }),
        (Some(severity), Some(current)) => {
            let next = StockAlert {
                severity,
                status: AlertStatus::Active,
                current_stock: quantity,
                min_stock_level: product.min_stock_level,
                reorder_point: product.reorder_point,
                message: alert_message(product, severity, quantity),
                updated_at: now,
                resolved_at: None,
                ..current.clone()
            };
            if current.status == AlertStatus::Resolved {
                AlertTransition::Reopened(next)
            } else {
                AlertTransition::Updated(next)
            }
        }
        (None, Some(current)) if current.status == AlertStatus::Active => {
            AlertTransition::Resolved(StockAlert {
                status: AlertStatus::Resolved,
                current_stock: quantity,
                updated_at: now,
                resolved_at: Some(now),
                ..current.clone()
            })
        }
        (None, _) => AlertTransition::Unchanged,
    }
}

/// Threshold alerting over the ledger store
#[derive(Clone)]
pub struct AlertEngine {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn ProductCatalog>,
}

impl AlertEngine {
    pub fn new(store: Arc<dyn LedgerStore>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Re-evaluates the pair against its product thresholds and returns the
    /// active alert, or `None` when the stock is healthy.
    pub async fn evaluate(&self, product_id: Uuid, warehouse_id: Uuid) -> AppResult<Option<StockAlert>> {
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;

        let pair = PairKey::new(product_id, warehouse_id);
        let quantity = self.store.pair_quantity(pair).await?;
        let existing = self.store.find_alert(pair).await?;

        let transition =
            next_alert_state(existing.as_ref(), &product, warehouse_id, quantity, Utc::now());

        match &transition {
            AlertTransition::Raised(a) | AlertTransition::Reopened(a) => {
                tracing::info!(
                    product_id = %product_id,
                    warehouse_id = %warehouse_id,
                    severity = a.severity.as_str(),
                    quantity = %quantity,
                    "Stock alert raised"
                );
            }
            AlertTransition::Updated(a) => {
                tracing::debug!(
                    product_id = %product_id,
                    warehouse_id = %warehouse_id,
                    severity = a.severity.as_str(),
                    quantity = %quantity,
                    "Stock alert updated"
                );
            }
            AlertTransition::Resolved(_) => {
                tracing::info!(
                    product_id = %product_id,
                    warehouse_id = %warehouse_id,
                    quantity = %quantity,
                    "Stock alert resolved"
                );
            }
            AlertTransition::Unchanged => {}
        }

        let Some(record) = transition.record() else {
            return Ok(None);
        };
        let saved = self.store.save_alert(record).await?;
        Ok((saved.status == AlertStatus::Active).then_some(saved))
    }

    pub async fn list_alerts(&self, status: Option<AlertStatus>) -> AppResult<Vec<StockAlert>> {
        self.store.list_alerts(status).await
    }
}
