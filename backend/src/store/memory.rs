//! In-process ledger store
//!
//! Holds the whole ledger behind one `RwLock`, so a batch commit is atomic
//! with respect to every reader.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CommittedBatch, LedgerStore, MovementQuery, PreparedBatch, ProductCatalog, StockLevelFilter,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    AlertStatus, Movement, PairKey, Position, Product, StockAlert, StockKey, StockLevel, Warehouse,
};

#[derive(Debug, Default)]
struct LedgerState {
    products: HashMap<Uuid, Product>,
    warehouses: HashMap<Uuid, Warehouse>,
    positions: HashMap<Uuid, Position>,
    levels: BTreeMap<StockKey, StockLevel>,
    movements: Vec<Movement>,
    alerts: HashMap<PairKey, StockAlert>,
    last_sequence: i64,
}

impl LedgerState {
    fn recompute_used(&mut self, warehouse_id: Uuid) -> Option<&Warehouse> {
        let used: Decimal = self
            .levels
            .values()
            .filter(|l| l.warehouse_id == warehouse_id)
            .map(|l| l.quantity)
            .sum();
        let warehouse = self.warehouses.get_mut(&warehouse_id)?;
        warehouse.used = used;
        warehouse.updated_at = Utc::now();
        Some(&*warehouse)
    }
}

/// Ledger store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<LedgerState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_product(&self, product: Product) -> Uuid {
        let id = product.id;
        self.state.write().await.products.insert(id, product);
        id
    }

    pub async fn add_warehouse(&self, warehouse: Warehouse) -> Uuid {
        let id = warehouse.id;
        self.state.write().await.warehouses.insert(id, warehouse);
        id
    }

    pub async fn add_position(&self, position: Position) -> Uuid {
        let id = position.id;
        self.state.write().await.positions.insert(id, position);
        id
    }

    /// Number of committed movements
    pub async fn movement_count(&self) -> usize {
        self.state.read().await.movements.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_warehouse(&self, id: Uuid) -> AppResult<Option<Warehouse>> {
        Ok(self.state.read().await.warehouses.get(&id).cloned())
    }

    async fn position_exists(&self, warehouse_id: Uuid, position_id: Uuid) -> AppResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .positions
            .get(&position_id)
            .is_some_and(|p| p.warehouse_id == warehouse_id))
    }

    async fn get_stock_level(&self, key: &StockKey) -> AppResult<Option<StockLevel>> {
        Ok(self.state.read().await.levels.get(key).cloned())
    }

    async fn list_stock_levels(&self, filter: StockLevelFilter) -> AppResult<Vec<StockLevel>> {
        Ok(self
            .state
            .read()
            .await
            .levels
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect())
    }

    async fn list_movements(&self, query: &MovementQuery) -> AppResult<Vec<Movement>> {
        // Appended in commit order already
        Ok(self
            .state
            .read()
            .await
            .movements
            .iter()
            .filter(|m| query.matches(m))
            .cloned()
            .collect())
    }

    async fn commit_batch(&self, batch: PreparedBatch) -> AppResult<CommittedBatch> {
        let mut state = self.state.write().await;

        // Check every guard before touching anything
        for staged in &batch.levels {
            let current = state.levels.get(&staged.key).map(|l| l.version);
            if current != staged.expected_version {
                return Err(AppError::ConcurrencyConflict {
                    product_id: staged.key.product_id,
                    warehouse_id: staged.key.warehouse_id,
                });
            }
            if staged.quantity < Decimal::ZERO {
                return Err(AppError::Internal(format!(
                    "refusing negative stock level for {:?}",
                    staged.key
                )));
            }
        }

        let now = Utc::now();
        for staged in batch.levels {
            let key = staged.key;
            state
                .levels
                .entry(key)
                .and_modify(|l| {
                    l.quantity = staged.quantity;
                    l.version += 1;
                    l.updated_at = now;
                })
                .or_insert_with(|| StockLevel {
                    product_id: key.product_id,
                    warehouse_id: key.warehouse_id,
                    position_id: key.position_id,
                    quantity: staged.quantity,
                    version: 1,
                    updated_at: now,
                });
        }

        let mut committed = Vec::with_capacity(batch.movements.len());
        for mut movement in batch.movements {
            state.last_sequence += 1;
            movement.sequence = state.last_sequence;
            state.movements.push(movement.clone());
            committed.push(movement);
        }

        let mut capacities = Vec::with_capacity(batch.warehouses.len());
        for warehouse_id in batch.warehouses {
            if let Some(warehouse) = state.recompute_used(warehouse_id) {
                capacities.push(warehouse.capacity_snapshot());
            }
        }

        Ok(CommittedBatch {
            movements: committed,
            capacities,
        })
    }

    async fn find_alert(&self, pair: PairKey) -> AppResult<Option<StockAlert>> {
        Ok(self.state.read().await.alerts.get(&pair).cloned())
    }

    async fn save_alert(&self, alert: &StockAlert) -> AppResult<StockAlert> {
        let pair = PairKey::new(alert.product_id, alert.warehouse_id);
        let mut state = self.state.write().await;
        if let Some(existing) = state.alerts.get(&pair) {
            if existing.id != alert.id {
                return Err(AppError::ConcurrencyConflict {
                    product_id: pair.product_id,
                    warehouse_id: pair.warehouse_id,
                });
            }
        }
        state.alerts.insert(pair, alert.clone());
        Ok(alert.clone())
    }

    async fn list_alerts(&self, status: Option<AlertStatus>) -> AppResult<Vec<StockAlert>> {
        let mut alerts: Vec<StockAlert> = self
            .state
            .read()
            .await
            .alerts
            .values()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(alerts)
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, category_id: Option<Uuid>) -> AppResult<Vec<Product>> {
        let mut products: Vec<Product> = self
            .state
            .read()
            .await
            .products
            .values()
            .filter(|p| category_id.map_or(true, |c| p.category_id == Some(c)))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(products)
    }
}
