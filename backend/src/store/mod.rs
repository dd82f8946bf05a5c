//! Persistence seams for the ledger
//!
//! Engines only talk to [`LedgerStore`] and [`ProductCatalog`]; the backing
//! implementation is chosen at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    AlertStatus, Movement, MovementType, PairKey, Product, StockAlert, StockKey, StockLevel,
    Warehouse, WarehouseCapacity,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Filter for stock level listings; `None` fields match everything
#[derive(Debug, Clone, Copy, Default)]
pub struct StockLevelFilter {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
}

impl StockLevelFilter {
    pub fn pair(pair: PairKey) -> Self {
        Self {
            product_id: Some(pair.product_id),
            warehouse_id: Some(pair.warehouse_id),
        }
    }

    pub fn warehouse(warehouse_id: Uuid) -> Self {
        Self {
            product_id: None,
            warehouse_id: Some(warehouse_id),
        }
    }

    pub fn matches(&self, level: &StockLevel) -> bool {
        self.product_id.map_or(true, |p| p == level.product_id)
            && self.warehouse_id.map_or(true, |w| w == level.warehouse_id)
    }
}

/// Movement history query; results come back in commit order
#[derive(Debug, Clone, Default)]
pub struct MovementQuery {
    pub product_id: Option<Uuid>,
    /// Matches movements touching the warehouse on either side
    pub warehouse_id: Option<Uuid>,
    /// Empty means every type
    pub kinds: Vec<MovementType>,
    /// Inclusive lower bound on `created_at`
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub until: Option<DateTime<Utc>>,
}

impl MovementQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product(mut self, product_id: Uuid) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn warehouse(mut self, warehouse_id: Uuid) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn for_pair(self, pair: PairKey) -> Self {
        self.product(pair.product_id).warehouse(pair.warehouse_id)
    }

    pub fn kinds(mut self, kinds: &[MovementType]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn matches(&self, movement: &Movement) -> bool {
        self.product_id.map_or(true, |p| p == movement.product_id)
            && self.warehouse_id.map_or(true, |w| movement.touches_warehouse(w))
            && (self.kinds.is_empty() || self.kinds.contains(&movement.movement_type))
            && self.since.map_or(true, |s| movement.created_at >= s)
            && self.until.map_or(true, |u| movement.created_at <= u)
    }
}

/// New quantity for one stock row, guarded by the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct StagedLevel {
    pub key: StockKey,
    /// `None` means the row must not exist yet
    pub expected_version: Option<i64>,
    pub quantity: Decimal,
}

/// Everything one batch writes, handed to the store in a single call
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    /// `sequence` is assigned by the store on commit
    pub movements: Vec<Movement>,
    pub levels: Vec<StagedLevel>,
    /// Warehouses whose `used` must be recomputed
    pub warehouses: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommittedBatch {
    pub movements: Vec<Movement>,
    pub capacities: Vec<WarehouseCapacity>,
}

/// Durable movement ledger plus its derived aggregates
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Connectivity check for health reporting
    async fn ping(&self) -> AppResult<()>;

    async fn get_warehouse(&self, id: Uuid) -> AppResult<Option<Warehouse>>;

    /// Whether `position_id` exists and belongs to `warehouse_id`
    async fn position_exists(&self, warehouse_id: Uuid, position_id: Uuid) -> AppResult<bool>;

    async fn get_stock_level(&self, key: &StockKey) -> AppResult<Option<StockLevel>>;

    async fn list_stock_levels(&self, filter: StockLevelFilter) -> AppResult<Vec<StockLevel>>;

    async fn list_movements(&self, query: &MovementQuery) -> AppResult<Vec<Movement>>;

    /// Atomically appends the movements, writes the staged levels and
    /// recomputes capacity. Fails with `ConcurrencyConflict` without writing
    /// anything if any staged row's version moved since it was read.
    async fn commit_batch(&self, batch: PreparedBatch) -> AppResult<CommittedBatch>;

    async fn find_alert(&self, pair: PairKey) -> AppResult<Option<StockAlert>>;

    /// Persists the pair's single alert row, inserting it on first save
    async fn save_alert(&self, alert: &StockAlert) -> AppResult<StockAlert>;

    async fn list_alerts(&self, status: Option<AlertStatus>) -> AppResult<Vec<StockAlert>>;

    /// Current quantity of a product in a warehouse, summed over positions
    async fn pair_quantity(&self, pair: PairKey) -> AppResult<Decimal> {
        let levels = self.list_stock_levels(StockLevelFilter::pair(pair)).await?;
        Ok(levels.iter().map(|l| l.quantity).sum())
    }
}

/// Read-only product master data
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>>;

    async fn list_products(&self, category_id: Option<Uuid>) -> AppResult<Vec<Product>>;
}
