//! Shared fixtures for the ledger integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use stock_ledger_backend::config::EngineSettings;
use stock_ledger_backend::error::AppResult;
use stock_ledger_backend::models::{MovementInput, PairKey, Position, Product, Warehouse};
use stock_ledger_backend::services::movement::{CommitOutcome, CommitRequest};
use stock_ledger_backend::services::{
    AlertEngine, CostingEngine, ForecastingEngine, MovementProcessor, OptimizationEngine,
};
use stock_ledger_backend::store::{LedgerStore, MemoryStore};

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Noon UTC on the given date
pub fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

pub fn days_before(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    at - Duration::days(days)
}

/// An in-memory ledger plus a caller identity
pub struct Ledger {
    pub store: Arc<MemoryStore>,
    pub user: Uuid,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            user: Uuid::new_v4(),
        }
    }

    pub async fn product(&self, product: Product) -> Uuid {
        self.store.add_product(product).await
    }

    /// A plain product priced at `unit_price` with no thresholds
    pub async fn simple_product(&self, sku: &str, unit_price: &str) -> Uuid {
        self.product(Product::new(sku, format!("Product {}", sku), dec(unit_price)))
            .await
    }

    pub async fn warehouse(&self, code: &str, capacity: &str) -> Uuid {
        self.store
            .add_warehouse(Warehouse::new(code, format!("Warehouse {}", code), dec(capacity)))
            .await
    }

    pub async fn position(&self, warehouse_id: Uuid, code: &str) -> Uuid {
        self.store.add_position(Position::new(warehouse_id, code)).await
    }

    pub fn processor(&self) -> MovementProcessor {
        MovementProcessor::new(self.store.clone(), self.store.clone())
    }

    pub fn alerts(&self) -> AlertEngine {
        AlertEngine::new(self.store.clone(), self.store.clone())
    }

    pub fn costing(&self) -> CostingEngine {
        CostingEngine::new(self.store.clone(), self.store.clone())
    }

    pub fn forecasting(&self) -> ForecastingEngine {
        ForecastingEngine::new(self.store.clone(), self.store.clone(), EngineSettings::default())
    }

    pub fn optimization(&self) -> OptimizationEngine {
        OptimizationEngine::new(self.store.clone(), self.store.clone(), EngineSettings::default())
    }

    pub async fn commit(&self, movements: Vec<MovementInput>) -> AppResult<CommitOutcome> {
        self.processor()
            .commit_movements(CommitRequest::new(movements), self.user)
            .await
    }

    pub async fn quantity(&self, product_id: Uuid, warehouse_id: Uuid) -> Decimal {
        self.store
            .pair_quantity(PairKey::new(product_id, warehouse_id))
            .await
            .unwrap()
    }
}
