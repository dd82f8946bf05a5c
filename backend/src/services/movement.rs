//! Movement processor: validates a batch of stock movements and commits it
//! as one unit of work.
//!
//! Movements apply in array order against a private copy of the affected
//! stock rows. Nothing reaches the store until the whole batch has applied
//! cleanly, and the store rejects the batch if any of those rows changed
//! underneath it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    validate_movement, Location, Movement, MovementInput, MovementType, PairKey, Product,
    StockAlert, StockKey, WarehouseCapacity, MAX_AMOUNT,
};
use crate::services::AlertEngine;
use crate::store::{LedgerStore, PreparedBatch, ProductCatalog, StagedLevel};

/// Origin stamped onto every movement of a batch that carries none itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReference {
    pub reference_type: String,
    #[serde(default)]
    pub reference_id: Option<Uuid>,
}

/// Input for committing a batch of movements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub movements: Vec<MovementInput>,
    #[serde(default)]
    pub reference: Option<BatchReference>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CommitRequest {
    pub fn new(movements: Vec<MovementInput>) -> Self {
        Self {
            movements,
            reference: None,
            notes: None,
        }
    }
}

/// Result of a committed batch
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub committed_movements: Vec<Movement>,
    /// Alerts active for the touched pairs after the commit
    pub alerts: Vec<StockAlert>,
    pub capacities: Vec<WarehouseCapacity>,
}

#[derive(Debug, Clone, Copy)]
struct TrackedLevel {
    expected_version: Option<i64>,
    quantity: Decimal,
}

/// Stock rows read and rewritten by one batch, plus the movements that
/// rewrote them
#[derive(Debug, Default)]
pub struct UnitOfWork {
    levels: BTreeMap<StockKey, TrackedLevel>,
    movements: Vec<Movement>,
    pairs: BTreeSet<PairKey>,
    warehouses: BTreeSet<Uuid>,
}

impl UnitOfWork {
    /// Current quantity at `key` as seen by this batch so far
    async fn quantity(&mut self, store: &dyn LedgerStore, key: StockKey) -> AppResult<Decimal> {
        if let Some(tracked) = self.levels.get(&key) {
            return Ok(tracked.quantity);
        }
        let level = store.get_stock_level(&key).await?;
        let tracked = TrackedLevel {
            expected_version: level.as_ref().map(|l| l.version),
            quantity: level.map(|l| l.quantity).unwrap_or(Decimal::ZERO),
        };
        self.levels.insert(key, tracked);
        Ok(tracked.quantity)
    }

    fn stage(&mut self, key: StockKey, quantity: Decimal) {
        if let Some(tracked) = self.levels.get_mut(&key) {
            tracked.quantity = quantity;
        }
        self.pairs.insert(key.pair());
        self.warehouses.insert(key.warehouse_id);
    }

    /// Removes `quantity` from `location`, refusing to go below zero
    async fn withdraw(
        &mut self,
        store: &dyn LedgerStore,
        index: usize,
        product_id: Uuid,
        location: Location,
        quantity: Decimal,
    ) -> AppResult<()> {
        let key = StockKey::new(product_id, location);
        let available = self.quantity(store, key).await?;
        if available < quantity {
            return Err(AppError::InsufficientStock {
                index,
                product_id,
                warehouse_id: location.warehouse_id,
                available,
                requested: quantity,
            });
        }
        self.stage(key, available - quantity);
        Ok(())
    }

    /// Adds `quantity` at `location`, refusing levels beyond the stored range
    async fn deposit(
        &mut self,
        store: &dyn LedgerStore,
        index: usize,
        product_id: Uuid,
        location: Location,
        quantity: Decimal,
    ) -> AppResult<()> {
        let key = StockKey::new(product_id, location);
        let current = self.quantity(store, key).await?;
        let level = current
            .checked_add(quantity)
            .filter(|level| *level <= MAX_AMOUNT)
            .ok_or_else(|| {
                AppError::validation(
                    format!("movements[{}].quantity", index),
                    format!("stock level would exceed {}", MAX_AMOUNT),
                )
            })?;
        self.stage(key, level);
        Ok(())
    }

    /// Applies one validated movement to the staged rows
    async fn apply(&mut self, store: &dyn LedgerStore, index: usize, movement: &Movement) -> AppResult<()> {
        let product_id = movement.product_id;
        match (movement.movement_type, movement.source(), movement.destination()) {
            (MovementType::In, _, Some(to)) => {
                self.deposit(store, index, product_id, to, movement.quantity).await?;
            }
            (MovementType::Out, Some(from), _) => {
                self.withdraw(store, index, product_id, from, movement.quantity).await?;
            }
            (MovementType::Transfer, Some(from), Some(to)) => {
                self.withdraw(store, index, product_id, from, movement.quantity).await?;
                self.deposit(store, index, product_id, to, movement.quantity).await?;
            }
            (MovementType::Adjustment, _, Some(to)) => {
                if movement.quantity < Decimal::ZERO {
                    self.withdraw(store, index, product_id, to, -movement.quantity).await?;
                } else {
                    self.deposit(store, index, product_id, to, movement.quantity).await?;
                }
            }
            (MovementType::Count, _, Some(to)) => {
                let key = StockKey::new(product_id, to);
                let current = self.quantity(store, key).await?;
                tracing::debug!(
                    product_id = %product_id,
                    warehouse_id = %to.warehouse_id,
                    counted = %movement.quantity,
                    delta = %(movement.quantity - current),
                    "Cycle count applied"
                );
                self.stage(key, movement.quantity);
            }
            (kind, _, _) => {
                return Err(AppError::validation(
                    format!("movements[{}]", index),
                    format!("{} movement is missing a location", kind),
                ));
            }
        }
        self.movements.push(movement.clone());
        Ok(())
    }

    /// Distinct product × warehouse pairs this batch changes
    pub fn touched_pairs(&self) -> impl Iterator<Item = &PairKey> {
        self.pairs.iter()
    }

    pub fn movement_count(&self) -> usize {
        self.movements.len()
    }

    fn into_batch(self) -> PreparedBatch {
        PreparedBatch {
            movements: self.movements,
            levels: self
                .levels
                .into_iter()
                .map(|(key, tracked)| StagedLevel {
                    key,
                    expected_version: tracked.expected_version,
                    quantity: tracked.quantity,
                })
                .collect(),
            warehouses: self.warehouses.into_iter().collect(),
        }
    }
}

/// Validates and commits movement batches
#[derive(Clone)]
pub struct MovementProcessor {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn ProductCatalog>,
}

impl MovementProcessor {
    pub fn new(store: Arc<dyn LedgerStore>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Validates the batch and applies it to a fresh unit of work.
    /// Nothing is written.
    pub async fn prepare(&self, request: CommitRequest, created_by: Uuid) -> AppResult<UnitOfWork> {
        if request.movements.is_empty() {
            return Err(AppError::validation(
                "movements",
                "A batch must contain at least one movement",
            ));
        }

        for (index, input) in request.movements.iter().enumerate() {
            validate_movement(input).map_err(|e| AppError::invalid_movement(index, e))?;
        }

        self.check_references(&request.movements).await?;

        let now = Utc::now();
        let store = self.store.as_ref();
        let mut uow = UnitOfWork::default();
        for (index, input) in request.movements.into_iter().enumerate() {
            let movement = build_movement(input, request.reference.as_ref(), request.notes.as_deref(), created_by, now);
            uow.apply(store, index, &movement).await?;
        }
        Ok(uow)
    }

    /// Hands a prepared unit of work to the store, then re-evaluates alerts
    /// for every pair it touched
    pub async fn commit(&self, uow: UnitOfWork) -> AppResult<CommitOutcome> {
        let pairs: Vec<PairKey> = uow.touched_pairs().copied().collect();
        let committed = self.store.commit_batch(uow.into_batch()).await?;

        tracing::info!(
            movements = committed.movements.len(),
            pairs = pairs.len(),
            "Movement batch committed"
        );

        // The batch is durable from here on; alert failures are only logged
        let alert_engine = AlertEngine::new(self.store.clone(), self.catalog.clone());
        let mut alerts = Vec::new();
        for pair in pairs {
            match alert_engine.evaluate(pair.product_id, pair.warehouse_id).await {
                Ok(Some(alert)) => alerts.push(alert),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        product_id = %pair.product_id,
                        warehouse_id = %pair.warehouse_id,
                        "Alert evaluation failed after commit: {}",
                        e
                    );
                }
            }
        }

        Ok(CommitOutcome {
            committed_movements: committed.movements,
            alerts,
            capacities: committed.capacities,
        })
    }

    /// Validates, applies and commits a batch atomically
    pub async fn commit_movements(&self, request: CommitRequest, created_by: Uuid) -> AppResult<CommitOutcome> {
        let batch_size = request.movements.len();
        let uow = match self.prepare(request, created_by).await {
            Ok(uow) => uow,
            Err(e) => {
                tracing::warn!(batch_size, code = e.code(), "Movement batch rejected: {}", e);
                return Err(e);
            }
        };
        self.commit(uow).await.map_err(|e| {
            tracing::warn!(batch_size, code = e.code(), "Movement batch commit failed: {}", e);
            e
        })
    }

    /// Ensures every referenced product, warehouse and position exists
    async fn check_references(&self, inputs: &[MovementInput]) -> AppResult<()> {
        let mut products: HashMap<Uuid, Product> = HashMap::new();
        let mut warehouses: BTreeSet<Uuid> = BTreeSet::new();
        let mut positions: BTreeSet<(Uuid, Uuid)> = BTreeSet::new();

        for input in inputs {
            if !products.contains_key(&input.product_id) {
                let product = self
                    .catalog
                    .get_product(input.product_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Product {}", input.product_id)))?;
                products.insert(product.id, product);
            }

            for location in [input.source(), input.destination()].into_iter().flatten() {
                if warehouses.insert(location.warehouse_id)
                    && self.store.get_warehouse(location.warehouse_id).await?.is_none()
                {
                    return Err(AppError::NotFound(format!("Warehouse {}", location.warehouse_id)));
                }
                if let Some(position_id) = location.position_id {
                    if positions.insert((location.warehouse_id, position_id))
                        && !self.store.position_exists(location.warehouse_id, position_id).await?
                    {
                        return Err(AppError::NotFound(format!(
                            "Position {} in warehouse {}",
                            position_id, location.warehouse_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn build_movement(
    input: MovementInput,
    reference: Option<&BatchReference>,
    notes: Option<&str>,
    created_by: Uuid,
    now: chrono::DateTime<Utc>,
) -> Movement {
    let (reference_type, reference_id) = match (input.reference_type, reference) {
        (Some(own), _) => (Some(own), input.reference_id),
        (None, Some(batch)) => (Some(batch.reference_type.clone()), batch.reference_id),
        (None, None) => (None, input.reference_id),
    };

    Movement {
        id: Uuid::new_v4(),
        sequence: 0,
        movement_type: input.movement_type,
        product_id: input.product_id,
        quantity: input.quantity,
        from_warehouse_id: input.from_warehouse_id,
        from_position_id: input.from_position_id,
        to_warehouse_id: input.to_warehouse_id,
        to_position_id: input.to_position_id,
        unit_cost: input.unit_cost,
        lot_number: input.lot_number,
        reference_type,
        reference_id,
        notes: input.notes.or_else(|| notes.map(str::to_string)),
        created_by,
        created_at: input.occurred_at.unwrap_or(now),
    }
}
