//! PostgreSQL ledger store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    CommittedBatch, LedgerStore, MovementQuery, PreparedBatch, ProductCatalog, StockLevelFilter,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    AlertSeverity, AlertStatus, Movement, MovementType, PairKey, Product, StockAlert, StockKey,
    StockLevel, Warehouse,
};

const MOVEMENT_COLUMNS: &str = "id, sequence, movement_type, product_id, quantity, \
     from_warehouse_id, from_position_id, to_warehouse_id, to_position_id, unit_cost, \
     lot_number, reference_type, reference_id, notes, created_by, created_at";

const ALERT_COLUMNS: &str = "id, product_id, warehouse_id, severity, status, current_stock, \
     min_stock_level, reorder_point, message, created_at, updated_at, resolved_at";

const LEVEL_COLUMNS: &str =
    "product_id, warehouse_id, position_id, quantity, version, updated_at";

/// Ledger store backed by a Postgres pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[derive(FromRow)]
struct MovementRow {
    id: Uuid,
    sequence: i64,
    movement_type: String,
    product_id: Uuid,
    quantity: Decimal,
    from_warehouse_id: Option<Uuid>,
    from_position_id: Option<Uuid>,
    to_warehouse_id: Option<Uuid>,
    to_position_id: Option<Uuid>,
    unit_cost: Option<Decimal>,
    lot_number: Option<String>,
    reference_type: Option<String>,
    reference_id: Option<Uuid>,
    notes: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement_type = MovementType::parse(&row.movement_type).ok_or_else(|| {
            AppError::Internal(format!("unknown movement type '{}'", row.movement_type))
        })?;
        Ok(Movement {
            id: row.id,
            sequence: row.sequence,
            movement_type,
            product_id: row.product_id,
            quantity: row.quantity,
            from_warehouse_id: row.from_warehouse_id,
            from_position_id: row.from_position_id,
            to_warehouse_id: row.to_warehouse_id,
            to_position_id: row.to_position_id,
            unit_cost: row.unit_cost,
            lot_number: row.lot_number,
            reference_type: row.reference_type,
            reference_id: row.reference_id,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct LevelRow {
    product_id: Uuid,
    warehouse_id: Uuid,
    position_id: Option<Uuid>,
    quantity: Decimal,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl From<LevelRow> for StockLevel {
    fn from(row: LevelRow) -> Self {
        StockLevel {
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            position_id: row.position_id,
            quantity: row.quantity,
            version: row.version,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct WarehouseRow {
    id: Uuid,
    code: String,
    name: String,
    capacity: Decimal,
    used: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: row.id,
            code: row.code,
            name: row.name,
            capacity: row.capacity,
            used: row.used,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct AlertRow {
    id: Uuid,
    product_id: Uuid,
    warehouse_id: Uuid,
    severity: String,
    status: String,
    current_stock: Decimal,
    min_stock_level: Decimal,
    reorder_point: Decimal,
    message: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<AlertRow> for StockAlert {
    type Error = AppError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let severity = AlertSeverity::parse(&row.severity)
            .ok_or_else(|| AppError::Internal(format!("unknown alert severity '{}'", row.severity)))?;
        let status = AlertStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("unknown alert status '{}'", row.status)))?;
        Ok(StockAlert {
            id: row.id,
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            severity,
            status,
            current_stock: row.current_stock,
            min_stock_level: row.min_stock_level,
            reorder_point: row.reorder_point,
            message: row.message,
            created_at: row.created_at,
            updated_at: row.updated_at,
            resolved_at: row.resolved_at,
        })
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    category_id: Option<Uuid>,
    unit_price: Decimal,
    min_stock_level: Decimal,
    reorder_point: Decimal,
    reorder_quantity: Decimal,
    lead_time_days: Option<i32>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            category_id: row.category_id,
            unit_price: row.unit_price,
            min_stock_level: row.min_stock_level,
            reorder_point: row.reorder_point,
            reorder_quantity: row.reorder_quantity,
            lead_time_days: row.lead_time_days.and_then(|d| u32::try_from(d).ok()),
        }
    }
}

fn conflict(key: &StockKey) -> AppError {
    AppError::ConcurrencyConflict {
        product_id: key.product_id,
        warehouse_id: key.warehouse_id,
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn get_warehouse(&self, id: Uuid) -> AppResult<Option<Warehouse>> {
        let row = sqlx::query_as::<_, WarehouseRow>(
            "SELECT id, code, name, capacity, used, updated_at FROM warehouses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Warehouse::from))
    }

    async fn position_exists(&self, warehouse_id: Uuid, position_id: Uuid) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM warehouse_positions WHERE id = $1 AND warehouse_id = $2)",
        )
        .bind(position_id)
        .bind(warehouse_id)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn get_stock_level(&self, key: &StockKey) -> AppResult<Option<StockLevel>> {
        let row = sqlx::query_as::<_, LevelRow>(&format!(
            "SELECT {LEVEL_COLUMNS} FROM stock_levels \
             WHERE product_id = $1 AND warehouse_id = $2 AND position_id IS NOT DISTINCT FROM $3"
        ))
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .bind(key.position_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(StockLevel::from))
    }

    async fn list_stock_levels(&self, filter: StockLevelFilter) -> AppResult<Vec<StockLevel>> {
        let rows = sqlx::query_as::<_, LevelRow>(&format!(
            "SELECT {LEVEL_COLUMNS} FROM stock_levels \
             WHERE ($1::uuid IS NULL OR product_id = $1) \
               AND ($2::uuid IS NULL OR warehouse_id = $2) \
             ORDER BY warehouse_id, product_id, position_id NULLS FIRST"
        ))
        .bind(filter.product_id)
        .bind(filter.warehouse_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(StockLevel::from).collect())
    }

    async fn list_movements(&self, query: &MovementQuery) -> AppResult<Vec<Movement>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE TRUE"));

        if let Some(product_id) = query.product_id {
            builder.push(" AND product_id = ").push_bind(product_id);
        }
        if let Some(warehouse_id) = query.warehouse_id {
            builder
                .push(" AND (from_warehouse_id = ")
                .push_bind(warehouse_id)
                .push(" OR to_warehouse_id = ")
                .push_bind(warehouse_id)
                .push(")");
        }
        if !query.kinds.is_empty() {
            let kinds: Vec<&str> = query.kinds.iter().map(|k| k.as_str()).collect();
            builder.push(" AND movement_type = ANY(").push_bind(kinds).push(")");
        }
        if let Some(since) = query.since {
            builder.push(" AND created_at >= ").push_bind(since);
        }
        if let Some(until) = query.until {
            builder.push(" AND created_at <= ").push_bind(until);
        }
        builder.push(" ORDER BY sequence");

        let rows = builder
            .build_query_as::<MovementRow>()
            .fetch_all(&self.db)
            .await?;
        rows.into_iter().map(Movement::try_from).collect()
    }

    async fn commit_batch(&self, batch: PreparedBatch) -> AppResult<CommittedBatch> {
        let mut tx = self.db.begin().await?;

        for staged in &batch.levels {
            let affected = match staged.expected_version {
                Some(version) => sqlx::query(
                    "UPDATE stock_levels SET quantity = $1, version = version + 1, updated_at = NOW() \
                     WHERE product_id = $2 AND warehouse_id = $3 \
                       AND position_id IS NOT DISTINCT FROM $4 AND version = $5",
                )
                .bind(staged.quantity)
                .bind(staged.key.product_id)
                .bind(staged.key.warehouse_id)
                .bind(staged.key.position_id)
                .bind(version)
                .execute(&mut *tx)
                .await?
                .rows_affected(),
                None => sqlx::query(
                    "INSERT INTO stock_levels (product_id, warehouse_id, position_id, quantity, version) \
                     VALUES ($1, $2, $3, $4, 1) ON CONFLICT DO NOTHING",
                )
                .bind(staged.key.product_id)
                .bind(staged.key.warehouse_id)
                .bind(staged.key.position_id)
                .bind(staged.quantity)
                .execute(&mut *tx)
                .await?
                .rows_affected(),
            };
            if affected == 0 {
                // Dropping the transaction rolls everything back
                return Err(conflict(&staged.key));
            }
        }

        let mut movements = Vec::with_capacity(batch.movements.len());
        for movement in batch.movements {
            let row = sqlx::query_as::<_, MovementRow>(&format!(
                "INSERT INTO stock_movements (
                    id, movement_type, product_id, quantity,
                    from_warehouse_id, from_position_id, to_warehouse_id, to_position_id,
                    unit_cost, lot_number, reference_type, reference_id, notes, created_by, created_at
                 )
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                 RETURNING {MOVEMENT_COLUMNS}"
            ))
            .bind(movement.id)
            .bind(movement.movement_type.as_str())
            .bind(movement.product_id)
            .bind(movement.quantity)
            .bind(movement.from_warehouse_id)
            .bind(movement.from_position_id)
            .bind(movement.to_warehouse_id)
            .bind(movement.to_position_id)
            .bind(movement.unit_cost)
            .bind(&movement.lot_number)
            .bind(&movement.reference_type)
            .bind(movement.reference_id)
            .bind(&movement.notes)
            .bind(movement.created_by)
            .bind(movement.created_at)
            .fetch_one(&mut *tx)
            .await?;
            movements.push(Movement::try_from(row)?);
        }

        let mut capacities = Vec::with_capacity(batch.warehouses.len());
        for warehouse_id in &batch.warehouses {
            let row = sqlx::query_as::<_, WarehouseRow>(
                "UPDATE warehouses
                 SET used = (SELECT COALESCE(SUM(quantity), 0) FROM stock_levels WHERE warehouse_id = $1),
                     updated_at = NOW()
                 WHERE id = $1
                 RETURNING id, code, name, capacity, used, updated_at",
            )
            .bind(warehouse_id)
            .fetch_optional(&mut *tx)
            .await?;
            if let Some(row) = row {
                capacities.push(Warehouse::from(row).capacity_snapshot());
            }
        }

        tx.commit().await?;

        Ok(CommittedBatch {
            movements,
            capacities,
        })
    }

    async fn find_alert(&self, pair: PairKey) -> AppResult<Option<StockAlert>> {
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {ALERT_COLUMNS} FROM stock_alerts WHERE product_id = $1 AND warehouse_id = $2"
        ))
        .bind(pair.product_id)
        .bind(pair.warehouse_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(StockAlert::try_from).transpose()
    }

    async fn save_alert(&self, alert: &StockAlert) -> AppResult<StockAlert> {
        let updated = sqlx::query_as::<_, AlertRow>(&format!(
            "UPDATE stock_alerts
             SET severity = $2, status = $3, current_stock = $4, min_stock_level = $5,
                 reorder_point = $6, message = $7, updated_at = $8, resolved_at = $9
             WHERE id = $1
             RETURNING {ALERT_COLUMNS}"
        ))
        .bind(alert.id)
        .bind(alert.severity.as_str())
        .bind(alert.status.as_str())
        .bind(alert.current_stock)
        .bind(alert.min_stock_level)
        .bind(alert.reorder_point)
        .bind(&alert.message)
        .bind(alert.updated_at)
        .bind(alert.resolved_at)
        .fetch_optional(&self.db)
        .await?;

        if let Some(row) = updated {
            return StockAlert::try_from(row);
        }

        let inserted = sqlx::query_as::<_, AlertRow>(&format!(
            "INSERT INTO stock_alerts (
                id, product_id, warehouse_id, severity, status, current_stock,
                min_stock_level, reorder_point, message, created_at, updated_at, resolved_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {ALERT_COLUMNS}"
        ))
        .bind(alert.id)
        .bind(alert.product_id)
        .bind(alert.warehouse_id)
        .bind(alert.severity.as_str())
        .bind(alert.status.as_str())
        .bind(alert.current_stock)
        .bind(alert.min_stock_level)
        .bind(alert.reorder_point)
        .bind(&alert.message)
        .bind(alert.created_at)
        .bind(alert.updated_at)
        .bind(alert.resolved_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            // Another request created the pair's row first
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::ConcurrencyConflict {
                    product_id: alert.product_id,
                    warehouse_id: alert.warehouse_id,
                }
            }
            other => AppError::Database(other),
        })?;

        StockAlert::try_from(inserted)
    }

    async fn list_alerts(&self, status: Option<AlertStatus>) -> AppResult<Vec<StockAlert>> {
        let rows = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {ALERT_COLUMNS} FROM stock_alerts
             WHERE ($1::text IS NULL OR status = $1)
             ORDER BY updated_at DESC"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(StockAlert::try_from).collect()
    }

    async fn pair_quantity(&self, pair: PairKey) -> AppResult<Decimal> {
        let total = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(quantity), 0) FROM stock_levels WHERE product_id = $1 AND warehouse_id = $2",
        )
        .bind(pair.product_id)
        .bind(pair.warehouse_id)
        .fetch_one(&self.db)
        .await?;
        Ok(total)
    }
}

#[async_trait]
impl ProductCatalog for PgStore {
    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, sku, name, category_id, unit_price, min_stock_level, reorder_point,
                    reorder_quantity, lead_time_days
             FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Product::from))
    }

    async fn list_products(&self, category_id: Option<Uuid>) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, sku, name, category_id, unit_price, min_stock_level, reorder_point,
                    reorder_quantity, lead_time_days
             FROM products
             WHERE ($1::uuid IS NULL OR category_id = $1)
             ORDER BY sku",
        )
        .bind(category_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }
}
