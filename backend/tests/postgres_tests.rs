//! PostgreSQL store tests
//!
//! Need a scratch database in `DATABASE_URL`; run with `--ignored`.

mod common;

use std::sync::Arc;

use common::dec;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use stock_ledger_backend::error::AppError;
use stock_ledger_backend::models::{AlertStatus, CostingMethod, MovementInput, PairKey};
use stock_ledger_backend::services::movement::CommitRequest;
use stock_ledger_backend::services::{CostingEngine, MovementProcessor};
use stock_ledger_backend::store::{LedgerStore, PgStore};

async fn connect() -> Arc<PgStore> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .unwrap();
    let store = PgStore::new(pool.clone());
    store.migrate().await.unwrap();
    Arc::new(store)
}

/// Inserts a thresholded product and a warehouse with unique codes
async fn seed(store: &PgStore) -> (Uuid, Uuid) {
    let product_id = Uuid::new_v4();
    let warehouse_id = Uuid::new_v4();
    let suffix = &product_id.simple().to_string()[..8];

    sqlx::query(
        "INSERT INTO products (id, sku, name, unit_price, min_stock_level, reorder_point) \
         VALUES ($1, $2, 'Pg beans', 15, 5, 20)",
    )
    .bind(product_id)
    .bind(format!("PG-{}", suffix))
    .execute(store.pool())
    .await
    .unwrap();

    sqlx::query("INSERT INTO warehouses (id, code, name, capacity) VALUES ($1, $2, 'Pg warehouse', 1000)")
        .bind(warehouse_id)
        .bind(format!("PGW-{}", suffix))
        .execute(store.pool())
        .await
        .unwrap();

    (product_id, warehouse_id)
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_commit_and_value() {
    let store = connect().await;
    let (p, w) = seed(&store).await;
    let processor = MovementProcessor::new(store.clone(), store.clone());
    let user = Uuid::new_v4();

    processor
        .commit_movements(
            CommitRequest::new(vec![
                MovementInput::receipt(p, w, dec("100"), dec("10")),
                MovementInput::receipt(p, w, dec("50"), dec("12")),
                MovementInput::issue(p, w, dec("120")),
            ]),
            user,
        )
        .await
        .unwrap();

    assert_eq!(store.pair_quantity(PairKey::new(p, w)).await.unwrap(), dec("30"));
    let warehouse = store.get_warehouse(w).await.unwrap().unwrap();
    assert_eq!(warehouse.used, dec("30"));

    let costing = CostingEngine::new(store.clone(), store.clone());
    let fifo = costing.value(p, w, CostingMethod::Fifo, None, None).await.unwrap();
    assert_eq!(fifo.total_value, dec("300"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_stale_version_conflicts() {
    let store = connect().await;
    let (p, w) = seed(&store).await;
    let processor = MovementProcessor::new(store.clone(), store.clone());
    let user = Uuid::new_v4();

    processor
        .commit_movements(CommitRequest::new(vec![MovementInput::receipt(p, w, dec("100"), dec("1"))]), user)
        .await
        .unwrap();

    let first = processor
        .prepare(CommitRequest::new(vec![MovementInput::issue(p, w, dec("70"))]), user)
        .await
        .unwrap();
    let second = processor
        .prepare(CommitRequest::new(vec![MovementInput::issue(p, w, dec("70"))]), user)
        .await
        .unwrap();

    processor.commit(first).await.unwrap();
    assert!(matches!(
        processor.commit(second).await,
        Err(AppError::ConcurrencyConflict { .. })
    ));
    assert_eq!(store.pair_quantity(PairKey::new(p, w)).await.unwrap(), dec("30"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_alert_row_is_reused() {
    let store = connect().await;
    let (p, w) = seed(&store).await;
    let processor = MovementProcessor::new(store.clone(), store.clone());
    let user = Uuid::new_v4();

    for movement in [
        MovementInput::receipt(p, w, dec("50"), dec("1")),
        MovementInput::issue(p, w, dec("40")),
        MovementInput::receipt(p, w, dec("15"), dec("1")),
    ] {
        processor
            .commit_movements(CommitRequest::new(vec![movement]), user)
            .await
            .unwrap();
    }

    let alert = store.find_alert(PairKey::new(p, w)).await.unwrap().unwrap();
    assert_eq!(alert.status, AlertStatus::Resolved);
    let rows: Vec<_> = store
        .list_alerts(None)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.product_id == p && a.warehouse_id == w)
        .collect();
    assert_eq!(rows.len(), 1);
}
