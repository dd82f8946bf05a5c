//! Stock alert tests
//!
//! One alert row per product × warehouse, flipping between active and
//! resolved as movements cross the product's thresholds.

mod common;

use common::{dec, Ledger};
use uuid::Uuid;

use stock_ledger_backend::models::{
    AlertSeverity, AlertStatus, MovementInput, PairKey, Product, StockAlert,
};
use stock_ledger_backend::store::LedgerStore;

/// Product with min stock 5 and reorder point 20
async fn thresholded_product(ledger: &Ledger) -> Uuid {
    ledger
        .product(
            Product::new("SKU-A", "Arabica beans", dec("12"))
                .with_thresholds(dec("5"), dec("20")),
        )
        .await
}

async fn alerts_for(ledger: &Ledger, product_id: Uuid, warehouse_id: Uuid) -> Vec<StockAlert> {
    ledger
        .store
        .list_alerts(None)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.product_id == product_id && a.warehouse_id == warehouse_id)
        .collect()
}

#[tokio::test]
async fn test_alert_hysteresis_keeps_one_row() {
    let ledger = Ledger::new();
    let p = thresholded_product(&ledger).await;
    let w = ledger.warehouse("W1", "1000").await;

    // 50 is above the reorder point: nothing raised
    let outcome = ledger
        .commit(vec![MovementInput::receipt(p, w, dec("50"), dec("12"))])
        .await
        .unwrap();
    assert!(outcome.alerts.is_empty());
    assert!(alerts_for(&ledger, p, w).await.is_empty());

    // Down to 10: warning
    let outcome = ledger
        .commit(vec![MovementInput::issue(p, w, dec("40"))])
        .await
        .unwrap();
    assert_eq!(outcome.alerts.len(), 1);
    let raised = outcome.alerts[0].clone();
    assert_eq!(raised.severity, AlertSeverity::Warning);
    assert_eq!(raised.status, AlertStatus::Active);
    assert_eq!(raised.current_stock, dec("10"));

    // Back up to 25: resolved, same row
    let outcome = ledger
        .commit(vec![MovementInput::receipt(p, w, dec("15"), dec("12"))])
        .await
        .unwrap();
    assert!(outcome.alerts.is_empty());

    let rows = alerts_for(&ledger, p, w).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, raised.id);
    assert_eq!(rows[0].status, AlertStatus::Resolved);
    assert!(rows[0].resolved_at.is_some());
    assert_eq!(rows[0].current_stock, dec("25"));
}

#[tokio::test]
async fn test_severity_escalates_in_place() {
    let ledger = Ledger::new();
    let p = thresholded_product(&ledger).await;
    let w = ledger.warehouse("W1", "1000").await;

    ledger
        .commit(vec![MovementInput::receipt(p, w, dec("15"), dec("12"))])
        .await
        .unwrap();
    let warning = alerts_for(&ledger, p, w).await;
    assert_eq!(warning.len(), 1);
    assert_eq!(warning[0].severity, AlertSeverity::Warning);

    let outcome = ledger
        .commit(vec![MovementInput::issue(p, w, dec("12"))])
        .await
        .unwrap();
    assert_eq!(outcome.alerts[0].severity, AlertSeverity::Critical);
    assert_eq!(outcome.alerts[0].id, warning[0].id);
    assert_eq!(alerts_for(&ledger, p, w).await.len(), 1);
}

#[tokio::test]
async fn test_resolved_alert_is_reopened() {
    let ledger = Ledger::new();
    let p = thresholded_product(&ledger).await;
    let w = ledger.warehouse("W1", "1000").await;

    ledger
        .commit(vec![MovementInput::receipt(p, w, dec("3"), dec("12"))])
        .await
        .unwrap();
    ledger
        .commit(vec![MovementInput::receipt(p, w, dec("30"), dec("12"))])
        .await
        .unwrap();
    let outcome = ledger
        .commit(vec![MovementInput::issue(p, w, dec("31"))])
        .await
        .unwrap();

    let rows = alerts_for(&ledger, p, w).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, AlertStatus::Active);
    assert_eq!(rows[0].severity, AlertSeverity::Critical);
    assert!(rows[0].resolved_at.is_none());
    assert_eq!(outcome.alerts[0].id, rows[0].id);
}

#[tokio::test]
async fn test_evaluate_is_idempotent() {
    let ledger = Ledger::new();
    let p = thresholded_product(&ledger).await;
    let w = ledger.warehouse("W1", "1000").await;
    ledger
        .commit(vec![MovementInput::receipt(p, w, dec("8"), dec("12"))])
        .await
        .unwrap();

    let engine = ledger.alerts();
    let first = engine.evaluate(p, w).await.unwrap().unwrap();
    let second = engine.evaluate(p, w).await.unwrap().unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.severity, AlertSeverity::Warning);
    assert_eq!(
        engine.list_alerts(Some(AlertStatus::Active)).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_alerts_are_per_warehouse() {
    let ledger = Ledger::new();
    let p = thresholded_product(&ledger).await;
    let w1 = ledger.warehouse("W1", "1000").await;
    let w2 = ledger.warehouse("W2", "1000").await;

    let outcome = ledger
        .commit(vec![
            MovementInput::receipt(p, w1, dec("2"), dec("12")),
            MovementInput::receipt(p, w2, dec("100"), dec("12")),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.alerts.len(), 1);
    assert_eq!(outcome.alerts[0].warehouse_id, w1);
    assert!(ledger
        .store
        .find_alert(PairKey::new(p, w2))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_list_alerts_filters_by_status() {
    let ledger = Ledger::new();
    let p = thresholded_product(&ledger).await;
    let w1 = ledger.warehouse("W1", "1000").await;
    let w2 = ledger.warehouse("W2", "1000").await;

    ledger
        .commit(vec![
            MovementInput::receipt(p, w1, dec("1"), dec("12")),
            MovementInput::receipt(p, w2, dec("1"), dec("12")),
        ])
        .await
        .unwrap();
    ledger
        .commit(vec![MovementInput::receipt(p, w2, dec("50"), dec("12"))])
        .await
        .unwrap();

    let engine = ledger.alerts();
    let active = engine.list_alerts(Some(AlertStatus::Active)).await.unwrap();
    let resolved = engine.list_alerts(Some(AlertStatus::Resolved)).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].warehouse_id, w1);
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].warehouse_id, w2);
    assert_eq!(engine.list_alerts(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_evaluate_unknown_product_is_not_found() {
    let ledger = Ledger::new();
    let w = ledger.warehouse("W1", "1000").await;
    let err = ledger.alerts().evaluate(Uuid::new_v4(), w).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}
