//! Movement processor tests
//!
//! Covers batch validation, atomic commit of stock levels and capacity,
//! optimistic concurrency and conservation of quantity.

mod common;

use common::{dec, Ledger};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use stock_ledger_backend::error::AppError;
use stock_ledger_backend::models::{
    replay_pair_quantity, Location, MovementInput, MovementType, PairKey, MAX_AMOUNT,
};
use stock_ledger_backend::services::movement::{BatchReference, CommitRequest};
use stock_ledger_backend::store::{LedgerStore, MovementQuery};

// ============================================================================
// Commit path
// ============================================================================

#[tokio::test]
async fn test_receipt_updates_level_and_capacity() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;

    let outcome = ledger
        .commit(vec![MovementInput::receipt(p, w, dec("250"), dec("10"))])
        .await
        .unwrap();

    assert_eq!(outcome.committed_movements.len(), 1);
    assert_eq!(outcome.committed_movements[0].created_by, ledger.user);
    assert!(outcome.committed_movements[0].sequence > 0);
    assert_eq!(ledger.quantity(p, w).await, dec("250"));

    assert_eq!(outcome.capacities.len(), 1);
    let capacity = &outcome.capacities[0];
    assert_eq!(capacity.warehouse_id, w);
    assert_eq!(capacity.used, dec("250"));
    assert_eq!(capacity.available, dec("750"));
    assert_eq!(capacity.utilization_percent, dec("25"));
}

#[tokio::test]
async fn test_batch_is_all_or_nothing() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;

    let err = ledger
        .commit(vec![
            MovementInput::receipt(p, w, dec("10"), dec("5")),
            MovementInput::issue(p, w, dec("50")),
        ])
        .await
        .unwrap_err();

    match err {
        AppError::InsufficientStock {
            index,
            available,
            requested,
            ..
        } => {
            assert_eq!(index, 1);
            assert_eq!(available, dec("10"));
            assert_eq!(requested, dec("50"));
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }

    assert_eq!(ledger.store.movement_count().await, 0);
    assert_eq!(ledger.quantity(p, w).await, Decimal::ZERO);
    let warehouse = ledger.store.get_warehouse(w).await.unwrap().unwrap();
    assert_eq!(warehouse.used, Decimal::ZERO);
}

#[tokio::test]
async fn test_later_movements_see_earlier_ones_in_same_batch() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w1 = ledger.warehouse("W1", "1000").await;
    let w2 = ledger.warehouse("W2", "500").await;

    let outcome = ledger
        .commit(vec![
            MovementInput::receipt(p, w1, dec("100"), dec("10")),
            MovementInput::transfer(
                p,
                Location::new(w1, None),
                Location::new(w2, None),
                dec("40"),
            ),
            MovementInput::issue(p, w2, dec("30")),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.committed_movements.len(), 3);
    assert_eq!(ledger.quantity(p, w1).await, dec("60"));
    assert_eq!(ledger.quantity(p, w2).await, dec("10"));

    let used: Vec<_> = outcome
        .capacities
        .iter()
        .map(|c| (c.warehouse_id, c.used))
        .collect();
    assert!(used.contains(&(w1, dec("60"))));
    assert!(used.contains(&(w2, dec("10"))));
}

#[tokio::test]
async fn test_sequence_increases_across_batches() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;

    let first = ledger
        .commit(vec![
            MovementInput::receipt(p, w, dec("5"), dec("1")),
            MovementInput::receipt(p, w, dec("5"), dec("1")),
        ])
        .await
        .unwrap();
    let second = ledger
        .commit(vec![MovementInput::issue(p, w, dec("3"))])
        .await
        .unwrap();

    let seqs: Vec<i64> = first
        .committed_movements
        .iter()
        .chain(second.committed_movements.iter())
        .map(|m| m.sequence)
        .collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_occurred_at_backdates_entry() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;
    let at = common::day(2024, 3, 1);

    let outcome = ledger
        .commit(vec![MovementInput::receipt(p, w, dec("5"), dec("1")).occurred_at(at)])
        .await
        .unwrap();

    assert_eq!(outcome.committed_movements[0].created_at, at);
}

#[tokio::test]
async fn test_batch_reference_and_notes_are_stamped() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;
    let order_id = Uuid::new_v4();

    let mut request = CommitRequest::new(vec![
        MovementInput::receipt(p, w, dec("5"), dec("1")).with_lot("LOT-7"),
    ]);
    request.reference = Some(BatchReference {
        reference_type: "purchase_order".to_string(),
        reference_id: Some(order_id),
    });
    request.notes = Some("dock 4".to_string());

    let outcome = ledger
        .processor()
        .commit_movements(request, ledger.user)
        .await
        .unwrap();

    let movement = &outcome.committed_movements[0];
    assert_eq!(movement.reference_type.as_deref(), Some("purchase_order"));
    assert_eq!(movement.reference_id, Some(order_id));
    assert_eq!(movement.notes.as_deref(), Some("dock 4"));
    assert_eq!(movement.lot_number.as_deref(), Some("LOT-7"));
}

// ============================================================================
// Counts, adjustments and positions
// ============================================================================

#[tokio::test]
async fn test_count_sets_absolute_quantity() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;

    ledger
        .commit(vec![MovementInput::receipt(p, w, dec("100"), dec("10"))])
        .await
        .unwrap();
    ledger
        .commit(vec![MovementInput::count(p, w, dec("80"))])
        .await
        .unwrap();
    assert_eq!(ledger.quantity(p, w).await, dec("80"));

    // A count above the book quantity raises it
    ledger
        .commit(vec![MovementInput::count(p, w, dec("95"))])
        .await
        .unwrap();
    assert_eq!(ledger.quantity(p, w).await, dec("95"));

    let history = ledger
        .store
        .list_movements(&MovementQuery::new().product(p))
        .await
        .unwrap();
    assert_eq!(replay_pair_quantity(&history, p, w), dec("95"));
}

#[tokio::test]
async fn test_negative_adjustment_cannot_overdraw() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;

    ledger
        .commit(vec![MovementInput::receipt(p, w, dec("10"), dec("1"))])
        .await
        .unwrap();

    ledger
        .commit(vec![MovementInput::adjustment(p, w, dec("-4"))])
        .await
        .unwrap();
    assert_eq!(ledger.quantity(p, w).await, dec("6"));

    let err = ledger
        .commit(vec![MovementInput::adjustment(p, w, dec("-7"))])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    assert_eq!(ledger.quantity(p, w).await, dec("6"));
}

#[tokio::test]
async fn test_positions_are_tracked_separately() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;
    let a = ledger.position(w, "A-01").await;
    let b = ledger.position(w, "B-01").await;

    ledger
        .commit(vec![
            MovementInput::receipt(p, w, dec("30"), dec("1")).at_position(a),
            MovementInput::receipt(p, w, dec("20"), dec("1")).at_position(b),
        ])
        .await
        .unwrap();
    assert_eq!(ledger.quantity(p, w).await, dec("50"));

    // Position A alone cannot cover 40
    let err = ledger
        .commit(vec![MovementInput::issue(p, w, dec("40")).at_position(a)])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");

    // Moving between positions leaves the warehouse total unchanged
    ledger
        .commit(vec![MovementInput::transfer(
            p,
            Location::new(w, Some(b)),
            Location::new(w, Some(a)),
            dec("20"),
        )])
        .await
        .unwrap();
    ledger
        .commit(vec![MovementInput::issue(p, w, dec("40")).at_position(a)])
        .await
        .unwrap();
    assert_eq!(ledger.quantity(p, w).await, dec("10"));
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let ledger = Ledger::new();
    let err = ledger.commit(Vec::new()).await.unwrap_err();
    match err {
        AppError::Validation { field, .. } => assert_eq!(field, "movements"),
        other => panic!("expected Validation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_structural_errors_name_the_movement() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;

    let cases = vec![
        (
            vec![MovementInput::receipt(p, w, Decimal::ZERO, dec("1"))],
            "movements[0].quantity",
        ),
        (
            vec![
                MovementInput::receipt(p, w, dec("5"), dec("1")),
                MovementInput::issue(p, w, dec("1")).with_unit_cost(dec("3")),
            ],
            "movements[1].unit_cost",
        ),
        (
            vec![MovementInput::transfer(
                p,
                Location::new(w, None),
                Location::new(w, None),
                dec("1"),
            )],
            "movements[0].to_position_id",
        ),
        (
            vec![MovementInput::adjustment(p, w, Decimal::ZERO)],
            "movements[0].quantity",
        ),
    ];

    for (movements, expected_field) in cases {
        match ledger.commit(movements).await.unwrap_err() {
            AppError::Validation { field, .. } => assert_eq!(field, expected_field),
            other => panic!("expected Validation for {}, got {:?}", expected_field, other),
        }
    }
    assert_eq!(ledger.store.movement_count().await, 0);
}

#[tokio::test]
async fn test_amounts_beyond_stored_range_are_rejected() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;

    let cases = vec![
        (
            MovementInput::receipt(p, w, Decimal::MAX, dec("1")),
            "movements[0].quantity",
        ),
        (
            MovementInput::receipt(p, w, dec("1"), Decimal::MAX),
            "movements[0].unit_cost",
        ),
        (
            MovementInput::receipt(p, w, dec("0.00001"), dec("1")),
            "movements[0].quantity",
        ),
    ];
    for (movement, expected_field) in cases {
        match ledger.commit(vec![movement]).await.unwrap_err() {
            AppError::Validation { field, .. } => assert_eq!(field, expected_field),
            other => panic!("expected Validation for {}, got {:?}", expected_field, other),
        }
    }
    assert_eq!(ledger.store.movement_count().await, 0);
}

#[tokio::test]
async fn test_stock_level_cannot_exceed_stored_range() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;

    // Each receipt is in range on its own, together they are not
    let err = ledger
        .commit(vec![
            MovementInput::receipt(p, w, MAX_AMOUNT, dec("1")),
            MovementInput::receipt(p, w, MAX_AMOUNT, dec("1")),
        ])
        .await
        .unwrap_err();
    match err {
        AppError::Validation { field, .. } => assert_eq!(field, "movements[1].quantity"),
        other => panic!("expected Validation, got {:?}", other),
    }
    assert_eq!(ledger.store.movement_count().await, 0);
    assert_eq!(ledger.quantity(p, w).await, Decimal::ZERO);

    // Same across batches once the first one is on the books
    ledger
        .commit(vec![MovementInput::receipt(p, w, MAX_AMOUNT, dec("1"))])
        .await
        .unwrap();
    let err = ledger
        .commit(vec![MovementInput::adjustment(p, w, dec("1"))])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(ledger.quantity(p, w).await, MAX_AMOUNT);
}

#[tokio::test]
async fn test_unknown_references_are_not_found() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;
    let other = ledger.warehouse("W2", "1000").await;
    let foreign_position = ledger.position(other, "X-01").await;

    let unknown_product = ledger
        .commit(vec![MovementInput::receipt(Uuid::new_v4(), w, dec("1"), dec("1"))])
        .await
        .unwrap_err();
    assert_eq!(unknown_product.code(), "NOT_FOUND");

    let unknown_warehouse = ledger
        .commit(vec![MovementInput::receipt(p, Uuid::new_v4(), dec("1"), dec("1"))])
        .await
        .unwrap_err();
    assert_eq!(unknown_warehouse.code(), "NOT_FOUND");

    // Position exists, but in another warehouse
    let wrong_position = ledger
        .commit(vec![
            MovementInput::receipt(p, w, dec("1"), dec("1")).at_position(foreign_position)
        ])
        .await
        .unwrap_err();
    assert_eq!(wrong_position.code(), "NOT_FOUND");

    assert_eq!(ledger.store.movement_count().await, 0);
}

#[tokio::test]
async fn test_stale_unit_of_work_conflicts() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;
    ledger
        .commit(vec![MovementInput::receipt(p, w, dec("100"), dec("1"))])
        .await
        .unwrap();

    let processor = ledger.processor();
    let first = processor
        .prepare(CommitRequest::new(vec![MovementInput::issue(p, w, dec("70"))]), ledger.user)
        .await
        .unwrap();
    let second = processor
        .prepare(CommitRequest::new(vec![MovementInput::issue(p, w, dec("70"))]), ledger.user)
        .await
        .unwrap();

    processor.commit(first).await.unwrap();
    let err = processor.commit(second).await.unwrap_err();
    assert!(matches!(err, AppError::ConcurrencyConflict { .. }));

    // Only the winner's issue landed
    assert_eq!(ledger.quantity(p, w).await, dec("30"));
    assert_eq!(ledger.store.movement_count().await, 2);
}

#[tokio::test]
async fn test_first_receipts_into_empty_pair_conflict() {
    let ledger = Ledger::new();
    let p = ledger.simple_product("SKU-1", "10").await;
    let w = ledger.warehouse("W1", "1000").await;

    let processor = ledger.processor();
    let request = || CommitRequest::new(vec![MovementInput::receipt(p, w, dec("5"), dec("1"))]);
    let first = processor.prepare(request(), ledger.user).await.unwrap();
    let second = processor.prepare(request(), ledger.user).await.unwrap();

    processor.commit(first).await.unwrap();
    assert!(matches!(
        processor.commit(second).await,
        Err(AppError::ConcurrencyConflict { .. })
    ));
    assert_eq!(ledger.quantity(p, w).await, dec("5"));
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Receive(i64),
    Issue(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..=500).prop_map(Op::Receive),
        (1i64..=500).prop_map(Op::Issue),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Stock equals committed inflow minus committed outflow, never goes
    /// negative, and matches a replay of the ledger
    #[test]
    fn prop_quantity_is_conserved(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (expected, stored, replayed, rejected_ok) = rt.block_on(async {
            let ledger = Ledger::new();
            let p = ledger.simple_product("SKU-P", "1").await;
            let w = ledger.warehouse("W-P", "1000000").await;

            let mut expected = Decimal::ZERO;
            let mut rejected_ok = true;
            for op in &ops {
                let (input, delta) = match op {
                    Op::Receive(q) => (MovementInput::receipt(p, w, Decimal::from(*q), Decimal::ONE), Decimal::from(*q)),
                    Op::Issue(q) => (MovementInput::issue(p, w, Decimal::from(*q)), -Decimal::from(*q)),
                };
                match ledger.commit(vec![input]).await {
                    Ok(_) => expected += delta,
                    Err(AppError::InsufficientStock { .. }) => {
                        rejected_ok &= expected + delta < Decimal::ZERO;
                    }
                    Err(_) => rejected_ok = false,
                }
            }

            let history = ledger
                .store
                .list_movements(&MovementQuery::new().for_pair(PairKey::new(p, w)))
                .await
                .unwrap();
            (expected, ledger.quantity(p, w).await, replay_pair_quantity(&history, p, w), rejected_ok)
        });

        prop_assert!(rejected_ok);
        prop_assert!(stored >= Decimal::ZERO);
        prop_assert_eq!(stored, expected);
        prop_assert_eq!(replayed, expected);
    }

    /// A transfer never changes the product's total across warehouses
    #[test]
    fn prop_transfer_preserves_total(
        received in 1i64..=1000,
        moved in 1i64..=1000,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (before, after) = rt.block_on(async {
            let ledger = Ledger::new();
            let p = ledger.simple_product("SKU-T", "1").await;
            let w1 = ledger.warehouse("W-1", "100000").await;
            let w2 = ledger.warehouse("W-2", "100000").await;
            ledger
                .commit(vec![MovementInput::receipt(p, w1, Decimal::from(received), Decimal::ONE)])
                .await
                .unwrap();
            let before = ledger.quantity(p, w1).await + ledger.quantity(p, w2).await;
            let _ = ledger
                .commit(vec![MovementInput::transfer(
                    p,
                    Location::new(w1, None),
                    Location::new(w2, None),
                    Decimal::from(moved),
                )])
                .await;
            (before, ledger.quantity(p, w1).await + ledger.quantity(p, w2).await)
        });
        prop_assert_eq!(before, after);
    }
}

#[test]
fn test_movement_type_wire_names() {
    for kind in [
        MovementType::In,
        MovementType::Out,
        MovementType::Transfer,
        MovementType::Adjustment,
        MovementType::Count,
    ] {
        assert_eq!(MovementType::parse(kind.as_str()), Some(kind));
    }
}
