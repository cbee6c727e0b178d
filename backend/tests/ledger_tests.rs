//! Inventory ledger tests
//!
//! Tests for the ledger including:
//! - Restock and adjustment bookkeeping
//! - Balances never going negative
//! - Every balance equal to the sum of its transaction log, across
//!   restocks, adjustments, fulfillments and receipts

mod common;

use std::collections::{HashMap, VecDeque};

use common::Fixture;
use distribution_ledger_backend::{
    services::{
        fulfillment::ReceiveOrderInput,
        ledger::{AdjustInput, ReorderLevelInput, RestockInput},
    },
    store::TransactionFilter,
    AppError,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{Actor, OrderWithItems, StockKey, Tier, TransactionType};
use uuid::Uuid;

fn adjust(fx: &Fixture, product_id: Uuid, delta: i64, notes: Option<&str>) -> AdjustInput {
    AdjustInput {
        tier: Tier::Warehouse,
        owner_id: fx.warehouse.id,
        product_id,
        delta,
        notes: notes.map(str::to_string),
    }
}

// ============================================================================
// Restock
// ============================================================================

#[tokio::test]
async fn test_first_restock_creates_record_with_default_reorder_level() {
    let fx = Fixture::new().await;
    let product = fx.product("MANGO-1L", Decimal::from(120)).await;

    let receipt = fx
        .ledger()
        .restock(
            fx.warehouse_staff(),
            RestockInput {
                tier: Tier::Warehouse,
                owner_id: fx.warehouse.id,
                product_id: product.id,
                quantity: 100,
                notes: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(receipt.record.quantity, 100);
    assert_eq!(receipt.record.reorder_level, 10);
    assert!(receipt.record.last_restocked_at.is_some());
    assert_eq!(receipt.transaction.transaction_type, TransactionType::Restock);
    assert_eq!(receipt.transaction.quantity_change, 100);
    assert_eq!(receipt.transaction.balance_after, 100);
}

#[tokio::test]
async fn test_restock_rejects_non_positive_quantity() {
    let fx = Fixture::new().await;
    let product = fx.product("MANGO-1L", Decimal::from(120)).await;

    for quantity in [0, -5] {
        let err = fx
            .ledger()
            .restock(
                fx.admin,
                RestockInput {
                    tier: Tier::Warehouse,
                    owner_id: fx.warehouse.id,
                    product_id: product.id,
                    quantity,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidQuantity { .. }));
    }
    assert_eq!(fx.warehouse_qty(product.id).await, 0);
}

#[tokio::test]
async fn test_distributor_cannot_restock_warehouse() {
    let fx = Fixture::new().await;
    let product = fx.product("MANGO-1L", Decimal::from(120)).await;

    let err = fx
        .ledger()
        .restock(
            fx.distributor_actor(),
            RestockInput {
                tier: Tier::Warehouse,
                owner_id: fx.warehouse.id,
                product_id: product.id,
                quantity: 10,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientPermissions(_)));
}

#[tokio::test]
async fn test_restock_checks_owner_tier() {
    let fx = Fixture::new().await;
    let product = fx.product("MANGO-1L", Decimal::from(120)).await;

    let err = fx
        .ledger()
        .restock(
            fx.admin,
            RestockInput {
                tier: Tier::Warehouse,
                owner_id: fx.distributor.id,
                product_id: product.id,
                quantity: 10,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

// ============================================================================
// Adjust
// ============================================================================

#[tokio::test]
async fn test_adjust_below_zero_changes_nothing() {
    let fx = Fixture::new().await;
    let product = fx.product("MANGO-1L", Decimal::from(120)).await;
    fx.restock_warehouse(product.id, 30).await;

    let err = fx
        .ledger()
        .adjust(fx.admin, adjust(&fx, product.id, -31, Some("Breakage")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::WouldGoNegative {
            available: 30,
            delta: -31,
            ..
        }
    ));

    assert_eq!(fx.warehouse_qty(product.id).await, 30);
    let log = fx
        .ledger()
        .history(
            fx.admin,
            TransactionFilter {
                transaction_type: Some(TransactionType::Adjustment),
                ..TransactionFilter::default()
            },
        )
        .await
        .unwrap();
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_adjust_may_reach_exactly_zero() {
    let fx = Fixture::new().await;
    let product = fx.product("MANGO-1L", Decimal::from(120)).await;
    fx.restock_warehouse(product.id, 30).await;

    let receipt = fx
        .ledger()
        .adjust(fx.admin, adjust(&fx, product.id, -30, Some("Expired batch")))
        .await
        .unwrap();
    assert_eq!(receipt.record.quantity, 0);
    assert_eq!(receipt.transaction.notes.as_deref(), Some("Expired batch"));
}

#[tokio::test]
async fn test_adjust_requires_reason() {
    let fx = Fixture::new().await;
    let product = fx.product("MANGO-1L", Decimal::from(120)).await;
    fx.restock_warehouse(product.id, 30).await;

    for notes in [None, Some(""), Some("   ")] {
        let err = fx
            .ledger()
            .adjust(fx.admin, adjust(&fx, product.id, -1, notes))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingReason { .. }));
    }
}

#[tokio::test]
async fn test_adjust_rejects_zero_delta() {
    let fx = Fixture::new().await;
    let product = fx.product("MANGO-1L", Decimal::from(120)).await;

    let err = fx
        .ledger()
        .adjust(fx.admin, adjust(&fx, product.id, 0, Some("Recount")))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidQuantity { quantity: 0 }));
}

#[tokio::test]
async fn test_rejected_adjust_on_missing_record_leaves_no_record() {
    let fx = Fixture::new().await;
    let product = fx.product("MANGO-1L", Decimal::from(120)).await;

    let err = fx
        .ledger()
        .adjust(fx.admin, adjust(&fx, product.id, -5, Some("Recount")))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::WouldGoNegative { .. }));

    let records = fx
        .ledger()
        .stock(fx.admin, Tier::Warehouse, fx.warehouse.id)
        .await
        .unwrap();
    assert!(records.is_empty());
}

// ============================================================================
// Reorder levels and reads
// ============================================================================

#[tokio::test]
async fn test_low_stock_uses_reorder_level() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", Decimal::from(120)).await;
    let passion = fx.product("PASSION-1L", Decimal::from(130)).await;
    fx.restock_warehouse(mango.id, 20).await;
    fx.restock_warehouse(passion.id, 50).await;

    fx.ledger()
        .set_reorder_level(
            fx.warehouse_staff(),
            ReorderLevelInput {
                tier: Tier::Warehouse,
                owner_id: fx.warehouse.id,
                product_id: mango.id,
                reorder_level: 20,
            },
        )
        .await
        .unwrap();

    let low = fx
        .ledger()
        .low_stock(fx.warehouse_staff(), Tier::Warehouse, fx.warehouse.id)
        .await
        .unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].product_id, mango.id);
}

#[tokio::test]
async fn test_reorder_level_on_missing_record_is_not_found() {
    let fx = Fixture::new().await;
    let product = fx.product("MANGO-1L", Decimal::from(120)).await;

    let err = fx
        .ledger()
        .set_reorder_level(
            fx.admin,
            ReorderLevelInput {
                tier: Tier::Warehouse,
                owner_id: fx.warehouse.id,
                product_id: product.id,
                reorder_level: 5,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_history_must_be_scoped_for_non_admins() {
    let fx = Fixture::new().await;

    let err = fx
        .ledger()
        .history(fx.warehouse_staff(), TransactionFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientPermissions(_)));

    let own = fx
        .ledger()
        .history(
            fx.warehouse_staff(),
            TransactionFilter::for_owner(Tier::Warehouse, fx.warehouse.id),
        )
        .await;
    assert!(own.is_ok());
}

#[tokio::test]
async fn test_product_created_with_warehouse_record() {
    let fx = Fixture::new().await;
    let product = fx
        .catalog()
        .create_product(
            fx.admin,
            distribution_ledger_backend::services::catalog::CreateProductInput {
                name: "Guava 500ml".to_string(),
                flavor: Some("Guava".to_string()),
                category: None,
                sku: "GUAVA-500".to_string(),
                unit_price: Decimal::from(60),
                is_active: None,
                warehouse_id: Some(fx.warehouse.id),
                reorder_level: Some(25),
            },
        )
        .await
        .unwrap();

    let records = fx
        .ledger()
        .stock(fx.admin, Tier::Warehouse, fx.warehouse.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].product_id, product.id);
    assert_eq!(records[0].quantity, 0);
    assert_eq!(records[0].reorder_level, 25);
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[derive(Debug, Clone)]
enum Movement {
    Restock(Tier, i64),
    Adjust(Tier, i64),
    /// Place, pay and fulfill a W->D order
    FulfillToDistributor(i64),
    /// Receive the oldest fulfilled W->D order not yet received
    Receive,
    /// Place, pay and fulfill a D->C order
    FulfillToClient(i64),
}

fn tier() -> impl Strategy<Value = Tier> {
    prop_oneof![Just(Tier::Warehouse), Just(Tier::Distributor)]
}

fn movement() -> impl Strategy<Value = Movement> {
    prop_oneof![
        (tier(), 1i64..200).prop_map(|(t, q)| Movement::Restock(t, q)),
        (tier(), -150i64..150).prop_map(|(t, d)| Movement::Adjust(t, d)),
        (1i64..120).prop_map(Movement::FulfillToDistributor),
        Just(Movement::Receive),
        (1i64..80).prop_map(Movement::FulfillToClient),
    ]
}

fn owner(fx: &Fixture, tier: Tier) -> Uuid {
    match tier {
        Tier::Warehouse => fx.warehouse.id,
        Tier::Distributor => fx.distributor.id,
    }
}

/// Pay for a freshly placed order and try to fulfill it as its source
async fn pay_and_fulfill(fx: &Fixture, placed: &OrderWithItems, source: Actor) -> bool {
    fx.pay_in_full(&placed.order).await;
    fx.fulfillment()
        .fulfill(source, placed.order.id)
        .await
        .is_ok()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// Whatever sequence of movements is attempted, every logged balance is
    /// non-negative and equals the running sum of changes for its record
    #[test]
    fn prop_balance_equals_sum_of_log(movements in prop::collection::vec(movement(), 1..25)) {
        tokio_test::block_on(async {
            let fx = Fixture::new().await;
            let product = fx.product("PROP-SKU", Decimal::from(10)).await;
            let ledger = fx.ledger();
            let mut in_transit: VecDeque<Uuid> = VecDeque::new();

            for m in &movements {
                match m {
                    Movement::Restock(tier, quantity) => {
                        let _ = ledger
                            .restock(
                                fx.admin,
                                RestockInput {
                                    tier: *tier,
                                    owner_id: owner(&fx, *tier),
                                    product_id: product.id,
                                    quantity: *quantity,
                                    notes: None,
                                },
                            )
                            .await;
                    }
                    Movement::Adjust(tier, delta) => {
                        let _ = ledger
                            .adjust(
                                fx.admin,
                                AdjustInput {
                                    tier: *tier,
                                    owner_id: owner(&fx, *tier),
                                    product_id: product.id,
                                    delta: *delta,
                                    notes: Some("Recount".to_string()),
                                },
                            )
                            .await;
                    }
                    Movement::FulfillToDistributor(quantity) => {
                        let placed = fx.place_w2d(&[(product.id, *quantity)]).await;
                        if pay_and_fulfill(&fx, &placed, fx.warehouse_staff()).await {
                            in_transit.push_back(placed.order.id);
                        }
                    }
                    Movement::Receive => {
                        if let Some(order_id) = in_transit.pop_front() {
                            fx.fulfillment()
                                .receive(fx.distributor_actor(), order_id, ReceiveOrderInput::default())
                                .await
                                .unwrap();
                        }
                    }
                    Movement::FulfillToClient(quantity) => {
                        let placed = fx.place_d2c(&[(product.id, *quantity)]).await;
                        pay_and_fulfill(&fx, &placed, fx.distributor_actor()).await;
                    }
                }
            }

            let log = ledger
                .history(
                    fx.admin,
                    TransactionFilter {
                        product_id: Some(product.id),
                        ..TransactionFilter::default()
                    },
                )
                .await
                .unwrap();

            let mut running: HashMap<StockKey, i64> = HashMap::new();
            for txn in &log {
                let balance = running.entry(txn.key()).or_default();
                *balance += txn.quantity_change;
                assert!(txn.balance_after >= 0);
                assert_eq!(txn.balance_after, *balance);
            }

            for tier in [Tier::Warehouse, Tier::Distributor] {
                let owner_id = owner(&fx, tier);
                let key = StockKey::new(tier, owner_id, product.id);
                let quantity = fx.quantity(tier, owner_id, product.id).await;
                assert!(quantity >= 0);
                assert_eq!(quantity, running.get(&key).copied().unwrap_or(0));

                let report = ledger.reconcile(fx.admin, tier, owner_id).await.unwrap();
                assert!(report.is_balanced());
            }
        });
    }
}
