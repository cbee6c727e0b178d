//! Payment gate tests
//!
//! Tests for payment recording including:
//! - Cumulative partial payments and derived payment status
//! - M-Pesa detail validation and phone normalization
//! - Payments never fulfilling an order on their own

mod common;

use common::{cash, Fixture};
use distribution_ledger_backend::{
    services::{fulfillment::CancelOrderInput, payments::RecordPaymentInput},
    AppError,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::{OrderStatus, PaymentMethod, PaymentRecordStatus, PaymentStatus};

fn mpesa(amount: Decimal, phone: Option<&str>) -> RecordPaymentInput {
    RecordPaymentInput {
        amount,
        payment_method: PaymentMethod::Mpesa,
        status: PaymentRecordStatus::Completed,
        mpesa_receipt_number: Some("QGH7K2L9MN".to_string()),
        mpesa_phone: phone.map(str::to_string),
        notes: None,
    }
}

// ============================================================================
// Payment status
// ============================================================================

#[tokio::test]
async fn test_partial_payments_accumulate_to_paid() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", dec!(100)).await;
    let placed = fx.place_w2d(&[(mango.id, 10)]).await;

    let after_first = fx.pay(&placed.order, dec!(400)).await;
    assert_eq!(after_first.payment_status, PaymentStatus::Pending);

    let after_second = fx.pay(&placed.order, dec!(600)).await;
    assert_eq!(after_second.payment_status, PaymentStatus::Paid);
    assert_eq!(after_second.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_failed_attempt_then_successful_payment() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", dec!(100)).await;
    let placed = fx.place_w2d(&[(mango.id, 2)]).await;

    let failed = fx
        .payments()
        .record_payment(
            fx.distributor_actor(),
            placed.order.id,
            RecordPaymentInput {
                status: PaymentRecordStatus::Failed,
                ..cash(dec!(200))
            },
        )
        .await
        .unwrap();
    assert_eq!(failed.order.payment_status, PaymentStatus::Failed);
    assert!(failed.payment.paid_at.is_none());

    let paid = fx
        .payments()
        .record_payment(fx.distributor_actor(), placed.order.id, cash(dec!(200)))
        .await
        .unwrap();
    assert_eq!(paid.order.payment_status, PaymentStatus::Paid);
    assert!(paid.payment.paid_at.is_some());
}

#[tokio::test]
async fn test_paid_order_is_not_fulfilled_by_payment() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", dec!(100)).await;
    fx.restock_warehouse(mango.id, 50).await;
    let placed = fx.place_w2d(&[(mango.id, 5)]).await;

    let order = fx.pay_in_full(&placed.order).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(fx.warehouse_qty(mango.id).await, 50);
}

#[tokio::test]
async fn test_zero_total_order_needs_completed_payment() {
    let fx = Fixture::new().await;
    let sample = fx.product("SAMPLE-250ML", Decimal::ZERO).await;
    fx.restock_warehouse(sample.id, 20).await;
    let placed = fx.place_w2d(&[(sample.id, 5)]).await;
    assert_eq!(placed.order.total_amount, Decimal::ZERO);

    let failed = fx
        .payments()
        .record_payment(
            fx.distributor_actor(),
            placed.order.id,
            RecordPaymentInput {
                status: PaymentRecordStatus::Failed,
                ..cash(dec!(1))
            },
        )
        .await
        .unwrap();
    assert_eq!(failed.order.payment_status, PaymentStatus::Failed);

    let err = fx
        .fulfillment()
        .fulfill(fx.warehouse_staff(), placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::PaymentRequired {
            payment_status: PaymentStatus::Failed
        }
    ));
    assert_eq!(fx.warehouse_qty(sample.id).await, 20);

    let order = fx.pay(&placed.order, dec!(1)).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    let fulfilled = fx
        .fulfillment()
        .fulfill(fx.warehouse_staff(), placed.order.id)
        .await
        .unwrap();
    assert_eq!(fulfilled.status, OrderStatus::Fulfilled);
}

#[tokio::test]
async fn test_overpayment_marks_paid() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", dec!(100)).await;
    let placed = fx.place_w2d(&[(mango.id, 1)]).await;

    let order = fx.pay(&placed.order, dec!(150)).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_mpesa_phone_is_stored_normalized() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", dec!(100)).await;
    let placed = fx.place_d2c(&[(mango.id, 1)]).await;

    let receipt = fx
        .payments()
        .record_payment(
            fx.client_actor(),
            placed.order.id,
            mpesa(dec!(100), Some("0712 345 678")),
        )
        .await
        .unwrap();
    assert_eq!(receipt.payment.mpesa_phone.as_deref(), Some("254712345678"));
    assert_eq!(
        receipt.payment.mpesa_receipt_number.as_deref(),
        Some("QGH7K2L9MN")
    );
    assert_eq!(receipt.order.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_mpesa_requires_valid_phone() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", dec!(100)).await;
    let placed = fx.place_d2c(&[(mango.id, 1)]).await;

    for phone in [None, Some("12345"), Some("0812345678")] {
        let err = fx
            .payments()
            .record_payment(fx.client_actor(), placed.order.id, mpesa(dec!(100), phone))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
    assert!(fx
        .payments()
        .list_payments(fx.admin, placed.order.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", dec!(100)).await;
    let placed = fx.place_w2d(&[(mango.id, 1)]).await;

    for amount in [Decimal::ZERO, dec!(-10)] {
        let err = fx
            .payments()
            .record_payment(fx.admin, placed.order.id, cash(amount))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount));
    }
}

#[tokio::test]
async fn test_sub_cent_amount_is_rejected() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", dec!(100)).await;
    let placed = fx.place_w2d(&[(mango.id, 1)]).await;

    let err = fx
        .payments()
        .record_payment(fx.admin, placed.order.id, cash(dec!(0.001)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount));
    assert!(fx
        .payments()
        .list_payments(fx.admin, placed.order.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_cancelled_order_takes_no_payments() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", dec!(100)).await;
    let placed = fx.place_w2d(&[(mango.id, 1)]).await;
    fx.fulfillment()
        .cancel(
            fx.admin,
            placed.order.id,
            CancelOrderInput {
                reason: Some("Out of season".to_string()),
            },
        )
        .await
        .unwrap();

    let err = fx
        .payments()
        .record_payment(fx.admin, placed.order.id, cash(dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
}

// ============================================================================
// Access
// ============================================================================

#[tokio::test]
async fn test_outsider_cannot_pay_or_list() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", dec!(100)).await;
    let placed = fx.place_w2d(&[(mango.id, 1)]).await;

    let err = fx
        .payments()
        .record_payment(fx.client_actor(), placed.order.id, cash(dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientPermissions(_)));

    let err = fx
        .payments()
        .list_payments(fx.client_actor(), placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientPermissions(_)));
}

#[tokio::test]
async fn test_list_payments_in_recorded_order() {
    let fx = Fixture::new().await;
    let mango = fx.product("MANGO-1L", dec!(100)).await;
    let placed = fx.place_w2d(&[(mango.id, 3)]).await;
    fx.pay(&placed.order, dec!(100)).await;
    fx.pay(&placed.order, dec!(200)).await;

    let payments = fx
        .payments()
        .list_payments(fx.warehouse_staff(), placed.order.id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0].amount, dec!(100));
    assert_eq!(payments[1].amount, dec!(200));
}
