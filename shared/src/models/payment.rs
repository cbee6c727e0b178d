//! Payment models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{Order, OrderAction, OrderStatus, PaymentStatus};
use crate::error::RuleViolation;

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum PaymentMethod {
    Mpesa,
    Cash,
    BankTransfer,
}

/// Outcome of a single payment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "payment_record_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum PaymentRecordStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

/// A payment recorded against an order; an order may have several
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentRecordStatus,
    pub payment_method: PaymentMethod,
    pub mpesa_receipt_number: Option<String>,
    pub mpesa_phone: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Sum of completed payments
pub fn amount_paid(payments: &[Payment]) -> Decimal {
    payments
        .iter()
        .filter(|p| p.status == PaymentRecordStatus::Completed)
        .map(|p| p.amount)
        .sum()
}

/// Payment status an order should carry given all of its payments.
///
/// PAID is sticky: once reached, later records never downgrade it. It
/// needs at least one completed payment, even on a zero-total order.
pub fn derive_payment_status(order: &Order, payments: &[Payment]) -> PaymentStatus {
    if order.payment_status == PaymentStatus::Paid {
        return PaymentStatus::Paid;
    }
    let any_completed = payments
        .iter()
        .any(|p| p.status == PaymentRecordStatus::Completed);
    let paid = amount_paid(payments);
    if any_completed && paid >= order.total_amount {
        return PaymentStatus::Paid;
    }
    if paid > Decimal::ZERO {
        return PaymentStatus::Pending;
    }
    match payments.last().map(|p| p.status) {
        Some(PaymentRecordStatus::Failed) => PaymentStatus::Failed,
        Some(_) => PaymentStatus::Pending,
        None => order.payment_status,
    }
}

/// Cancelled orders take no further payments
pub fn check_accepts_payment(order: &Order) -> Result<(), RuleViolation> {
    if order.status == OrderStatus::Cancelled {
        return Err(RuleViolation::InvalidTransition {
            action: OrderAction::RecordPayment,
            status: order.status,
            order_type: order.order_type,
        });
    }
    Ok(())
}
