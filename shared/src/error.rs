//! Business rule violations raised by the pure domain rules

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{OrderAction, OrderStatus, OrderType, PaymentStatus};

/// A rule of the ledger or the order state machine was broken.
///
/// Every variant is caused by the caller's input or by the current state of
/// an order, never by infrastructure, so none of them are retryable as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("Quantity must be a positive whole number, got {quantity}")]
    InvalidQuantity { quantity: i64 },

    #[error("Adjustment delta must not be zero")]
    ZeroDelta,

    #[error("A reason is required for {operation}")]
    MissingReason { operation: &'static str },

    #[error("Order must contain at least one line item")]
    EmptyOrder,

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Product {product_id} is inactive")]
    ProductInactive { product_id: Uuid },

    #[error("Adjusting product {product_id} by {delta} would leave {available} below zero")]
    WouldGoNegative {
        product_id: Uuid,
        available: i64,
        delta: i64,
    },

    #[error("Cannot {action} a {order_type} order in status {status}")]
    InvalidTransition {
        action: OrderAction,
        status: OrderStatus,
        order_type: OrderType,
    },

    #[error("Order {order_number} is already fulfilled")]
    AlreadyFulfilled { order_number: String },

    #[error("Order {order_number} was already received at {received_at}")]
    AlreadyReceived {
        order_number: String,
        received_at: DateTime<Utc>,
    },

    #[error("Order must be paid before fulfillment (payment status: {payment_status})")]
    PaymentRequired { payment_status: PaymentStatus },

    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },
}
