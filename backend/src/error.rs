//! Error handling for the Distribution Ledger
//!
//! Every failure surfaces as `{"error": {"kind", "message", "details"?}}` with
//! a 4xx status for validation, state and conflict errors and a 5xx status
//! for anything unexpected.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use shared::{OrderAction, OrderStatus, OrderType, PaymentStatus, RuleViolation};
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    // Validation errors
    #[error("Quantity must be a positive whole number, got {quantity}")]
    InvalidQuantity { quantity: i64 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("A reason is required for {operation}")]
    MissingReason { operation: String },

    #[error("Product {product_id} is inactive")]
    ProductInactive { product_id: Uuid },

    #[error("Order must contain at least one line item")]
    EmptyOrder,

    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    // State errors
    #[error("Cannot {action} a {order_type} order in status {status}")]
    InvalidTransition {
        action: OrderAction,
        status: OrderStatus,
        order_type: OrderType,
    },

    #[error("Order {order_number} is already fulfilled")]
    AlreadyFulfilled { order_number: String },

    #[error("Order {order_number} was already received")]
    AlreadyReceived {
        order_number: String,
        received_at: DateTime<Utc>,
    },

    #[error("Payment required (payment status: {payment_status})")]
    PaymentRequired { payment_status: PaymentStatus },

    // Conflict errors
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: Uuid,
        available: i64,
        requested: i64,
    },

    #[error("Adjustment would take product {product_id} below zero")]
    WouldGoNegative {
        product_id: Uuid,
        available: i64,
        delta: i64,
    },

    #[error("Order number {0} is already taken")]
    OrderNumberConflict(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<RuleViolation> for AppError {
    fn from(violation: RuleViolation) -> Self {
        match violation {
            RuleViolation::InvalidQuantity { quantity } => AppError::InvalidQuantity { quantity },
            RuleViolation::ZeroDelta => AppError::InvalidQuantity { quantity: 0 },
            RuleViolation::MissingReason { operation } => AppError::MissingReason {
                operation: operation.to_string(),
            },
            RuleViolation::EmptyOrder => AppError::EmptyOrder,
            RuleViolation::InvalidAmount => AppError::InvalidAmount,
            RuleViolation::ProductInactive { product_id } => {
                AppError::ProductInactive { product_id }
            }
            RuleViolation::WouldGoNegative {
                product_id,
                available,
                delta,
            } => AppError::WouldGoNegative {
                product_id,
                available,
                delta,
            },
            RuleViolation::InvalidTransition {
                action,
                status,
                order_type,
            } => AppError::InvalidTransition {
                action,
                status,
                order_type,
            },
            RuleViolation::AlreadyFulfilled { order_number } => {
                AppError::AlreadyFulfilled { order_number }
            }
            RuleViolation::AlreadyReceived {
                order_number,
                received_at,
            } => AppError::AlreadyReceived {
                order_number,
                received_at,
            },
            RuleViolation::PaymentRequired { payment_status } => {
                AppError::PaymentRequired { payment_status }
            }
            RuleViolation::Validation { field, message } => AppError::Validation {
                field: field.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.keys().copied().collect();
        fields.sort_unstable();
        let field = fields.first().copied().unwrap_or("request");
        let message = field_errors
            .get(field)
            .and_then(|errs| errs.first())
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string())
            })
            .unwrap_or_else(|| "invalid value".to_string());
        AppError::Validation {
            field: field.to_string(),
            message,
        }
    }
}

impl AppError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::InsufficientPermissions(_) => "InsufficientPermissions",
            AppError::InvalidQuantity { .. } => "InvalidQuantity",
            AppError::InvalidAmount => "InvalidAmount",
            AppError::MissingReason { .. } => "MissingReason",
            AppError::ProductInactive { .. } => "ProductInactive",
            AppError::EmptyOrder => "EmptyOrder",
            AppError::Validation { .. } => "ValidationError",
            AppError::NotFound(_) => "NotFound",
            AppError::DuplicateEntry(_) => "DuplicateEntry",
            AppError::InvalidTransition { .. } => "InvalidTransition",
            AppError::AlreadyFulfilled { .. } => "AlreadyFulfilled",
            AppError::AlreadyReceived { .. } => "AlreadyReceived",
            AppError::PaymentRequired { .. } => "PaymentRequired",
            AppError::InsufficientStock { .. } => "InsufficientStock",
            AppError::WouldGoNegative { .. } => "WouldGoNegative",
            AppError::OrderNumberConflict(_) => "OrderNumberConflict",
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                "InternalError"
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            AppError::InvalidQuantity { .. }
            | AppError::InvalidAmount
            | AppError::MissingReason { .. }
            | AppError::ProductInactive { .. }
            | AppError::EmptyOrder
            | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateEntry(_)
            | AppError::InvalidTransition { .. }
            | AppError::AlreadyFulfilled { .. }
            | AppError::AlreadyReceived { .. }
            | AppError::PaymentRequired { .. }
            | AppError::InsufficientStock { .. }
            | AppError::WouldGoNegative { .. }
            | AppError::OrderNumberConflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Structured context the caller needs to resync
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::InvalidQuantity { quantity } => Some(json!({ "quantity": quantity })),
            AppError::ProductInactive { product_id } => Some(json!({ "product_id": product_id })),
            AppError::Validation { field, .. } => Some(json!({ "field": field })),
            AppError::InvalidTransition {
                action,
                status,
                order_type,
            } => Some(json!({
                "action": action,
                "current_status": status,
                "order_type": order_type,
            })),
            AppError::AlreadyFulfilled { .. } => {
                Some(json!({ "current_status": OrderStatus::Fulfilled }))
            }
            AppError::AlreadyReceived { received_at, .. } => Some(json!({
                "current_status": OrderStatus::Fulfilled,
                "received_at": received_at,
            })),
            AppError::PaymentRequired { payment_status } => {
                Some(json!({ "payment_status": payment_status }))
            }
            AppError::InsufficientStock {
                product_id,
                available,
                requested,
            } => Some(json!({
                "product_id": product_id,
                "available": available,
                "requested": requested,
            })),
            AppError::WouldGoNegative {
                product_id,
                available,
                delta,
            } => Some(json!({
                "product_id": product_id,
                "available": available,
                "delta": delta,
            })),
            _ => None,
        }
    }

    /// Client-facing message; 5xx causes stay in the logs
    fn public_message(&self) -> String {
        match self {
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::Internal(_) | AppError::InternalError(_) => {
                "An internal server error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!(kind = self.kind(), "Request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                kind: self.kind().to_string(),
                message: self.public_message(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers and services
pub type AppResult<T> = Result<T, AppError>;
