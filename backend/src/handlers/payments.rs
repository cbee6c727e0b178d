//! HTTP handlers for order payments

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::Payment;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::payments::{PaymentReceipt, RecordPaymentInput};
use crate::services::PaymentGate;
use crate::AppState;

/// Record a payment against an order
pub async fn record_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<(StatusCode, Json<PaymentReceipt>)> {
    let service = PaymentGate::new(state.store.clone());
    let receipt = service
        .record_payment(current_user.0, order_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// List payments of an order
pub async fn list_payments(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<Payment>>> {
    let service = PaymentGate::new(state.store.clone());
    let payments = service.list_payments(current_user.0, order_id).await?;
    Ok(Json(payments))
}
