//! HTTP handlers for order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Order, OrderWithItems};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::fulfillment::{CancelOrderInput, ReceiveOrderInput};
use crate::services::orders::{CreateOrderInput, OrderDetail};
use crate::services::{FulfillmentEngine, OrderService};
use crate::store::OrderFilter;
use crate::AppState;

fn order_service(state: &AppState) -> OrderService {
    OrderService::new(state.store.clone(), state.config.orders)
}

fn fulfillment_engine(state: &AppState) -> FulfillmentEngine {
    FulfillmentEngine::new(state.store.clone(), state.config.ledger)
}

/// Place an order
pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<OrderWithItems>)> {
    let order = order_service(&state)
        .create_order(current_user.0, input)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List orders visible to the caller
pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = order_service(&state)
        .list_orders(current_user.0, filter)
        .await?;
    Ok(Json(orders))
}

/// Get an order with its items and payments
pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let order = order_service(&state)
        .get_order(current_user.0, order_id)
        .await?;
    Ok(Json(order))
}

/// Mark an order as being prepared
pub async fn mark_processing(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = fulfillment_engine(&state)
        .mark_processing(current_user.0, order_id)
        .await?;
    Ok(Json(order))
}

/// Ship a paid order out of the source stock
pub async fn fulfill_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = fulfillment_engine(&state)
        .fulfill(current_user.0, order_id)
        .await?;
    Ok(Json(order))
}

/// Book a fulfilled W->D order into the distributor's stock
pub async fn receive_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    input: Option<Json<ReceiveOrderInput>>,
) -> AppResult<Json<Order>> {
    let input = input.map(|Json(i)| i).unwrap_or_default();
    let order = fulfillment_engine(&state)
        .receive(current_user.0, order_id, input)
        .await?;
    Ok(Json(order))
}

/// Cancel an open order
pub async fn cancel_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<CancelOrderInput>,
) -> AppResult<Json<Order>> {
    let order = fulfillment_engine(&state)
        .cancel(current_user.0, order_id, input)
        .await?;
    Ok(Json(order))
}
