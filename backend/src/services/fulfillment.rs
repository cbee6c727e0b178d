//! Fulfillment engine: drives orders through their state machine and moves
//! stock through the ledger in the same unit of work

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use shared::{validate_reason, Actor, Order, OrderAction, OrderStatus, StockLine};
use uuid::Uuid;

use super::authorization::{require_destination, require_party_to, require_source};
use super::ledger::InventoryLedger;
use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::store::{with_transaction, Store, UnitOfWork};

/// Input for cancelling an order
#[derive(Debug, Deserialize)]
pub struct CancelOrderInput {
    pub reason: Option<String>,
}

/// Input for receiving a W->D order
#[derive(Debug, Default, Deserialize)]
pub struct ReceiveOrderInput {
    /// Reorder level for records created by this receipt
    pub reorder_level: Option<i64>,
}

#[derive(Clone)]
pub struct FulfillmentEngine {
    store: Arc<dyn Store>,
    ledger: InventoryLedger,
}

impl FulfillmentEngine {
    pub fn new(store: Arc<dyn Store>, config: LedgerConfig) -> Self {
        Self {
            store,
            ledger: InventoryLedger::new(config),
        }
    }

    /// PENDING -> PROCESSING
    pub async fn mark_processing(&self, actor: Actor, order_id: Uuid) -> AppResult<Order> {
        let now = Utc::now();
        let result = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let mut order = lock_order(uow, order_id).await?;
                require_source(&actor, &order)?;
                order.check_mark_processing()?;

                order.status = OrderStatus::Processing;
                order.processing_at = Some(now);
                order.updated_at = now;
                uow.update_order(&order).await?;
                Ok(order)
            })
        })
        .await;

        log_transition(OrderAction::MarkProcessing, order_id, &result);
        result
    }

    /// Decrement the source tier for every line and mark the order FULFILLED.
    ///
    /// Any ledger failure leaves both the order and the stock untouched.
    pub async fn fulfill(&self, actor: Actor, order_id: Uuid) -> AppResult<Order> {
        let ledger = self.ledger;
        let now = Utc::now();
        let result = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let mut order = lock_order(uow, order_id).await?;
                require_source(&actor, &order)?;
                order.check_fulfill()?;

                let lines = stock_lines(uow, order_id).await?;
                ledger
                    .reserve_and_decrement(
                        uow,
                        order.order_type.source_tier(),
                        order.source_owner_id,
                        &lines,
                        &actor,
                        &order,
                        now,
                    )
                    .await?;

                order.status = OrderStatus::Fulfilled;
                order.fulfilled_at = Some(now);
                order.updated_at = now;
                uow.update_order(&order).await?;
                Ok(order)
            })
        })
        .await;

        log_transition(OrderAction::Fulfill, order_id, &result);
        result
    }

    /// Add a fulfilled W->D order to the destination distributor's stock, once
    pub async fn receive(
        &self,
        actor: Actor,
        order_id: Uuid,
        input: ReceiveOrderInput,
    ) -> AppResult<Order> {
        let ledger = self.ledger;
        let now = Utc::now();
        let result = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let mut order = lock_order(uow, order_id).await?;
                require_destination(&actor, &order)?;
                order.check_receive()?;

                let tier = order.order_type.destination_tier().ok_or_else(|| {
                    AppError::Internal(format!("{} has no destination tier", order.order_type))
                })?;
                let lines = stock_lines(uow, order_id).await?;
                ledger
                    .increment(
                        uow,
                        tier,
                        order.destination_owner_id,
                        &lines,
                        &actor,
                        &order,
                        input.reorder_level,
                        now,
                    )
                    .await?;

                order.received_at = Some(now);
                order.updated_at = now;
                uow.update_order(&order).await?;
                Ok(order)
            })
        })
        .await;

        log_transition(OrderAction::Receive, order_id, &result);
        result
    }

    /// PENDING | PROCESSING -> CANCELLED; no stock moves
    pub async fn cancel(
        &self,
        actor: Actor,
        order_id: Uuid,
        input: CancelOrderInput,
    ) -> AppResult<Order> {
        let now = Utc::now();
        let result = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let reason = validate_reason(input.reason.as_deref(), "cancellation")?.to_string();
                let mut order = lock_order(uow, order_id).await?;
                require_party_to(&actor, &order)?;
                order.check_cancel()?;

                order.status = OrderStatus::Cancelled;
                order.cancel_reason = Some(reason);
                order.cancelled_at = Some(now);
                order.updated_at = now;
                uow.update_order(&order).await?;
                Ok(order)
            })
        })
        .await;

        log_transition(OrderAction::Cancel, order_id, &result);
        result
    }
}

pub(crate) async fn lock_order(uow: &mut dyn UnitOfWork, order_id: Uuid) -> AppResult<Order> {
    uow.lock_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

async fn stock_lines(uow: &mut dyn UnitOfWork, order_id: Uuid) -> AppResult<Vec<StockLine>> {
    let items = uow.order_items(order_id).await?;
    Ok(items.iter().map(|item| item.stock_line()).collect())
}

fn log_transition(action: OrderAction, order_id: Uuid, result: &AppResult<Order>) {
    match result {
        Ok(order) => tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            status = %order.status,
            "Order {} succeeded",
            action_name(action)
        ),
        Err(err) => tracing::debug!(
            order_id = %order_id,
            kind = err.kind(),
            "Order {} rejected: {}",
            action_name(action),
            err
        ),
    }
}

fn action_name(action: OrderAction) -> &'static str {
    match action {
        OrderAction::MarkProcessing => "processing",
        OrderAction::Fulfill => "fulfillment",
        OrderAction::Receive => "receipt",
        OrderAction::Cancel => "cancellation",
        OrderAction::RecordPayment => "payment",
    }
}
