//! Order creation, numbering and lookup

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    amount_paid, format_order_number, order_total, validate_order_lines, Actor, Order, OrderItem,
    OrderLineInput, OrderStatus, OrderType, OrderWithItems, Party, PartyKind, Payment,
    PaymentStatus, Product, RuleViolation,
};
use uuid::Uuid;

use super::authorization::require_party_to;
use crate::config::OrdersConfig;
use crate::error::{AppError, AppResult};
use crate::store::{with_transaction, OrderFilter, Store, UnitOfWork};

/// Input for placing an order
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderInput {
    pub order_type: OrderType,
    pub source_owner_id: Uuid,
    pub destination_owner_id: Uuid,
    pub items: Vec<OrderLineInput>,
    pub notes: Option<String>,
}

/// Order with its lines and payment history
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
    pub amount_paid: Decimal,
}

/// Allocates `ORD-{year}-{seq}` numbers from the per-year counter
pub struct OrderNumberGenerator;

impl OrderNumberGenerator {
    /// Next number for the year of `now`; the counter row stays locked until
    /// the surrounding unit of work ends
    pub async fn next(uow: &mut dyn UnitOfWork, now: DateTime<Utc>) -> AppResult<String> {
        let year = now.year();
        let sequence = uow.next_order_sequence(year).await?;
        Ok(format_order_number(year, sequence))
    }

    /// Realign the counter with numbers already in use
    pub async fn resync(uow: &mut dyn UnitOfWork, now: DateTime<Utc>) -> AppResult<()> {
        uow.resync_order_sequence(now.year()).await
    }
}

/// Order service
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    config: OrdersConfig,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, config: OrdersConfig) -> Self {
        Self { store, config }
    }

    /// Place an order: snapshot prices, compute the total and allocate a number
    pub async fn create_order(
        &self,
        actor: Actor,
        input: CreateOrderInput,
    ) -> AppResult<OrderWithItems> {
        validate_order_lines(&input.items)?;
        require_can_place(&actor, &input)?;

        let attempts = self.config.number_retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            let now = Utc::now();
            let input = input.clone();
            let resync = attempt > 1;

            let result = with_transaction(self.store.as_ref(), move |uow| {
                Box::pin(async move {
                    if resync {
                        OrderNumberGenerator::resync(uow, now).await?;
                    }
                    place_order(uow, &actor, input, now).await
                })
            })
            .await;

            match result {
                Ok(created) => {
                    tracing::info!(
                        order_id = %created.order.id,
                        order_number = %created.order.order_number,
                        order_type = %created.order.order_type,
                        total = %created.order.total_amount,
                        lines = created.items.len(),
                        "Order created"
                    );
                    return Ok(created);
                }
                Err(AppError::OrderNumberConflict(number)) if attempt < attempts => {
                    tracing::warn!(
                        "Order number {} already taken, retrying ({}/{})",
                        number,
                        attempt,
                        attempts
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Order with items and payments, visible to either party and admins
    pub async fn get_order(&self, actor: Actor, order_id: Uuid) -> AppResult<OrderDetail> {
        with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let order = uow
                    .order(order_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
                require_party_to(&actor, &order)?;

                let items = uow.order_items(order_id).await?;
                let payments = uow.payments_for_order(order_id).await?;
                Ok(OrderDetail {
                    amount_paid: amount_paid(&payments),
                    order,
                    items,
                    payments,
                })
            })
        })
        .await
    }

    /// Newest first. Non-admins only see orders they are party to.
    pub async fn list_orders(&self, actor: Actor, filter: OrderFilter) -> AppResult<Vec<Order>> {
        let filter = scope_filter(&actor, filter)?;
        with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move { uow.list_orders(&filter).await })
        })
        .await
    }
}

/// W->D orders are placed by the receiving distributor; D->C orders by
/// either the distributor or its client
fn require_can_place(actor: &Actor, input: &CreateOrderInput) -> AppResult<()> {
    let allowed = actor.is_admin()
        || match input.order_type {
            OrderType::WarehouseToDistributor => {
                actor.represents(PartyKind::Distributor, input.destination_owner_id)
            }
            OrderType::DistributorToClient => {
                actor.represents(PartyKind::Distributor, input.source_owner_id)
                    || actor.represents(PartyKind::Client, input.destination_owner_id)
            }
        };

    if allowed {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions(format!(
            "cannot place a {} order for these parties",
            input.order_type
        )))
    }
}

fn scope_filter(actor: &Actor, mut filter: OrderFilter) -> AppResult<OrderFilter> {
    if actor.is_admin() {
        return Ok(filter);
    }
    let own = actor.owner_id.ok_or_else(|| {
        AppError::InsufficientPermissions("no party associated with this user".to_string())
    })?;
    match filter.owner_id {
        Some(requested) if requested != own => Err(AppError::InsufficientPermissions(
            "cannot list orders of another party".to_string(),
        )),
        _ => {
            filter.owner_id = Some(own);
            Ok(filter)
        }
    }
}

async fn load_party(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<Party> {
    uow.party(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Party".to_string()))
}

/// Source and destination must match the order type; a client buys only
/// from its own distributor
async fn check_parties(uow: &mut dyn UnitOfWork, input: &CreateOrderInput) -> AppResult<()> {
    let source = load_party(uow, input.source_owner_id).await?;
    let destination = load_party(uow, input.destination_owner_id).await?;

    if source.kind != input.order_type.source_kind() {
        return Err(AppError::Validation {
            field: "source_owner_id".to_string(),
            message: format!(
                "{} orders ship from a {}",
                input.order_type,
                input.order_type.source_kind()
            ),
        });
    }
    if destination.kind != input.order_type.destination_kind() {
        return Err(AppError::Validation {
            field: "destination_owner_id".to_string(),
            message: format!(
                "{} orders ship to a {}",
                input.order_type,
                input.order_type.destination_kind()
            ),
        });
    }
    if input.order_type == OrderType::DistributorToClient
        && destination.parent_id != Some(source.id)
    {
        return Err(AppError::Validation {
            field: "destination_owner_id".to_string(),
            message: "client does not belong to this distributor".to_string(),
        });
    }
    Ok(())
}

async fn place_order(
    uow: &mut dyn UnitOfWork,
    actor: &Actor,
    input: CreateOrderInput,
    now: DateTime<Utc>,
) -> AppResult<OrderWithItems> {
    check_parties(uow, &input).await?;

    // Snapshot the current price of every product once
    let mut products: HashMap<Uuid, Product> = HashMap::new();
    for line in &input.items {
        if products.contains_key(&line.product_id) {
            continue;
        }
        let product = uow
            .product(line.product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        if !product.is_active {
            return Err(RuleViolation::ProductInactive {
                product_id: product.id,
            }
            .into());
        }
        products.insert(product.id, product);
    }

    let order_id = Uuid::new_v4();
    let items: Vec<OrderItem> = input
        .items
        .iter()
        .map(|line| {
            let unit_price = products[&line.product_id].unit_price;
            OrderItem::new(order_id, line.product_id, line.quantity, unit_price)
        })
        .collect();

    let order = Order {
        id: order_id,
        order_number: OrderNumberGenerator::next(uow, now).await?,
        order_type: input.order_type,
        source_owner_id: input.source_owner_id,
        destination_owner_id: input.destination_owner_id,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        total_amount: order_total(&items),
        notes: input.notes,
        placed_by: actor.user_id,
        created_at: now,
        updated_at: now,
        processing_at: None,
        fulfilled_at: None,
        received_at: None,
        cancelled_at: None,
        cancel_reason: None,
    };
    uow.insert_order(&order, &items).await?;

    Ok(OrderWithItems { order, items })
}
