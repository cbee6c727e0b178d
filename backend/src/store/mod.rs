//! Persistence boundary for the ledger and order aggregates
//!
//! Services never talk to a database driver directly. They open a
//! [`UnitOfWork`] through [`with_transaction`], which commits when the closure
//! returns `Ok` and rolls back on any error, so a failed operation never
//! leaves partial ledger state behind.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::BoxFuture;
use serde::Deserialize;
use shared::{
    DateRange, InventoryTransaction, Order, OrderItem, OrderStatus, OrderType, Party, PartyKind,
    Payment, PaymentStatus, Product, QuantityRecord, StockKey, Tier, TransactionType,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Filters for listing orders
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub order_type: Option<OrderType>,
    /// Matches orders where this party is the source or the destination
    pub owner_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl OrderFilter {
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.from, self.to)
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.payment_status.map_or(true, |s| order.payment_status == s)
            && self.order_type.map_or(true, |t| order.order_type == t)
            && self.owner_id.map_or(true, |id| {
                order.source_owner_id == id || order.destination_owner_id == id
            })
            && self.date_range().contains(order.created_at)
    }
}

/// Filters for reading the transaction log
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub tier: Option<Tier>,
    pub owner_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub transaction_type: Option<TransactionType>,
    pub order_id: Option<Uuid>,
}

impl TransactionFilter {
    pub fn for_owner(tier: Tier, owner_id: Uuid) -> Self {
        Self {
            tier: Some(tier),
            owner_id: Some(owner_id),
            ..Self::default()
        }
    }

    pub fn for_order(order_id: Uuid) -> Self {
        Self {
            order_id: Some(order_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, txn: &InventoryTransaction) -> bool {
        self.tier.map_or(true, |t| txn.tier == t)
            && self.owner_id.map_or(true, |id| txn.owner_id == id)
            && self.product_id.map_or(true, |id| txn.product_id == id)
            && self
                .transaction_type
                .map_or(true, |t| txn.transaction_type == t)
            && self.order_id.map_or(true, |id| txn.order_id == Some(id))
    }
}

/// One atomic unit of reads and writes.
///
/// Methods prefixed `lock_` take a row lock that is held until commit or
/// rollback; callers lock quantity records in ascending product order.
#[async_trait]
pub trait UnitOfWork: Send {
    // Catalog
    async fn product(&mut self, id: Uuid) -> AppResult<Option<Product>>;
    async fn insert_product(&mut self, product: &Product) -> AppResult<()>;
    async fn update_product(&mut self, product: &Product) -> AppResult<()>;
    async fn list_products(&mut self, include_inactive: bool) -> AppResult<Vec<Product>>;

    // Parties
    async fn party(&mut self, id: Uuid) -> AppResult<Option<Party>>;
    async fn insert_party(&mut self, party: &Party) -> AppResult<()>;
    async fn list_parties(&mut self, kind: Option<PartyKind>) -> AppResult<Vec<Party>>;

    // Quantity store
    async fn lock_quantity(&mut self, key: StockKey) -> AppResult<Option<QuantityRecord>>;
    /// Lock the record, creating it at zero with `reorder_level` if absent
    async fn lock_or_create_quantity(
        &mut self,
        key: StockKey,
        reorder_level: i64,
        now: DateTime<Utc>,
    ) -> AppResult<QuantityRecord>;
    async fn update_quantity(&mut self, record: &QuantityRecord) -> AppResult<()>;
    async fn list_quantities(&mut self, tier: Tier, owner_id: Uuid)
        -> AppResult<Vec<QuantityRecord>>;

    // Transaction log, returned in insertion order
    async fn append_transaction(&mut self, txn: &InventoryTransaction) -> AppResult<()>;
    async fn list_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> AppResult<Vec<InventoryTransaction>>;

    // Orders
    /// Next value of the per-year order counter
    async fn next_order_sequence(&mut self, year: i32) -> AppResult<i32>;
    /// Move the per-year counter past every order number already in use
    async fn resync_order_sequence(&mut self, year: i32) -> AppResult<()>;
    /// Fails with `OrderNumberConflict` when the number is taken
    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> AppResult<()>;
    async fn order(&mut self, id: Uuid) -> AppResult<Option<Order>>;
    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<Order>>;
    async fn order_items(&mut self, order_id: Uuid) -> AppResult<Vec<OrderItem>>;
    async fn update_order(&mut self, order: &Order) -> AppResult<()>;
    async fn list_orders(&mut self, filter: &OrderFilter) -> AppResult<Vec<Order>>;

    // Payments
    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()>;
    async fn payments_for_order(&mut self, order_id: Uuid) -> AppResult<Vec<Payment>>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Source of units of work
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Cheap connectivity probe for health checks
    async fn ping(&self) -> AppResult<()>;

    fn name(&self) -> &'static str;
}

/// Run `f` inside one unit of work: commit on `Ok`, roll back on `Err`.
///
/// The error from `f` is always returned unchanged; a failed rollback is only
/// logged since the unit of work is discarded either way.
pub async fn with_transaction<T, F>(store: &dyn Store, f: F) -> AppResult<T>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn UnitOfWork) -> BoxFuture<'t, AppResult<T>> + Send,
{
    let mut uow = store.begin().await?;
    let result = f(uow.as_mut()).await;

    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::warn!(
                    "Rollback failed after {} error: {}",
                    err.kind(),
                    rollback_err
                );
            }
            Err(err)
        }
    }
}
