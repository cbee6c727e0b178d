//! Process-local store.
//!
//! Intended for tests and local runs. Each unit of work holds the whole-state
//! lock for its lifetime and mutates a private copy that replaces the shared
//! state on commit, so units of work are fully serialized and a rollback
//! simply drops the copy.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    parse_order_number, InventoryTransaction, Order, OrderItem, Party, PartyKind, Payment,
    Product, QuantityRecord, StockKey, Tier,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{OrderFilter, Store, TransactionFilter, UnitOfWork};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: HashMap<Uuid, Product>,
    parties: HashMap<Uuid, Party>,
    quantities: BTreeMap<StockKey, QuantityRecord>,
    transactions: Vec<InventoryTransaction>,
    orders: HashMap<Uuid, Order>,
    order_numbers: HashSet<String>,
    order_items: HashMap<Uuid, Vec<OrderItem>>,
    order_counters: HashMap<i32, i32>,
    payments: Vec<Payment>,
}

/// In-memory implementation of [`Store`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail after the work itself succeeded
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            working,
            fail_commit: self.fail_next_commit.clone(),
        }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_commit: Arc<AtomicBool>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        if self.working.products.values().any(|p| p.sku == product.sku) {
            return Err(AppError::DuplicateEntry("sku".to_string()));
        }
        self.working.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        match self.working.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Product".to_string())),
        }
    }

    async fn list_products(&mut self, include_inactive: bool) -> AppResult<Vec<Product>> {
        let mut products: Vec<Product> = self
            .working
            .products
            .values()
            .filter(|p| include_inactive || p.is_active)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.sku.cmp(&b.sku)));
        Ok(products)
    }

    async fn party(&mut self, id: Uuid) -> AppResult<Option<Party>> {
        Ok(self.working.parties.get(&id).cloned())
    }

    async fn insert_party(&mut self, party: &Party) -> AppResult<()> {
        self.working.parties.insert(party.id, party.clone());
        Ok(())
    }

    async fn list_parties(&mut self, kind: Option<PartyKind>) -> AppResult<Vec<Party>> {
        let mut parties: Vec<Party> = self
            .working
            .parties
            .values()
            .filter(|p| kind.map_or(true, |k| p.kind == k))
            .cloned()
            .collect();
        parties.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(parties)
    }

    async fn lock_quantity(&mut self, key: StockKey) -> AppResult<Option<QuantityRecord>> {
        Ok(self.working.quantities.get(&key).cloned())
    }

    async fn lock_or_create_quantity(
        &mut self,
        key: StockKey,
        reorder_level: i64,
        now: DateTime<Utc>,
    ) -> AppResult<QuantityRecord> {
        Ok(self
            .working
            .quantities
            .entry(key)
            .or_insert_with(|| QuantityRecord::empty(key, reorder_level, now))
            .clone())
    }

    async fn update_quantity(&mut self, record: &QuantityRecord) -> AppResult<()> {
        match self.working.quantities.get_mut(&record.key()) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(AppError::Internal(format!(
                "quantity record {:?} updated before being locked",
                record.key()
            ))),
        }
    }

    async fn list_quantities(
        &mut self,
        tier: Tier,
        owner_id: Uuid,
    ) -> AppResult<Vec<QuantityRecord>> {
        Ok(self
            .working
            .quantities
            .values()
            .filter(|r| r.tier == tier && r.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn append_transaction(&mut self, txn: &InventoryTransaction) -> AppResult<()> {
        self.working.transactions.push(txn.clone());
        Ok(())
    }

    async fn list_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> AppResult<Vec<InventoryTransaction>> {
        Ok(self
            .working
            .transactions
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn next_order_sequence(&mut self, year: i32) -> AppResult<i32> {
        let counter = self.working.order_counters.entry(year).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn resync_order_sequence(&mut self, year: i32) -> AppResult<()> {
        let highest = self
            .working
            .order_numbers
            .iter()
            .filter_map(|n| parse_order_number(n))
            .filter(|(y, _)| *y == year)
            .map(|(_, seq)| seq)
            .max()
            .unwrap_or(0);
        let counter = self.working.order_counters.entry(year).or_insert(0);
        *counter = (*counter).max(highest);
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> AppResult<()> {
        if !self.working.order_numbers.insert(order.order_number.clone()) {
            return Err(AppError::OrderNumberConflict(order.order_number.clone()));
        }
        self.working.orders.insert(order.id, order.clone());
        self.working.order_items.insert(order.id, items.to_vec());
        Ok(())
    }

    async fn order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        self.order(id).await
    }

    async fn order_items(&mut self, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
        Ok(self
            .working
            .order_items
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_order(&mut self, order: &Order) -> AppResult<()> {
        match self.working.orders.get_mut(&order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Order".to_string())),
        }
    }

    async fn list_orders(&mut self, filter: &OrderFilter) -> AppResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .working
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.order_number.cmp(&a.order_number))
        });
        Ok(orders)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()> {
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn payments_for_order(&mut self, order_id: Uuid) -> AppResult<Vec<Payment>> {
        Ok(self
            .working
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork {
            mut guard,
            working,
            fail_commit,
        } = *self;
        if fail_commit.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal("simulated commit failure".to_string()));
        }
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
