//! PostgreSQL store
//!
//! Units of work are read-committed transactions. Quantity records and
//! orders are locked with `SELECT ... FOR UPDATE` before any check that a
//! later write depends on, and order numbers are allocated from a per-year
//! counter row so concurrent creators serialize on the year.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    InventoryTransaction, Order, OrderItem, Party, PartyKind, Payment, Product, QuantityRecord,
    StockKey, Tier,
};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{OrderFilter, Store, TransactionFilter, UnitOfWork};
use crate::error::{AppError, AppResult};

const UNIQUE_VIOLATION: &str = "23505";

const PRODUCT_COLUMNS: &str =
    "id, name, flavor, category, sku, unit_price, is_active, created_at, updated_at";
const PARTY_COLUMNS: &str = "id, kind, name, phone, parent_id, created_at";
const QUANTITY_COLUMNS: &str =
    "tier, owner_id, product_id, quantity, reorder_level, last_restocked_at, updated_at";
const TRANSACTION_COLUMNS: &str = "id, tier, owner_id, product_id, quantity_change, balance_after, \
     transaction_type, order_id, performed_by, notes, created_at";
const ORDER_COLUMNS: &str = "id, order_number, order_type, source_owner_id, destination_owner_id, \
     status, payment_status, total_amount, notes, placed_by, created_at, updated_at, \
     processing_at, fulfilled_at, received_at, cancelled_at, cancel_reason";
const PAYMENT_COLUMNS: &str = "id, order_id, amount, status, payment_method, mpesa_receipt_number, \
     mpesa_phone, notes, recorded_by, paid_at, created_at";

/// PostgreSQL implementation of [`Store`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

/// Map a unique violation on `constraint` to `conflict`, anything else to a database error
fn unique_violation(err: sqlx::Error, constraint: &str, conflict: AppError) -> AppError {
    match &err {
        sqlx::Error::Database(db)
            if db.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db.constraint() == Some(constraint) =>
        {
            conflict
        }
        _ => AppError::DatabaseError(err),
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(product)
    }

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, flavor, category, sku, unit_price, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.flavor)
        .bind(&product.category)
        .bind(&product.sku)
        .bind(product.unit_price)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            unique_violation(
                e,
                "products_sku_key",
                AppError::DuplicateEntry("sku".to_string()),
            )
        })?;

        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        // sku is immutable
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $1, flavor = $2, category = $3, unit_price = $4, is_active = $5, updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(&product.name)
        .bind(&product.flavor)
        .bind(&product.category)
        .bind(product.unit_price)
        .bind(product.is_active)
        .bind(product.updated_at)
        .bind(product.id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        Ok(())
    }

    async fn list_products(&mut self, include_inactive: bool) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE is_active OR $1 ORDER BY name, sku",
            PRODUCT_COLUMNS
        ))
        .bind(include_inactive)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(products)
    }

    async fn party(&mut self, id: Uuid) -> AppResult<Option<Party>> {
        let party = sqlx::query_as::<_, Party>(&format!(
            "SELECT {} FROM parties WHERE id = $1",
            PARTY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(party)
    }

    async fn insert_party(&mut self, party: &Party) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO parties (id, kind, name, phone, parent_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(party.id)
        .bind(party.kind)
        .bind(&party.name)
        .bind(&party.phone)
        .bind(party.parent_id)
        .bind(party.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn list_parties(&mut self, kind: Option<PartyKind>) -> AppResult<Vec<Party>> {
        let parties = sqlx::query_as::<_, Party>(&format!(
            "SELECT {} FROM parties WHERE ($1::party_kind IS NULL OR kind = $1) ORDER BY name",
            PARTY_COLUMNS
        ))
        .bind(kind)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(parties)
    }

    async fn lock_quantity(&mut self, key: StockKey) -> AppResult<Option<QuantityRecord>> {
        let record = sqlx::query_as::<_, QuantityRecord>(&format!(
            "SELECT {} FROM quantity_records WHERE tier = $1 AND owner_id = $2 AND product_id = $3 FOR UPDATE",
            QUANTITY_COLUMNS
        ))
        .bind(key.tier)
        .bind(key.owner_id)
        .bind(key.product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn lock_or_create_quantity(
        &mut self,
        key: StockKey,
        reorder_level: i64,
        now: DateTime<Utc>,
    ) -> AppResult<QuantityRecord> {
        // A concurrent creator makes this wait on the key, then do nothing
        sqlx::query(
            r#"
            INSERT INTO quantity_records (tier, owner_id, product_id, quantity, reorder_level, updated_at)
            VALUES ($1, $2, $3, 0, $4, $5)
            ON CONFLICT (tier, owner_id, product_id) DO NOTHING
            "#,
        )
        .bind(key.tier)
        .bind(key.owner_id)
        .bind(key.product_id)
        .bind(reorder_level)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        self.lock_quantity(key)
            .await?
            .ok_or_else(|| AppError::Internal(format!("quantity record {:?} vanished", key)))
    }

    async fn update_quantity(&mut self, record: &QuantityRecord) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE quantity_records
            SET quantity = $1, reorder_level = $2, last_restocked_at = $3, updated_at = $4
            WHERE tier = $5 AND owner_id = $6 AND product_id = $7
            "#,
        )
        .bind(record.quantity)
        .bind(record.reorder_level)
        .bind(record.last_restocked_at)
        .bind(record.updated_at)
        .bind(record.tier)
        .bind(record.owner_id)
        .bind(record.product_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Internal(format!(
                "quantity record {:?} updated before being locked",
                record.key()
            )));
        }

        Ok(())
    }

    async fn list_quantities(
        &mut self,
        tier: Tier,
        owner_id: Uuid,
    ) -> AppResult<Vec<QuantityRecord>> {
        let records = sqlx::query_as::<_, QuantityRecord>(&format!(
            "SELECT {} FROM quantity_records WHERE tier = $1 AND owner_id = $2 ORDER BY product_id",
            QUANTITY_COLUMNS
        ))
        .bind(tier)
        .bind(owner_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(records)
    }

    async fn append_transaction(&mut self, txn: &InventoryTransaction) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_transactions (
                id, tier, owner_id, product_id, quantity_change, balance_after,
                transaction_type, order_id, performed_by, notes, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(txn.id)
        .bind(txn.tier)
        .bind(txn.owner_id)
        .bind(txn.product_id)
        .bind(txn.quantity_change)
        .bind(txn.balance_after)
        .bind(txn.transaction_type)
        .bind(txn.order_id)
        .bind(txn.performed_by)
        .bind(&txn.notes)
        .bind(txn.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn list_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> AppResult<Vec<InventoryTransaction>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM inventory_transactions WHERE TRUE",
            TRANSACTION_COLUMNS
        ));
        if let Some(tier) = filter.tier {
            query.push(" AND tier = ").push_bind(tier);
        }
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ").push_bind(owner_id);
        }
        if let Some(product_id) = filter.product_id {
            query.push(" AND product_id = ").push_bind(product_id);
        }
        if let Some(transaction_type) = filter.transaction_type {
            query
                .push(" AND transaction_type = ")
                .push_bind(transaction_type);
        }
        if let Some(order_id) = filter.order_id {
            query.push(" AND order_id = ").push_bind(order_id);
        }
        query.push(" ORDER BY seq");

        let transactions = query
            .build_query_as::<InventoryTransaction>()
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(transactions)
    }

    async fn next_order_sequence(&mut self, year: i32) -> AppResult<i32> {
        // The upsert row-locks the year's counter until commit
        let sequence = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO order_number_counters (year, last_value)
            VALUES ($1, 1)
            ON CONFLICT (year) DO UPDATE SET last_value = order_number_counters.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(year)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(sequence)
    }

    async fn resync_order_sequence(&mut self, year: i32) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_number_counters (year, last_value)
            SELECT $1, COALESCE(MAX(CAST(split_part(order_number, '-', 3) AS INTEGER)), 0)
            FROM orders
            WHERE order_number LIKE $2
            ON CONFLICT (year) DO UPDATE
            SET last_value = GREATEST(order_number_counters.last_value, EXCLUDED.last_value)
            "#,
        )
        .bind(year)
        .bind(format!("ORD-{}-%", year))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, order_type, source_owner_id, destination_owner_id,
                status, payment_status, total_amount, notes, placed_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.order_type)
        .bind(order.source_owner_id)
        .bind(order.destination_owner_id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.total_amount)
        .bind(&order.notes)
        .bind(order.placed_by)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            unique_violation(
                e,
                "orders_order_number_key",
                AppError::OrderNumberConflict(order.order_number.clone()),
            )
        })?;

        for (line_no, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, line_no, quantity, unit_price, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(line_no as i32)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.subtotal)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(order)
    }

    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(order)
    }

    async fn order_items(&mut self, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price, subtotal
            FROM order_items
            WHERE order_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(items)
    }

    async fn update_order(&mut self, order: &Order) -> AppResult<()> {
        // Only the mutable header fields; totals and parties are write-once
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, payment_status = $2, updated_at = $3, processing_at = $4,
                fulfilled_at = $5, received_at = $6, cancelled_at = $7, cancel_reason = $8
            WHERE id = $9
            "#,
        )
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.updated_at)
        .bind(order.processing_at)
        .bind(order.fulfilled_at)
        .bind(order.received_at)
        .bind(order.cancelled_at)
        .bind(&order.cancel_reason)
        .bind(order.id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Order".to_string()));
        }

        Ok(())
    }

    async fn list_orders(&mut self, filter: &OrderFilter) -> AppResult<Vec<Order>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM orders WHERE TRUE",
            ORDER_COLUMNS
        ));
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(payment_status) = filter.payment_status {
            query.push(" AND payment_status = ").push_bind(payment_status);
        }
        if let Some(order_type) = filter.order_type {
            query.push(" AND order_type = ").push_bind(order_type);
        }
        if let Some(owner_id) = filter.owner_id {
            query
                .push(" AND (source_owner_id = ")
                .push_bind(owner_id)
                .push(" OR destination_owner_id = ")
                .push_bind(owner_id)
                .push(")");
        }
        if let Some(from) = filter.from {
            query
                .push(" AND (created_at AT TIME ZONE 'UTC')::date >= ")
                .push_bind(from);
        }
        if let Some(to) = filter.to {
            query
                .push(" AND (created_at AT TIME ZONE 'UTC')::date <= ")
                .push_bind(to);
        }
        query.push(" ORDER BY created_at DESC, order_number DESC");

        let orders = query
            .build_query_as::<Order>()
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(orders)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, amount, status, payment_method, mpesa_receipt_number,
                mpesa_phone, notes, recorded_by, paid_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(payment.amount)
        .bind(payment.status)
        .bind(payment.payment_method)
        .bind(&payment.mpesa_receipt_number)
        .bind(&payment.mpesa_phone)
        .bind(&payment.notes)
        .bind(payment.recorded_by)
        .bind(payment.paid_at)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn payments_for_order(&mut self, order_id: Uuid) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE order_id = $1 ORDER BY created_at, id",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(payments)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
