//! Inventory ledger: per-tier quantity records and their append-only log
//!
//! [`InventoryLedger`] holds the mutations. Each one runs inside the caller's
//! unit of work, so an order transition and its stock movement commit or
//! roll back together. [`LedgerService`] wraps the standalone operations
//! (restock, adjust, reorder levels) in their own transaction and serves the
//! read side.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    reconcile, validate_quantity, validate_reason, validate_reorder_level, Actor,
    InventoryTransaction, Order, QuantityRecord, ReconciliationReport, StockKey, StockLine, Tier,
    TransactionType,
};
use uuid::Uuid;

use super::authorization::{require_stock_manager, require_stock_reader};
use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::store::{with_transaction, Store, TransactionFilter, UnitOfWork};

/// Quantity record after a single-product mutation, with the row it appended
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReceipt {
    pub record: QuantityRecord,
    pub transaction: InventoryTransaction,
}

/// Input for restocking one product
#[derive(Debug, Deserialize)]
pub struct RestockInput {
    pub tier: Tier,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub notes: Option<String>,
}

/// Input for a manual correction
#[derive(Debug, Deserialize)]
pub struct AdjustInput {
    pub tier: Tier,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub delta: i64,
    /// Required; the reason for the correction
    pub notes: Option<String>,
}

/// Input for changing a reorder threshold
#[derive(Debug, Deserialize)]
pub struct ReorderLevelInput {
    pub tier: Tier,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub reorder_level: i64,
}

/// Ledger mutations, executed inside a caller-owned unit of work
#[derive(Debug, Clone, Copy)]
pub struct InventoryLedger {
    default_reorder_level: i64,
}

impl InventoryLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            default_reorder_level: config.default_reorder_level,
        }
    }

    /// Add received goods to one record and log a RESTOCK row
    pub async fn restock(
        &self,
        uow: &mut dyn UnitOfWork,
        key: StockKey,
        quantity: i64,
        actor: &Actor,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<LedgerReceipt> {
        validate_quantity(quantity)?;
        require_stock_manager(actor, key.tier, key.owner_id)?;
        ensure_stock_holder(uow, key).await?;

        let mut record = uow
            .lock_or_create_quantity(key, self.default_reorder_level, now)
            .await?;
        let balance = record.balance_after(quantity)?;
        record.quantity = balance;
        record.last_restocked_at = Some(now);
        record.updated_at = now;
        uow.update_quantity(&record).await?;

        let transaction = ledger_row(
            key,
            quantity,
            balance,
            TransactionType::Restock,
            None,
            actor,
            notes,
            now,
        );
        uow.append_transaction(&transaction).await?;

        Ok(LedgerReceipt {
            record,
            transaction,
        })
    }

    /// Signed manual correction; the reason is mandatory and the balance
    /// may reach zero but never go below it
    pub async fn adjust(
        &self,
        uow: &mut dyn UnitOfWork,
        key: StockKey,
        delta: i64,
        actor: &Actor,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<LedgerReceipt> {
        let reason = validate_reason(reason, "adjustment")?.to_string();
        if delta == 0 {
            return Err(shared::RuleViolation::ZeroDelta.into());
        }
        require_stock_manager(actor, key.tier, key.owner_id)?;
        ensure_stock_holder(uow, key).await?;

        // A record created here for a rejected negative delta is rolled back with the unit
        let mut record = uow
            .lock_or_create_quantity(key, self.default_reorder_level, now)
            .await?;
        let balance = record.balance_after(delta)?;
        record.quantity = balance;
        record.updated_at = now;
        uow.update_quantity(&record).await?;

        let transaction = ledger_row(
            key,
            delta,
            balance,
            TransactionType::Adjustment,
            None,
            actor,
            Some(reason),
            now,
        );
        uow.append_transaction(&transaction).await?;

        Ok(LedgerReceipt {
            record,
            transaction,
        })
    }

    /// Check every line against the source stock, then decrement all of them.
    ///
    /// Lines for the same product are checked cumulatively in line order;
    /// the first shortfall is reported and nothing is written.
    #[allow(clippy::too_many_arguments)]
    pub async fn reserve_and_decrement(
        &self,
        uow: &mut dyn UnitOfWork,
        tier: Tier,
        owner_id: Uuid,
        lines: &[StockLine],
        actor: &Actor,
        order: &Order,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<InventoryTransaction>> {
        for line in lines {
            validate_quantity(line.quantity)?;
        }
        require_stock_manager(actor, tier, owner_id)?;

        // Lock in ascending product order
        let mut records: BTreeMap<Uuid, Option<QuantityRecord>> =
            lines.iter().map(|l| (l.product_id, None)).collect();
        for (product_id, slot) in records.iter_mut() {
            *slot = uow
                .lock_quantity(StockKey::new(tier, owner_id, *product_id))
                .await?;
        }

        let mut remaining: BTreeMap<Uuid, i64> = records
            .iter()
            .map(|(id, r)| (*id, r.as_ref().map_or(0, |r| r.quantity)))
            .collect();
        for line in lines {
            let available = remaining.get(&line.product_id).copied().unwrap_or(0);
            if available < line.quantity {
                return Err(AppError::InsufficientStock {
                    product_id: line.product_id,
                    available,
                    requested: line.quantity,
                });
            }
            remaining.insert(line.product_id, available - line.quantity);
        }

        let notes = format!("Order {} fulfilled", order.order_number);
        let mut transactions = Vec::with_capacity(lines.len());
        for line in lines {
            let record = records
                .get_mut(&line.product_id)
                .and_then(Option::as_mut)
                .ok_or_else(|| {
                    AppError::Internal(format!("record for {} not locked", line.product_id))
                })?;
            let balance = record.balance_after(-line.quantity)?;
            record.quantity = balance;
            record.updated_at = now;

            transactions.push(ledger_row(
                record.key(),
                -line.quantity,
                balance,
                TransactionType::OrderFulfilled,
                Some(order.id),
                actor,
                Some(notes.clone()),
                now,
            ));
        }

        for record in records.values().flatten() {
            uow.update_quantity(record).await?;
        }
        for transaction in &transactions {
            uow.append_transaction(transaction).await?;
        }

        Ok(transactions)
    }

    /// Add every line to the destination stock, creating missing records
    #[allow(clippy::too_many_arguments)]
    pub async fn increment(
        &self,
        uow: &mut dyn UnitOfWork,
        tier: Tier,
        owner_id: Uuid,
        lines: &[StockLine],
        actor: &Actor,
        order: &Order,
        reorder_level: Option<i64>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<InventoryTransaction>> {
        for line in lines {
            validate_quantity(line.quantity)?;
        }
        let reorder_level = reorder_level.unwrap_or(self.default_reorder_level);
        validate_reorder_level(reorder_level)?;
        require_stock_manager(actor, tier, owner_id)?;

        let mut records: BTreeMap<Uuid, QuantityRecord> = BTreeMap::new();
        let mut product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        for product_id in product_ids {
            let key = StockKey::new(tier, owner_id, product_id);
            let record = uow.lock_or_create_quantity(key, reorder_level, now).await?;
            records.insert(product_id, record);
        }

        let notes = format!("Order {} received", order.order_number);
        let mut transactions = Vec::with_capacity(lines.len());
        for line in lines {
            let record = records.get_mut(&line.product_id).ok_or_else(|| {
                AppError::Internal(format!("record for {} not locked", line.product_id))
            })?;
            let balance = record.balance_after(line.quantity)?;
            record.quantity = balance;
            record.last_restocked_at = Some(now);
            record.updated_at = now;

            transactions.push(ledger_row(
                record.key(),
                line.quantity,
                balance,
                TransactionType::OrderReceived,
                Some(order.id),
                actor,
                Some(notes.clone()),
                now,
            ));
        }

        for record in records.values() {
            uow.update_quantity(record).await?;
        }
        for transaction in &transactions {
            uow.append_transaction(transaction).await?;
        }

        Ok(transactions)
    }

    /// Change the informational threshold; logs no transaction
    pub async fn set_reorder_level(
        &self,
        uow: &mut dyn UnitOfWork,
        key: StockKey,
        reorder_level: i64,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> AppResult<QuantityRecord> {
        validate_reorder_level(reorder_level)?;
        require_stock_manager(actor, key.tier, key.owner_id)?;

        let mut record = uow
            .lock_quantity(key)
            .await?
            .ok_or_else(|| AppError::NotFound("Quantity record".to_string()))?;
        record.reorder_level = reorder_level;
        record.updated_at = now;
        uow.update_quantity(&record).await?;

        Ok(record)
    }
}

/// The product must exist and the owner must be a party holding stock at the tier
async fn ensure_stock_holder(uow: &mut dyn UnitOfWork, key: StockKey) -> AppResult<()> {
    if uow.product(key.product_id).await?.is_none() {
        return Err(AppError::NotFound("Product".to_string()));
    }
    let party = uow
        .party(key.owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Party".to_string()))?;
    if party.kind.tier() != Some(key.tier) {
        return Err(AppError::Validation {
            field: "owner_id".to_string(),
            message: format!("{} does not hold {} stock", party.kind, key.tier),
        });
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn ledger_row(
    key: StockKey,
    quantity_change: i64,
    balance_after: i64,
    transaction_type: TransactionType,
    order_id: Option<Uuid>,
    actor: &Actor,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> InventoryTransaction {
    InventoryTransaction {
        id: Uuid::new_v4(),
        tier: key.tier,
        owner_id: key.owner_id,
        product_id: key.product_id,
        quantity_change,
        balance_after,
        transaction_type,
        order_id,
        performed_by: actor.user_id,
        notes,
        created_at: now,
    }
}

/// Standalone ledger operations and queries
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
    ledger: InventoryLedger,
}

impl LedgerService {
    pub fn new(store: Arc<dyn Store>, config: LedgerConfig) -> Self {
        Self {
            store,
            ledger: InventoryLedger::new(config),
        }
    }

    /// Restock a product at a warehouse or distributor
    pub async fn restock(&self, actor: Actor, input: RestockInput) -> AppResult<LedgerReceipt> {
        let ledger = self.ledger;
        let key = StockKey::new(input.tier, input.owner_id, input.product_id);
        let now = Utc::now();

        let receipt = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                ledger
                    .restock(uow, key, input.quantity, &actor, input.notes, now)
                    .await
            })
        })
        .await?;

        tracing::info!(
            tier = %key.tier,
            owner_id = %key.owner_id,
            product_id = %key.product_id,
            quantity = receipt.transaction.quantity_change,
            balance = receipt.record.quantity,
            "Stock restocked"
        );

        Ok(receipt)
    }

    /// Apply a manual correction
    pub async fn adjust(&self, actor: Actor, input: AdjustInput) -> AppResult<LedgerReceipt> {
        let ledger = self.ledger;
        let key = StockKey::new(input.tier, input.owner_id, input.product_id);
        let now = Utc::now();

        let result = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                ledger
                    .adjust(uow, key, input.delta, &actor, input.notes.as_deref(), now)
                    .await
            })
        })
        .await;

        match result {
            Ok(receipt) => {
                tracing::info!(
                    tier = %key.tier,
                    owner_id = %key.owner_id,
                    product_id = %key.product_id,
                    delta = receipt.transaction.quantity_change,
                    balance = receipt.record.quantity,
                    "Stock adjusted"
                );
                Ok(receipt)
            }
            Err(err @ AppError::WouldGoNegative { .. }) => {
                tracing::warn!(product_id = %key.product_id, "Adjustment rejected: {}", err);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn set_reorder_level(
        &self,
        actor: Actor,
        input: ReorderLevelInput,
    ) -> AppResult<QuantityRecord> {
        let ledger = self.ledger;
        let key = StockKey::new(input.tier, input.owner_id, input.product_id);
        let now = Utc::now();

        with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                ledger
                    .set_reorder_level(uow, key, input.reorder_level, &actor, now)
                    .await
            })
        })
        .await
    }

    /// Every quantity record held by one owner at one tier
    pub async fn stock(
        &self,
        actor: Actor,
        tier: Tier,
        owner_id: Uuid,
    ) -> AppResult<Vec<QuantityRecord>> {
        require_stock_reader(&actor, tier, owner_id)?;
        with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move { uow.list_quantities(tier, owner_id).await })
        })
        .await
    }

    /// Records at or below their reorder level
    pub async fn low_stock(
        &self,
        actor: Actor,
        tier: Tier,
        owner_id: Uuid,
    ) -> AppResult<Vec<QuantityRecord>> {
        let records = self.stock(actor, tier, owner_id).await?;
        Ok(records.into_iter().filter(|r| r.is_low_stock()).collect())
    }

    /// Transaction log in insertion order.
    ///
    /// Non-admins must scope the query to stock they manage.
    pub async fn history(
        &self,
        actor: Actor,
        filter: TransactionFilter,
    ) -> AppResult<Vec<InventoryTransaction>> {
        if !actor.is_admin() {
            match (filter.tier, filter.owner_id) {
                (Some(tier), Some(owner_id)) => require_stock_reader(&actor, tier, owner_id)?,
                _ => {
                    return Err(AppError::InsufficientPermissions(
                        "history must be scoped to a tier and owner".to_string(),
                    ))
                }
            }
        }
        with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move { uow.list_transactions(&filter).await })
        })
        .await
    }

    /// Compare every record of one owner with the sum of its log
    pub async fn reconcile(
        &self,
        actor: Actor,
        tier: Tier,
        owner_id: Uuid,
    ) -> AppResult<ReconciliationReport> {
        require_stock_reader(&actor, tier, owner_id)?;
        let report = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let records = uow.list_quantities(tier, owner_id).await?;
                let transactions = uow
                    .list_transactions(&TransactionFilter::for_owner(tier, owner_id))
                    .await?;
                Ok(reconcile(tier, owner_id, &records, &transactions))
            })
        })
        .await?;

        if !report.is_balanced() {
            tracing::warn!(
                tier = %tier,
                owner_id = %owner_id,
                discrepancies = report.discrepancies.len(),
                "Ledger out of balance"
            );
        }

        Ok(report)
    }
}
