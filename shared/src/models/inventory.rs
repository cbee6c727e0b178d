//! Inventory ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RuleViolation;

/// Inventory-holding tier a quantity record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "inventory_tier", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum Tier {
    Warehouse,
    Distributor,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Warehouse => "WAREHOUSE",
            Tier::Distributor => "DISTRIBUTOR",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = RuleViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WAREHOUSE" => Ok(Tier::Warehouse),
            "DISTRIBUTOR" => Ok(Tier::Distributor),
            _ => Err(RuleViolation::Validation {
                field: "tier",
                message: "tier must be WAREHOUSE or DISTRIBUTOR",
            }),
        }
    }
}

/// Kind of ledger mutation recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "inventory_transaction_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum TransactionType {
    Restock,
    Adjustment,
    OrderFulfilled,
    OrderReceived,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Restock => "RESTOCK",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::OrderFulfilled => "ORDER_FULFILLED",
            TransactionType::OrderReceived => "ORDER_RECEIVED",
        }
    }
}

/// Identity of a quantity record: one product held by one owner at one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub tier: Tier,
    pub owner_id: Uuid,
    pub product_id: Uuid,
}

impl StockKey {
    pub fn new(tier: Tier, owner_id: Uuid, product_id: Uuid) -> Self {
        Self {
            tier,
            owner_id,
            product_id,
        }
    }
}

/// Current balance of one product at one tier instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct QuantityRecord {
    pub tier: Tier,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub reorder_level: i64,
    pub last_restocked_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl QuantityRecord {
    /// A zeroed record, as created on first receipt or restock
    pub fn empty(key: StockKey, reorder_level: i64, now: DateTime<Utc>) -> Self {
        Self {
            tier: key.tier,
            owner_id: key.owner_id,
            product_id: key.product_id,
            quantity: 0,
            reorder_level,
            last_restocked_at: None,
            updated_at: now,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.tier, self.owner_id, self.product_id)
    }

    /// Balance after applying `delta`, refusing to go below zero
    pub fn balance_after(&self, delta: i64) -> Result<i64, RuleViolation> {
        match self.quantity.checked_add(delta) {
            Some(next) if next >= 0 => Ok(next),
            _ => Err(RuleViolation::WouldGoNegative {
                product_id: self.product_id,
                available: self.quantity,
                delta,
            }),
        }
    }

    /// Reorder level is informational; this never blocks a movement
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

/// Append-only audit row, one per ledger mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub tier: Tier,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub quantity_change: i64,
    pub balance_after: i64,
    pub transaction_type: TransactionType,
    /// Order that caused the movement, for fulfillment and receipt rows
    pub order_id: Option<Uuid>,
    pub performed_by: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InventoryTransaction {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.tier, self.owner_id, self.product_id)
    }
}

/// A product and quantity pair moved by an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: Uuid,
    pub quantity: i64,
}

impl StockLine {
    pub fn new(product_id: Uuid, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Mismatch between a quantity record and the sum of its transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub product_id: Uuid,
    pub recorded_quantity: i64,
    pub ledger_quantity: i64,
}

/// Result of reconciling one owner's records against the transaction log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub tier: Tier,
    pub owner_id: Uuid,
    pub records_checked: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl ReconciliationReport {
    pub fn is_balanced(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Compare records with the log; `transactions` may contain other keys
pub fn reconcile(
    tier: Tier,
    owner_id: Uuid,
    records: &[QuantityRecord],
    transactions: &[InventoryTransaction],
) -> ReconciliationReport {
    let mut sums: std::collections::HashMap<Uuid, i64> = std::collections::HashMap::new();
    for txn in transactions
        .iter()
        .filter(|t| t.tier == tier && t.owner_id == owner_id)
    {
        *sums.entry(txn.product_id).or_default() += txn.quantity_change;
    }

    let mut discrepancies: Vec<Discrepancy> = records
        .iter()
        .filter(|r| r.tier == tier && r.owner_id == owner_id)
        .filter_map(|r| {
            let ledger_quantity = sums.remove(&r.product_id).unwrap_or(0);
            (ledger_quantity != r.quantity).then(|| Discrepancy {
                product_id: r.product_id,
                recorded_quantity: r.quantity,
                ledger_quantity,
            })
        })
        .collect();

    // Log rows with no record at all
    discrepancies.extend(sums.into_iter().filter(|(_, sum)| *sum != 0).map(
        |(product_id, ledger_quantity)| Discrepancy {
            product_id,
            recorded_quantity: 0,
            ledger_quantity,
        },
    ));
    discrepancies.sort_by_key(|d| d.product_id);

    ReconciliationReport {
        tier,
        owner_id,
        records_checked: records
            .iter()
            .filter(|r| r.tier == tier && r.owner_id == owner_id)
            .count(),
        discrepancies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(quantity: i64, reorder_level: i64) -> QuantityRecord {
        QuantityRecord {
            quantity,
            ..QuantityRecord::empty(
                StockKey::new(Tier::Warehouse, Uuid::new_v4(), Uuid::new_v4()),
                reorder_level,
                Utc::now(),
            )
        }
    }

    fn txn(record: &QuantityRecord, change: i64) -> InventoryTransaction {
        InventoryTransaction {
            id: Uuid::new_v4(),
            tier: record.tier,
            owner_id: record.owner_id,
            product_id: record.product_id,
            quantity_change: change,
            balance_after: 0,
            transaction_type: TransactionType::Adjustment,
            order_id: None,
            performed_by: Uuid::new_v4(),
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_balance_after_allows_exactly_zero() {
        assert_eq!(record(30, 5).balance_after(-30), Ok(0));
    }

    #[test]
    fn test_balance_after_rejects_negative() {
        let r = record(30, 5);
        assert_eq!(
            r.balance_after(-31),
            Err(RuleViolation::WouldGoNegative {
                product_id: r.product_id,
                available: 30,
                delta: -31,
            })
        );
    }

    #[test]
    fn test_low_stock_includes_threshold() {
        assert!(record(20, 20).is_low_stock());
        assert!(!record(21, 20).is_low_stock());
    }

    #[test]
    fn test_tier_parses_case_insensitively() {
        assert_eq!("warehouse".parse::<Tier>(), Ok(Tier::Warehouse));
        assert_eq!("DISTRIBUTOR".parse::<Tier>(), Ok(Tier::Distributor));
        assert!("client".parse::<Tier>().is_err());
    }

    #[test]
    fn test_reconcile_balanced() {
        let r = record(70, 10);
        let log = vec![txn(&r, 100), txn(&r, -30)];
        let report = reconcile(r.tier, r.owner_id, &[r.clone()], &log);
        assert!(report.is_balanced());
        assert_eq!(report.records_checked, 1);
    }

    #[test]
    fn test_reconcile_reports_drift_and_orphans() {
        let r = record(70, 10);
        let mut orphan = txn(&r, 5);
        orphan.product_id = Uuid::new_v4();
        let log = vec![txn(&r, 100), orphan.clone()];

        let report = reconcile(r.tier, r.owner_id, &[r.clone()], &log);
        assert_eq!(report.discrepancies.len(), 2);
        assert!(report.discrepancies.contains(&Discrepancy {
            product_id: r.product_id,
            recorded_quantity: 70,
            ledger_quantity: 100,
        }));
        assert!(report.discrepancies.contains(&Discrepancy {
            product_id: orphan.product_id,
            recorded_quantity: 0,
            ledger_quantity: 5,
        }));
    }
}
