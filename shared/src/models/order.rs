//! Order aggregate and fulfillment state machine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::inventory::{StockLine, Tier};
use super::party::PartyKind;
use crate::error::RuleViolation;

/// Direction of an order through the distribution chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "order_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum OrderType {
    WarehouseToDistributor,
    DistributorToClient,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::WarehouseToDistributor => "WAREHOUSE_TO_DISTRIBUTOR",
            OrderType::DistributorToClient => "DISTRIBUTOR_TO_CLIENT",
        }
    }

    /// Tier whose stock is drawn down on fulfillment
    pub fn source_tier(&self) -> Tier {
        match self {
            OrderType::WarehouseToDistributor => Tier::Warehouse,
            OrderType::DistributorToClient => Tier::Distributor,
        }
    }

    /// Tier grown on receipt; clients hold no tracked stock
    pub fn destination_tier(&self) -> Option<Tier> {
        match self {
            OrderType::WarehouseToDistributor => Some(Tier::Distributor),
            OrderType::DistributorToClient => None,
        }
    }

    pub fn source_kind(&self) -> PartyKind {
        match self {
            OrderType::WarehouseToDistributor => PartyKind::Warehouse,
            OrderType::DistributorToClient => PartyKind::Distributor,
        }
    }

    pub fn destination_kind(&self) -> PartyKind {
        match self {
            OrderType::WarehouseToDistributor => PartyKind::Distributor,
            OrderType::DistributorToClient => PartyKind::Client,
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fulfillment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum OrderStatus {
    Pending,
    Processing,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Fulfilled => "FULFILLED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Statuses from which an order may still be fulfilled or cancelled
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status tracked on the order header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "order_payment_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transitions driven by the fulfillment engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    MarkProcessing,
    Fulfill,
    Receive,
    Cancel,
    RecordPayment,
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderAction::MarkProcessing => write!(f, "mark as processing"),
            OrderAction::Fulfill => write!(f, "fulfill"),
            OrderAction::Receive => write!(f, "receive"),
            OrderAction::Cancel => write!(f, "cancel"),
            OrderAction::RecordPayment => write!(f, "record a payment for"),
        }
    }
}

/// Order header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: Uuid,
    /// Human-readable sequence id (e.g., "ORD-2024-0042")
    pub order_number: String,
    pub order_type: OrderType,
    pub source_owner_id: Uuid,
    pub destination_owner_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Sum of line subtotals, frozen at creation
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub placed_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processing_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

impl Order {
    fn invalid(&self, action: OrderAction) -> RuleViolation {
        RuleViolation::InvalidTransition {
            action,
            status: self.status,
            order_type: self.order_type,
        }
    }

    /// PENDING -> PROCESSING
    pub fn check_mark_processing(&self) -> Result<(), RuleViolation> {
        match self.status {
            OrderStatus::Pending => Ok(()),
            _ => Err(self.invalid(OrderAction::MarkProcessing)),
        }
    }

    /// PENDING | PROCESSING -> FULFILLED, gated on payment
    pub fn check_fulfill(&self) -> Result<(), RuleViolation> {
        match self.status {
            OrderStatus::Fulfilled => Err(RuleViolation::AlreadyFulfilled {
                order_number: self.order_number.clone(),
            }),
            OrderStatus::Cancelled => Err(self.invalid(OrderAction::Fulfill)),
            OrderStatus::Pending | OrderStatus::Processing => {
                if self.payment_status == PaymentStatus::Paid {
                    Ok(())
                } else {
                    Err(RuleViolation::PaymentRequired {
                        payment_status: self.payment_status,
                    })
                }
            }
        }
    }

    /// Receipt of a fulfilled warehouse-to-distributor order, at most once
    pub fn check_receive(&self) -> Result<(), RuleViolation> {
        if self.status != OrderStatus::Fulfilled
            || self.order_type != OrderType::WarehouseToDistributor
        {
            return Err(self.invalid(OrderAction::Receive));
        }
        match self.received_at {
            Some(received_at) => Err(RuleViolation::AlreadyReceived {
                order_number: self.order_number.clone(),
                received_at,
            }),
            None => Ok(()),
        }
    }

    /// PENDING | PROCESSING -> CANCELLED
    pub fn check_cancel(&self) -> Result<(), RuleViolation> {
        if self.status.is_open() {
            Ok(())
        } else {
            Err(self.invalid(OrderAction::Cancel))
        }
    }
}

/// Order line with the unit price captured at order time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl OrderItem {
    pub fn new(order_id: Uuid, product_id: Uuid, quantity: i64, unit_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            quantity,
            unit_price,
            subtotal: line_subtotal(quantity, unit_price),
        }
    }

    pub fn stock_line(&self) -> StockLine {
        StockLine::new(self.product_id, self.quantity)
    }
}

/// Requested line on a new order, before prices are snapshotted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Order header with its lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Subtotal of one line
pub fn line_subtotal(quantity: i64, unit_price: Decimal) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Sum of line subtotals
pub fn order_total(items: &[OrderItem]) -> Decimal {
    items.iter().map(|i| i.subtotal).sum()
}

/// Generate an order number: `ORD-{year}-{sequence}` with a 4-digit, zero-padded sequence
pub fn format_order_number(year: i32, sequence: i32) -> String {
    format!("ORD-{}-{:04}", year, sequence)
}

/// Split an order number back into (year, sequence)
pub fn parse_order_number(order_number: &str) -> Option<(i32, i32)> {
    let rest = order_number.strip_prefix("ORD-")?;
    let (year, sequence) = rest.split_once('-')?;
    if year.len() != 4 || sequence.len() < 4 {
        return None;
    }
    if !year.chars().chain(sequence.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((year.parse().ok()?, sequence.parse().ok()?))
}
