//! Business logic services for the Distribution Ledger

pub mod authorization;
pub mod catalog;
pub mod fulfillment;
pub mod ledger;
pub mod orders;
pub mod payments;

pub use catalog::CatalogService;
pub use fulfillment::FulfillmentEngine;
pub use ledger::{InventoryLedger, LedgerService};
pub use orders::{OrderNumberGenerator, OrderService};
pub use payments::PaymentGate;
