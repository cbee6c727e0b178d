//! Domain models for the Distribution Ledger

mod catalog;
mod inventory;
mod order;
mod party;
mod payment;

pub use catalog::*;
pub use inventory::*;
pub use order::*;
pub use party::*;
pub use payment::*;
