//! HTTP request handlers

pub mod catalog;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod payments;

pub use catalog::*;
pub use health::*;
pub use inventory::*;
pub use orders::*;
pub use payments::*;
