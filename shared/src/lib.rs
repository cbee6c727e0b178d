//! Shared types and rules for the Distribution Ledger
//!
//! This crate contains the domain model shared between the backend, the
//! frontend (via WASM), and other components of the system. Everything here
//! is pure: no I/O, no clock, no storage.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
