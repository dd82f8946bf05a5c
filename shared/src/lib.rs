//! Shared types and pure calculations for the stock ledger
//!
//! This crate contains the domain model and the side-effect free algorithms
//! (movement validation, cost layers, demand statistics, trend regression)
//! shared between the backend and the WASM client.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
