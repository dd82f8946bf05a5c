//! Domain models for the stock ledger
//!
//! Re-exports models and pure calculations from the shared crate

pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;
