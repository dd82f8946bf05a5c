//! Domain models for the stock ledger

mod alert;
mod forecast;
mod movement;
mod optimization;
mod product;
mod stock;
mod trend;
mod valuation;

pub use alert::*;
pub use forecast::*;
pub use movement::*;
pub use optimization::*;
pub use product::*;
pub use stock::*;
pub use trend::*;
pub use valuation::*;
