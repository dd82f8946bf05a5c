//! HTTP handlers

pub mod alert;
pub mod analytics;
pub mod health;
pub mod movement;
pub mod valuation;

pub use alert::*;
pub use analytics::*;
pub use health::*;
pub use movement::*;
pub use valuation::*;
