//! Engine services for the stock ledger
//!
//! Services hold only their injected store handles.

use std::future::Future;

use tokio::time::Instant;

use crate::error::{AppError, AppResult};

pub mod alert;
pub mod costing;
pub mod forecasting;
pub mod movement;
pub mod optimization;

pub use alert::AlertEngine;
pub use costing::CostingEngine;
pub use forecasting::ForecastingEngine;
pub use movement::MovementProcessor;
pub use optimization::OptimizationEngine;

/// Runs `fut` to completion or fails with `Timeout` once `deadline` passes.
/// Partial results are never returned.
pub async fn with_deadline<T, F>(deadline: Option<Instant>, operation: &str, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    let Some(deadline) = deadline else {
        return fut.await;
    };

    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, "Analytics request exceeded its deadline");
            Err(AppError::Timeout(format!(
                "{} did not complete before its deadline",
                operation
            )))
        }
    }
}
