//! Structural validation of stock movements
//!
//! These checks need no store access; existence of the referenced product,
//! warehouses and positions is checked by the backend.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{MovementInput, MovementType};

/// Decimal places stored for quantities and costs
pub const AMOUNT_SCALE: u32 = 4;

/// Largest quantity or unit cost the ledger stores, 99999999999999.9999
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_808_348_671, 232_830_643, 0, false, AMOUNT_SCALE);

/// Whether `value` fits the stored precision without rounding
pub fn fits_amount(value: Decimal) -> bool {
    value.abs() <= MAX_AMOUNT && value.normalize().scale() <= AMOUNT_SCALE
}

/// Why a movement is malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MovementError {
    #[error("quantity must be positive for {0} movements")]
    NonPositiveQuantity(MovementType),

    #[error("adjustment quantity must not be zero")]
    ZeroAdjustment,

    #[error("counted quantity must not be negative")]
    NegativeCount,

    #[error("{0} movements require a source warehouse")]
    MissingSource(MovementType),

    #[error("{0} movements require a destination warehouse")]
    MissingDestination(MovementType),

    #[error("{0} movements must not have a source location")]
    UnexpectedSource(MovementType),

    #[error("{0} movements must not have a destination location")]
    UnexpectedDestination(MovementType),

    #[error("transfer source and destination are the same location")]
    SameLocation,

    #[error("a position was given without its warehouse")]
    PositionWithoutWarehouse,

    #[error("unit cost must not be negative")]
    NegativeUnitCost,

    #[error("out movements do not carry a unit cost")]
    UnexpectedUnitCost,

    #[error("quantity must be at most {} in magnitude with up to {} decimal places", MAX_AMOUNT, AMOUNT_SCALE)]
    QuantityOutOfRange,

    #[error("unit cost must be at most {} with up to {} decimal places", MAX_AMOUNT, AMOUNT_SCALE)]
    UnitCostOutOfRange,
}

impl MovementError {
    /// Name of the offending input field
    pub fn field(&self) -> &'static str {
        match self {
            MovementError::NonPositiveQuantity(_)
            | MovementError::ZeroAdjustment
            | MovementError::NegativeCount
            | MovementError::QuantityOutOfRange => "quantity",
            MovementError::MissingSource(_) | MovementError::UnexpectedSource(_) => "from_warehouse_id",
            MovementError::MissingDestination(_) | MovementError::UnexpectedDestination(_) => {
                "to_warehouse_id"
            }
            MovementError::SameLocation => "to_position_id",
            MovementError::PositionWithoutWarehouse => "position_id",
            MovementError::NegativeUnitCost
            | MovementError::UnexpectedUnitCost
            | MovementError::UnitCostOutOfRange => "unit_cost",
        }
    }
}

/// Validate one movement's shape for its type
pub fn validate_movement(input: &MovementInput) -> Result<(), MovementError> {
    let kind = input.movement_type;

    if (input.from_position_id.is_some() && input.from_warehouse_id.is_none())
        || (input.to_position_id.is_some() && input.to_warehouse_id.is_none())
    {
        return Err(MovementError::PositionWithoutWarehouse);
    }

    match kind {
        MovementType::In | MovementType::Out | MovementType::Transfer => {
            if input.quantity <= Decimal::ZERO {
                return Err(MovementError::NonPositiveQuantity(kind));
            }
        }
        MovementType::Adjustment => {
            if input.quantity.is_zero() {
                return Err(MovementError::ZeroAdjustment);
            }
        }
        MovementType::Count => {
            if input.quantity < Decimal::ZERO {
                return Err(MovementError::NegativeCount);
            }
        }
    }
    if !fits_amount(input.quantity) {
        return Err(MovementError::QuantityOutOfRange);
    }

    let has_source = input.from_warehouse_id.is_some();
    let has_destination = input.to_warehouse_id.is_some();

    if kind.requires_source() && !has_source {
        return Err(MovementError::MissingSource(kind));
    }
    if !kind.requires_source() && has_source {
        return Err(MovementError::UnexpectedSource(kind));
    }
    if kind.requires_destination() && !has_destination {
        return Err(MovementError::MissingDestination(kind));
    }
    if !kind.requires_destination() && has_destination {
        return Err(MovementError::UnexpectedDestination(kind));
    }

    if kind == MovementType::Transfer && input.source() == input.destination() {
        return Err(MovementError::SameLocation);
    }

    match input.unit_cost {
        Some(_) if kind == MovementType::Out => Err(MovementError::UnexpectedUnitCost),
        Some(cost) if cost < Decimal::ZERO => Err(MovementError::NegativeUnitCost),
        Some(cost) if !fits_amount(cost) => Err(MovementError::UnitCostOutOfRange),
        _ => Ok(()),
    }
}
