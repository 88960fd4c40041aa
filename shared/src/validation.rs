//! Input validation for sales and the product catalog
//!
//! Every function returns a typed [`ValidationError`] so callers can map it
//! to a field-level message without string matching.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{LineItemInput, UnitOfMeasure};

/// Minimum number of characters in a cancellation reason
pub const MIN_CANCELLATION_REASON_CHARS: usize = 10;

/// Decimal places stored for quantities and money
pub const MAX_DECIMAL_PLACES: u32 = 2;

/// Largest price or quantity accepted, 99,999,999.99 (fits `NUMERIC(10,2)`)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0x540B_E3FF, 2, 0, false, 2);

/// Longest product name accepted
pub const MAX_PRODUCT_NAME_CHARS: usize = 200;

/// Rejected input, with enough context to point at the offending field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("A sale needs at least one line item")]
    EmptySale,

    #[error("Line {line}: quantity must be greater than zero")]
    NonPositiveQuantity { line: usize },

    #[error("Line {line}: unit price must be greater than zero")]
    NonPositiveUnitPrice { line: usize },

    #[error("Line {line}: products sold by {unit} need a whole quantity")]
    FractionalQuantity { line: usize, unit: UnitOfMeasure },

    #[error("{field} allows at most {max} decimal places")]
    TooManyDecimalPlaces { field: &'static str, max: u32 },

    #[error("Cancellation reason must be at least {min} characters (got {actual})")]
    ReasonTooShort { min: usize, actual: usize },

    #[error("Customer document must contain digits only")]
    InvalidDocument,

    #[error("{field} cannot be blank")]
    Blank { field: &'static str },

    #[error("{field} is too long (max {max} characters)")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must be at least 0.01")]
    NonPositiveAmount { field: &'static str },

    #[error("{field} cannot be negative")]
    Negative { field: &'static str },

    #[error("{field} must not exceed {max}")]
    TooLarge { field: &'static str, max: Decimal },

    #[error("{field} is too large to compute")]
    AmountOverflow { field: &'static str },

    #[error("Start date must not be after end date")]
    InvalidDateRange,

    #[error("A sale must be created as pending or completed")]
    CancelledOnCreate,

    #[error("Line {line}: product is inactive")]
    InactiveProduct { line: usize },
}

impl ValidationError {
    /// Name of the input field the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptySale => "line_items",
            ValidationError::NonPositiveQuantity { .. }
            | ValidationError::FractionalQuantity { .. } => "quantity",
            ValidationError::NonPositiveUnitPrice { .. } => "unit_price",
            ValidationError::TooManyDecimalPlaces { field, .. }
            | ValidationError::Blank { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::NonPositiveAmount { field }
            | ValidationError::Negative { field }
            | ValidationError::TooLarge { field, .. }
            | ValidationError::AmountOverflow { field } => *field,
            ValidationError::ReasonTooShort { .. } => "reason",
            ValidationError::InvalidDocument => "customer_document",
            ValidationError::InvalidDateRange => "from",
            ValidationError::CancelledOnCreate => "status",
            ValidationError::InactiveProduct { .. } => "product_id",
        }
    }
}

fn decimal_places(value: Decimal) -> u32 {
    value.normalize().scale()
}

fn check_upper_bound(value: Decimal, field: &'static str) -> Result<(), ValidationError> {
    if value > MAX_AMOUNT {
        return Err(ValidationError::TooLarge {
            field,
            max: MAX_AMOUNT,
        });
    }
    Ok(())
}

fn check_places(value: Decimal, field: &'static str) -> Result<(), ValidationError> {
    if decimal_places(value) > MAX_DECIMAL_PLACES {
        return Err(ValidationError::TooManyDecimalPlaces {
            field,
            max: MAX_DECIMAL_PLACES,
        });
    }
    Ok(())
}

// ============================================================================
// Sale Validations
// ============================================================================

/// Validate the requested lines of a sale before touching storage.
/// Line numbers in errors are 1-based.
pub fn validate_line_items(items: &[LineItemInput]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::EmptySale);
    }

    for (idx, item) in items.iter().enumerate() {
        let line = idx + 1;
        if item.quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity { line });
        }
        check_places(item.quantity, "quantity")?;
        check_upper_bound(item.quantity, "quantity")?;

        if let Some(price) = item.unit_price {
            if price <= Decimal::ZERO {
                return Err(ValidationError::NonPositiveUnitPrice { line });
            }
            check_places(price, "unit_price")?;
            check_upper_bound(price, "unit_price")?;
        }
    }
    Ok(())
}

/// Counted units (unit, dozen) only accept integer quantities
pub fn validate_quantity_for_unit(
    line: usize,
    quantity: Decimal,
    unit: UnitOfMeasure,
) -> Result<(), ValidationError> {
    if unit.requires_whole_quantity() && quantity.fract() != Decimal::ZERO {
        return Err(ValidationError::FractionalQuantity { line, unit });
    }
    Ok(())
}

/// Validate a cancellation reason and return it trimmed
pub fn validate_cancellation_reason(reason: &str) -> Result<String, ValidationError> {
    let trimmed = reason.trim();
    let actual = trimmed.chars().count();
    if actual < MIN_CANCELLATION_REASON_CHARS {
        return Err(ValidationError::ReasonTooShort {
            min: MIN_CANCELLATION_REASON_CHARS,
            actual,
        });
    }
    Ok(trimmed.to_string())
}

/// Customer identity documents are numeric only
pub fn validate_customer_document(document: &str) -> Result<(), ValidationError> {
    let document = document.trim();
    if document.is_empty() || !document.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidDocument);
    }
    Ok(())
}

/// Validate an optional date window
pub fn validate_date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(ValidationError::InvalidDateRange),
        _ => Ok(()),
    }
}

// ============================================================================
// Product Validations
// ============================================================================

/// Money amounts are between 0.01 and [`MAX_AMOUNT`] with cent precision
pub fn validate_money(value: Decimal, field: &'static str) -> Result<(), ValidationError> {
    if value < Decimal::new(1, 2) {
        return Err(ValidationError::NonPositiveAmount { field });
    }
    check_places(value, field)?;
    check_upper_bound(value, field)
}

/// Validate a product name, returning it trimmed
pub fn validate_product_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Blank { field: "name" });
    }
    if trimmed.chars().count() > MAX_PRODUCT_NAME_CHARS {
        return Err(ValidationError::TooLong {
            field: "name",
            max: MAX_PRODUCT_NAME_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

/// Stock quantities are non-negative with at most 2 decimals
pub fn validate_stock_quantity(
    quantity: Decimal,
    unit: UnitOfMeasure,
) -> Result<(), ValidationError> {
    if quantity < Decimal::ZERO {
        return Err(ValidationError::Negative {
            field: "available_quantity",
        });
    }
    check_places(quantity, "available_quantity")?;
    check_upper_bound(quantity, "available_quantity")?;
    validate_quantity_for_unit(0, quantity, unit).map_err(|_| ValidationError::TooManyDecimalPlaces {
        field: "available_quantity",
        max: 0,
    })
}

/// Validate the priced fields of a product
pub fn validate_product_fields(
    base_price: Decimal,
    unit_cost: Decimal,
) -> Result<(), ValidationError> {
    validate_money(base_price, "base_price")?;
    validate_money(unit_cost, "unit_cost")
}
