//! Sale total and margin arithmetic
//!
//! All money math is done on `Decimal` so totals stay exact across repeated
//! edits of the same sale. Products and sums use checked arithmetic and
//! report overflow as a validation failure.

use rust_decimal::Decimal;

use crate::models::SaleLineItem;
use crate::validation::ValidationError;

/// Subtotal of a single line
pub fn line_subtotal(quantity: Decimal, unit_price: Decimal) -> Result<Decimal, ValidationError> {
    quantity
        .checked_mul(unit_price)
        .ok_or(ValidationError::AmountOverflow { field: "subtotal" })
}

/// Sum of `quantity * unit_price` over all lines
pub fn compute_total(line_items: &[SaleLineItem]) -> Result<Decimal, ValidationError> {
    line_items.iter().try_fold(Decimal::ZERO, |total, item| {
        total
            .checked_add(line_subtotal(item.quantity, item.unit_price)?)
            .ok_or(ValidationError::AmountOverflow { field: "total" })
    })
}

/// Margin over purchase cost as a percentage rounded to 2 decimals.
/// Returns zero when the cost is not positive or the ratio does not fit.
pub fn margin_percent(base_price: Decimal, unit_cost: Decimal) -> Decimal {
    if unit_cost <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    base_price
        .checked_sub(unit_cost)
        .and_then(|gain| gain.checked_div(unit_cost))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|percent| percent.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}
