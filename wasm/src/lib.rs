//! WebAssembly module for the Pescadería sale form
//!
//! Provides client-side computation for:
//! - Line subtotals and sale totals
//! - Product margins
//! - Form validation before submitting a sale

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::pricing::*;
pub use shared::validation::*;

/// A line as the sale form holds it. Amounts travel as decimal strings.
#[derive(Debug, Deserialize)]
struct FormLine {
    quantity: Decimal,
    unit_price: Decimal,
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|_| format!("{} is not a number: {}", field, value))
}

fn sale_total(lines_json: &str) -> Result<Decimal, String> {
    let lines: Vec<FormLine> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid lines JSON: {}", e))?;
    lines.iter().try_fold(Decimal::ZERO, |total, line| {
        let subtotal = line_subtotal(line.quantity, line.unit_price).map_err(|e| e.to_string())?;
        total
            .checked_add(subtotal)
            .ok_or_else(|| ValidationError::AmountOverflow { field: "total" }.to_string())
    })
}

/// Sum of `quantity * unit_price` over a JSON array of lines, as a string
#[wasm_bindgen]
pub fn calculate_sale_total(lines_json: &str) -> Result<String, JsValue> {
    sale_total(lines_json)
        .map(|total| total.to_string())
        .map_err(|e| JsValue::from_str(&e))
}

/// Subtotal of one line, as a string
#[wasm_bindgen]
pub fn calculate_line_subtotal(quantity: &str, unit_price: &str) -> Result<String, JsValue> {
    let quantity = parse_decimal(quantity, "quantity").map_err(|e| JsValue::from_str(&e))?;
    let unit_price = parse_decimal(unit_price, "unit_price").map_err(|e| JsValue::from_str(&e))?;
    line_subtotal(quantity, unit_price)
        .map(|subtotal| subtotal.to_string())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Margin over cost in percent, rounded to 2 decimals
#[wasm_bindgen]
pub fn calculate_product_margin(base_price: &str, unit_cost: &str) -> Result<String, JsValue> {
    let base_price = parse_decimal(base_price, "base_price").map_err(|e| JsValue::from_str(&e))?;
    let unit_cost = parse_decimal(unit_cost, "unit_cost").map_err(|e| JsValue::from_str(&e))?;
    Ok(margin_percent(base_price, unit_cost).to_string())
}

/// Whether a cancellation reason would be accepted
#[wasm_bindgen]
pub fn is_valid_cancellation_reason(reason: &str) -> bool {
    validate_cancellation_reason(reason).is_ok()
}

/// Whether a customer document would be accepted
#[wasm_bindgen]
pub fn is_valid_customer_document(document: &str) -> bool {
    validate_customer_document(document).is_ok()
}

/// Whether `quantity` can be sold in the given unit ("kilogram", "unit", ...)
#[wasm_bindgen]
pub fn is_valid_quantity_for_unit(quantity: &str, unit: &str) -> bool {
    let (Ok(quantity), Ok(unit)) = (
        parse_decimal(quantity, "quantity"),
        UnitOfMeasure::from_str(unit),
    ) else {
        return false;
    };
    quantity > Decimal::ZERO && validate_quantity_for_unit(1, quantity, unit).is_ok()
}
