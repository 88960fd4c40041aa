//! Product catalog models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product offered at the counter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub unit_of_measure: UnitOfMeasure,
    /// Selling price per unit of measure
    pub base_price: Decimal,
    /// Purchase cost per unit of measure
    pub unit_cost: Decimal,
    /// Stock on hand, expressed in `unit_of_measure`
    pub available_quantity: Decimal,
    pub expiration_date: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// New active product with a fresh id and no expiration date
    pub fn new(
        name: impl Into<String>,
        unit_of_measure: UnitOfMeasure,
        base_price: Decimal,
        unit_cost: Decimal,
        available_quantity: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            unit_of_measure,
            base_price,
            unit_cost,
            available_quantity,
            expiration_date: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the product can be offered on a new sale
    pub fn is_available(&self) -> bool {
        self.active && self.available_quantity > Decimal::ZERO
    }

    /// Stock formatted for display, e.g. "12.50 Kilogram"
    pub fn stock_display(&self) -> String {
        format!("{} {}", self.available_quantity, self.unit_of_measure)
    }
}

/// Unit a product is measured and sold in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfMeasure {
    Kilogram,
    #[default]
    Unit,
    Pound,
    Dozen,
}

impl UnitOfMeasure {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfMeasure::Kilogram => "kilogram",
            UnitOfMeasure::Unit => "unit",
            UnitOfMeasure::Pound => "pound",
            UnitOfMeasure::Dozen => "dozen",
        }
    }

    /// Counted units (single pieces, dozens) cannot be sold in fractions
    pub fn requires_whole_quantity(&self) -> bool {
        matches!(self, UnitOfMeasure::Unit | UnitOfMeasure::Dozen)
    }
}

impl std::fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitOfMeasure::Kilogram => write!(f, "Kilogram"),
            UnitOfMeasure::Unit => write!(f, "Unit"),
            UnitOfMeasure::Pound => write!(f, "Pound"),
            UnitOfMeasure::Dozen => write!(f, "Dozen"),
        }
    }
}

impl std::str::FromStr for UnitOfMeasure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kilogram" => Ok(UnitOfMeasure::Kilogram),
            "unit" => Ok(UnitOfMeasure::Unit),
            "pound" => Ok(UnitOfMeasure::Pound),
            "dozen" => Ok(UnitOfMeasure::Dozen),
            other => Err(format!("unknown unit of measure: {}", other)),
        }
    }
}

/// Profit margin of a product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductMargin {
    pub product_id: Uuid,
    pub base_price: Decimal,
    pub unit_cost: Decimal,
    /// Percentage over cost, rounded to 2 decimals
    pub margin_percent: Decimal,
}
