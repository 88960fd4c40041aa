//! Sale aggregate models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::line_subtotal;
use crate::validation::ValidationError;

/// A counter sale with its line items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: Uuid,
    pub customer_name: Option<String>,
    pub customer_document: Option<String>,
    pub status: SaleStatus,
    /// Sum of line item subtotals, never entered directly
    pub total: Decimal,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub line_items: Vec<SaleLineItem>,
}

impl Sale {
    pub fn is_cancelled(&self) -> bool {
        self.status == SaleStatus::Cancelled
    }
}

/// Lifecycle status of a sale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    #[default]
    Completed,
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }

    /// Cancelled is the only terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Cancelled)
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaleStatus::Pending => write!(f, "Pending"),
            SaleStatus::Completed => write!(f, "Completed"),
            SaleStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::str::FromStr for SaleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SaleStatus::Pending),
            "completed" => Ok(SaleStatus::Completed),
            "cancelled" => Ok(SaleStatus::Cancelled),
            other => Err(format!("unknown sale status: {}", other)),
        }
    }
}

/// One product line of a sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleLineItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl SaleLineItem {
    /// Build a line item, deriving the subtotal from quantity and price
    pub fn new(
        sale_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: Uuid::new_v4(),
            sale_id,
            product_id,
            quantity,
            unit_price,
            subtotal: line_subtotal(quantity, unit_price)?,
        })
    }
}

/// Requested line item on create or edit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItemInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Falls back to the product's base price when omitted
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

/// Aggregate figures over a set of sales
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SaleStatistics {
    pub completed_count: u64,
    pub completed_revenue: Decimal,
}

impl SaleStatistics {
    /// Only completed sales count towards revenue
    pub fn from_sales<'a>(sales: impl IntoIterator<Item = &'a Sale>) -> Self {
        sales
            .into_iter()
            .filter(|s| s.status == SaleStatus::Completed)
            .fold(Self::default(), |mut acc, sale| {
                acc.completed_count += 1;
                acc.completed_revenue += sale.total;
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sale(status: SaleStatus, total: &str) -> Sale {
        let now = Utc::now();
        Sale {
            id: Uuid::new_v4(),
            customer_name: None,
            customer_document: None,
            status,
            total: Decimal::from_str(total).unwrap(),
            notes: None,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            modified_at: now,
            line_items: vec![],
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [SaleStatus::Pending, SaleStatus::Completed, SaleStatus::Cancelled] {
            assert_eq!(SaleStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(SaleStatus::from_str("COMPLETADA").is_err());
    }

    #[test]
    fn test_only_cancelled_is_terminal() {
        assert!(SaleStatus::Cancelled.is_terminal());
        assert!(!SaleStatus::Pending.is_terminal());
        assert!(!SaleStatus::Completed.is_terminal());
    }

    #[test]
    fn test_line_item_subtotal_is_derived() {
        let item = SaleLineItem::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Decimal::from_str("2.5").unwrap(),
            Decimal::from_str("18000.00").unwrap(),
        )
        .unwrap();
        assert_eq!(item.subtotal, Decimal::from_str("45000").unwrap());
    }

    #[test]
    fn test_statistics_ignore_pending_and_cancelled() {
        let sales = vec![
            sale(SaleStatus::Completed, "20.00"),
            sale(SaleStatus::Completed, "15.50"),
            sale(SaleStatus::Pending, "99.00"),
            sale(SaleStatus::Cancelled, "40.00"),
        ];
        let stats = SaleStatistics::from_sales(&sales);
        assert_eq!(stats.completed_count, 2);
        assert_eq!(stats.completed_revenue, Decimal::from_str("35.50").unwrap());
    }
}
