//! Sale report export

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{Sale, SaleFilter, SaleStatus};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repository::Store;
use crate::services::SaleService;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    sales: SaleService,
}

/// One exported row per sale line item
#[derive(Debug, Serialize)]
pub struct SaleReportRow {
    pub sale_id: Uuid,
    pub created_on: NaiveDate,
    pub status: SaleStatus,
    pub customer_name: String,
    pub customer_document: String,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub sale_total: Decimal,
}

impl SaleReportRow {
    /// Flatten a sale into its line rows
    pub fn from_sale(sale: &Sale) -> Vec<Self> {
        sale.line_items
            .iter()
            .map(|item| SaleReportRow {
                sale_id: sale.id,
                created_on: sale.created_at.date_naive(),
                status: sale.status,
                customer_name: sale.customer_name.clone().unwrap_or_default(),
                customer_document: sale.customer_document.clone().unwrap_or_default(),
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.subtotal,
                sale_total: sale.total,
            })
            .collect()
    }
}

impl ReportingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            sales: SaleService::new(store),
        }
    }

    /// Rows for every line of the filtered sales, newest sale first
    pub async fn sale_rows(&self, filter: SaleFilter) -> AppResult<Vec<SaleReportRow>> {
        let sales = self.sales.list_sales(filter).await?;
        Ok(sales.iter().flat_map(SaleReportRow::from_sale).collect())
    }

    /// Filtered sales as CSV text
    pub async fn export_sales_csv(&self, filter: SaleFilter) -> AppResult<String> {
        let rows = self.sale_rows(filter).await?;
        tracing::debug!("Exporting {} sale rows", rows.len());
        Self::export_to_csv(&rows)
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}
