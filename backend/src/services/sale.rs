//! Sale lifecycle: create, edit, cancel and list sales
//!
//! Every mutating operation runs in exactly one unit of work, so a failed
//! line never leaves a partial stock adjustment behind. Lock order inside a
//! unit of work is the sale row first, then products by ascending id.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{
    compute_total, validate_cancellation_reason, validate_customer_document,
    validate_date_range, validate_line_items, LineItemInput, Sale, SaleFilter, SaleLineItem,
    SaleStatistics, SaleStatus, ValidationError,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::repository::{with_transaction, Store, UnitOfWork};
use crate::services::inventory;

/// Sale service owning the sale lifecycle
#[derive(Clone)]
pub struct SaleService {
    store: Arc<dyn Store>,
}

/// Input for creating a sale
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSaleInput {
    #[validate(length(max = 200))]
    pub customer_name: Option<String>,
    #[validate(length(max = 20))]
    pub customer_document: Option<String>,
    /// Defaults to completed
    pub status: Option<SaleStatus>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub line_items: Vec<LineItemInput>,
}

/// Input for replacing the lines of a sale. An omitted optional field keeps
/// its current value and a blank one clears it.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EditSaleInput {
    pub line_items: Vec<LineItemInput>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(max = 200))]
    pub customer_name: Option<String>,
    #[validate(length(max = 20))]
    pub customer_document: Option<String>,
}

/// Result of a cancellation request
#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub sale: Sale,
    /// The sale was cancelled before this request; nothing changed
    pub already_cancelled: bool,
}

/// Validated header fields shared by create and edit
#[derive(Debug, Clone, Default)]
struct SaleHeader {
    customer_name: Option<String>,
    customer_document: Option<String>,
    notes: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Header changes on edit: `None` keeps the current value, `Some(None)`
/// clears it
#[derive(Debug, Clone, Default)]
struct HeaderChanges {
    customer_name: Option<Option<String>>,
    customer_document: Option<Option<String>>,
    notes: Option<Option<String>>,
}

fn header_changes(
    customer_name: Option<String>,
    customer_document: Option<String>,
    notes: Option<String>,
) -> AppResult<HeaderChanges> {
    let customer_document = customer_document.map(|v| clean(Some(v)));
    if let Some(Some(document)) = &customer_document {
        validate_customer_document(document)?;
    }
    Ok(HeaderChanges {
        customer_name: customer_name.map(|v| clean(Some(v))),
        customer_document,
        notes: notes.map(|v| clean(Some(v))),
    })
}

fn header(
    customer_name: Option<String>,
    customer_document: Option<String>,
    notes: Option<String>,
) -> AppResult<SaleHeader> {
    let customer_document = clean(customer_document);
    if let Some(document) = &customer_document {
        validate_customer_document(document)?;
    }
    Ok(SaleHeader {
        customer_name: clean(customer_name),
        customer_document,
        notes: clean(notes),
    })
}

/// Reserve stock for every requested line and build the persisted items.
/// A missing unit price falls back to the product's base price.
async fn apply_lines(
    uow: &mut dyn UnitOfWork,
    sale_id: Uuid,
    items: &[LineItemInput],
) -> AppResult<Vec<SaleLineItem>> {
    let mut line_items = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let product = inventory::reserve(uow, idx + 1, item).await?;
        let unit_price = item.unit_price.unwrap_or(product.base_price);
        line_items.push(SaleLineItem::new(
            sale_id,
            item.product_id,
            item.quantity,
            unit_price,
        )?);
    }
    Ok(line_items)
}

async fn lock_sale(uow: &mut dyn UnitOfWork, sale_id: Uuid) -> AppResult<Sale> {
    uow.lock_sale(sale_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Sale".to_string()))
}

async fn create_in_tx(
    uow: &mut dyn UnitOfWork,
    status: SaleStatus,
    header: SaleHeader,
    items: Vec<LineItemInput>,
) -> AppResult<Sale> {
    let now = Utc::now();
    let sale_id = Uuid::new_v4();
    inventory::lock_products(uow, items.iter().map(|i| i.product_id)).await?;
    let line_items = apply_lines(uow, sale_id, &items).await?;
    let total = compute_total(&line_items)?;

    let sale = Sale {
        id: sale_id,
        customer_name: header.customer_name,
        customer_document: header.customer_document,
        status,
        total,
        notes: header.notes,
        cancellation_reason: None,
        cancelled_at: None,
        created_at: now,
        modified_at: now,
        line_items,
    };

    uow.insert_sale(&sale).await?;
    Ok(sale)
}

async fn edit_in_tx(
    uow: &mut dyn UnitOfWork,
    sale_id: Uuid,
    changes: HeaderChanges,
    items: Vec<LineItemInput>,
) -> AppResult<Sale> {
    let mut sale = lock_sale(uow, sale_id).await?;
    if sale.status.is_terminal() {
        return Err(AppError::InvalidState(format!(
            "A {} sale cannot be edited",
            sale.status.as_str()
        )));
    }

    let touched = sale
        .line_items
        .iter()
        .map(|i| i.product_id)
        .chain(items.iter().map(|i| i.product_id));
    inventory::lock_products(uow, touched).await?;

    // Put the old quantities back before checking the new ones
    for item in &sale.line_items {
        inventory::release(uow, item).await?;
    }
    uow.delete_line_items(sale.id).await?;

    let line_items = apply_lines(uow, sale.id, &items).await?;
    uow.insert_line_items(sale.id, &line_items).await?;

    sale.total = compute_total(&line_items)?;
    sale.line_items = line_items;
    if let Some(customer_name) = changes.customer_name {
        sale.customer_name = customer_name;
    }
    if let Some(customer_document) = changes.customer_document {
        sale.customer_document = customer_document;
    }
    if let Some(notes) = changes.notes {
        sale.notes = notes;
    }
    sale.modified_at = Utc::now();

    uow.update_sale(&sale).await?;
    Ok(sale)
}

async fn cancel_in_tx(
    uow: &mut dyn UnitOfWork,
    sale_id: Uuid,
    reason: String,
) -> AppResult<CancelOutcome> {
    let mut sale = lock_sale(uow, sale_id).await?;
    if sale.is_cancelled() {
        return Ok(CancelOutcome {
            sale,
            already_cancelled: true,
        });
    }

    inventory::lock_products(uow, sale.line_items.iter().map(|i| i.product_id)).await?;
    for item in &sale.line_items {
        inventory::release(uow, item).await?;
    }

    let now = Utc::now();
    sale.status = SaleStatus::Cancelled;
    sale.cancellation_reason = Some(reason);
    sale.cancelled_at = Some(now);
    sale.modified_at = now;

    uow.update_sale(&sale).await?;
    Ok(CancelOutcome {
        sale,
        already_cancelled: false,
    })
}

impl SaleService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a sale, taking stock for every line
    pub async fn create_sale(&self, input: CreateSaleInput) -> AppResult<Sale> {
        input.validate()?;

        let status = input.status.unwrap_or_default();
        if status == SaleStatus::Cancelled {
            return Err(ValidationError::CancelledOnCreate.into());
        }
        validate_line_items(&input.line_items)?;
        let header = header(input.customer_name, input.customer_document, input.notes)?;
        let items = input.line_items;

        let sale = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(create_in_tx(uow, status, header, items))
        })
        .await?;

        tracing::info!(
            "Sale {} created with {} line items, total {}",
            sale.id,
            sale.line_items.len(),
            sale.total
        );
        Ok(sale)
    }

    /// Replace the line items of an active sale. The old quantities are
    /// returned to stock before the new ones are taken.
    pub async fn edit_sale(&self, sale_id: Uuid, input: EditSaleInput) -> AppResult<Sale> {
        input.validate()?;
        validate_line_items(&input.line_items)?;
        let changes =
            header_changes(input.customer_name, input.customer_document, input.notes)?;
        let items = input.line_items;

        let sale = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(edit_in_tx(uow, sale_id, changes, items))
        })
        .await?;

        tracing::info!("Sale {} edited, total now {}", sale.id, sale.total);
        Ok(sale)
    }

    /// Cancel a sale and return its stock. Cancelling twice is a no-op.
    pub async fn cancel_sale(&self, sale_id: Uuid, reason: &str) -> AppResult<CancelOutcome> {
        let reason = validate_cancellation_reason(reason)?;

        let outcome = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(cancel_in_tx(uow, sale_id, reason))
        })
        .await?;

        if outcome.already_cancelled {
            tracing::warn!("Sale {} was already cancelled", sale_id);
        } else {
            tracing::info!(
                "Sale {} cancelled, {} line items returned to stock",
                sale_id,
                outcome.sale.line_items.len()
            );
        }
        Ok(outcome)
    }

    /// Get a sale with its line items
    pub async fn get_sale(&self, sale_id: Uuid) -> AppResult<Sale> {
        self.store
            .find_sale(sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))
    }

    /// List sales, newest first
    pub async fn list_sales(&self, filter: SaleFilter) -> AppResult<Vec<Sale>> {
        validate_date_range(filter.from, filter.to)?;
        self.store.list_sales(&filter).await
    }

    /// Completed count and revenue over the filtered sales
    pub async fn sale_statistics(&self, filter: SaleFilter) -> AppResult<SaleStatistics> {
        let sales = self.list_sales(filter).await?;
        Ok(SaleStatistics::from_sales(&sales))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_drops_blank_values() {
        assert_eq!(clean(Some("   ".to_string())), None);
        assert_eq!(clean(Some(" Ana ".to_string())), Some("Ana".to_string()));
        assert_eq!(clean(None), None);
    }

    #[test]
    fn test_header_rejects_non_numeric_document() {
        let result = header(None, Some("12-34".to_string()), None);
        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::InvalidDocument))
        ));
    }

    #[test]
    fn test_header_changes_keep_omitted_and_clear_blank() {
        let changes = header_changes(None, Some(" ".to_string()), Some("Fresh".to_string()))
            .unwrap();
        assert_eq!(changes.customer_name, None);
        assert_eq!(changes.customer_document, Some(None));
        assert_eq!(changes.notes, Some(Some("Fresh".to_string())));
        assert!(header_changes(None, Some("x1".to_string()), None).is_err());
    }

    #[test]
    fn test_header_accepts_blank_document() {
        let header = header(Some("Ana".to_string()), Some("  ".to_string()), None).unwrap();
        assert_eq!(header.customer_document, None);
        assert_eq!(header.customer_name.as_deref(), Some("Ana"));
    }
}
