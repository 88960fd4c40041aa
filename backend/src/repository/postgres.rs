//! PostgreSQL store
//!
//! Rows touched by a sale transition are read with `SELECT ... FOR UPDATE`,
//! so two sales of the same product queue on the product row instead of
//! both reading a stale `available_quantity`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{Product, ProductFilter, Sale, SaleFilter, SaleLineItem, SaleStatus, UnitOfMeasure};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{ProductRepository, SaleRepository, Store, UnitOfWork};
use crate::error::{AppError, AppResult};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Escape `LIKE` metacharacters so a search term matches literally.
/// Pair with `ESCAPE '\'` in the query.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Row for product queries
#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    unit_of_measure: String,
    base_price: Decimal,
    unit_cost: Decimal,
    available_quantity: Decimal,
    expiration_date: Option<NaiveDate>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let unit_of_measure = row
            .unit_of_measure
            .parse::<UnitOfMeasure>()
            .map_err(AppError::Internal)?;
        Ok(Product {
            id: row.id,
            name: row.name,
            unit_of_measure,
            base_price: row.base_price,
            unit_cost: row.unit_cost,
            available_quantity: row.available_quantity,
            expiration_date: row.expiration_date,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row for sale header queries
#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    customer_name: Option<String>,
    customer_document: Option<String>,
    status: String,
    total: Decimal,
    notes: Option<String>,
    cancellation_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, line_items: Vec<SaleLineItem>) -> AppResult<Sale> {
        let status = self.status.parse::<SaleStatus>().map_err(AppError::Internal)?;
        Ok(Sale {
            id: self.id,
            customer_name: self.customer_name,
            customer_document: self.customer_document,
            status,
            total: self.total,
            notes: self.notes,
            cancellation_reason: self.cancellation_reason,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            modified_at: self.modified_at,
            line_items,
        })
    }
}

/// Row for line item queries
#[derive(Debug, FromRow)]
struct LineItemRow {
    id: Uuid,
    sale_id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
    subtotal: Decimal,
}

impl From<LineItemRow> for SaleLineItem {
    fn from(row: LineItemRow) -> Self {
        SaleLineItem {
            id: row.id,
            sale_id: row.sale_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, name, unit_of_measure, base_price, unit_cost, available_quantity, \
     expiration_date, active, created_at, updated_at";

const SALE_COLUMNS: &str = "id, customer_name, customer_document, status, total, notes, \
     cancellation_reason, cancelled_at, created_at, modified_at";

const LINE_ITEM_COLUMNS: &str = "id, sale_id, product_id, quantity, unit_price, subtotal";

fn map_write_error(err: sqlx::Error, resource: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return AppError::DuplicateEntry("name".to_string()),
            Some(FOREIGN_KEY_VIOLATION) => {
                return AppError::Conflict {
                    resource: resource.to_string(),
                    message: format!("{} is still referenced by existing sales", resource),
                    message_es: format!("{} tiene ventas asociadas", resource),
                }
            }
            _ => {}
        }
    }
    AppError::DatabaseError(err)
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, filter: &ProductFilter) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {}
            FROM products
            WHERE ($1::boolean IS NULL OR active = $1)
              AND (NOT $2 OR (active AND available_quantity > 0))
              AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%' ESCAPE '\')
            ORDER BY name
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(filter.active)
        .bind(filter.available_only)
        .bind(filter.normalized_query().as_deref().map(escape_like))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn find_sale(&self, id: Uuid) -> AppResult<Option<Sale>> {
        let Some(row) = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales WHERE id = $1",
            SALE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, LineItemRow>(&format!(
            "SELECT {} FROM sale_line_items WHERE sale_id = $1 ORDER BY position",
            LINE_ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        row.into_sale(items.into_iter().map(SaleLineItem::from).collect())
            .map(Some)
    }

    async fn list_sales(&self, filter: &SaleFilter) -> AppResult<Vec<Sale>> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            r#"
            SELECT {}
            FROM sales
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::date IS NULL OR (created_at AT TIME ZONE 'UTC')::date >= $2)
              AND ($3::date IS NULL OR (created_at AT TIME ZONE 'UTC')::date <= $3)
              AND ($4::text IS NULL
                   OR id::text ILIKE '%' || $4 || '%' ESCAPE '\'
                   OR notes ILIKE '%' || $4 || '%' ESCAPE '\'
                   OR customer_name ILIKE '%' || $4 || '%' ESCAPE '\'
                   OR customer_document ILIKE '%' || $4 || '%' ESCAPE '\')
            ORDER BY created_at DESC
            "#,
            SALE_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.normalized_query().as_deref().map(escape_like))
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, LineItemRow>(&format!(
            "SELECT {} FROM sale_line_items WHERE sale_id = ANY($1) ORDER BY sale_id, position",
            LINE_ITEM_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut items_by_sale: HashMap<Uuid, Vec<SaleLineItem>> = HashMap::new();
        for row in item_rows {
            items_by_sale
                .entry(row.sale_id)
                .or_default()
                .push(SaleLineItem::from(row));
        }

        rows.into_iter()
            .map(|row| {
                let items = items_by_sale.remove(&row.id).unwrap_or_default();
                row.into_sale(items)
            })
            .collect()
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

/// Unit of work over a PostgreSQL transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    async fn insert_items(&mut self, items: &[SaleLineItem], first_position: i32) -> AppResult<()> {
        for (offset, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_line_items (id, sale_id, product_id, quantity, unit_price, subtotal, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id)
            .bind(item.sale_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.subtotal)
            .bind(first_position + offset as i32)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for PgUnitOfWork {
    async fn lock_product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn set_available_quantity(&mut self, id: Uuid, quantity: Decimal) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE products SET available_quantity = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(quantity)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, unit_of_measure, base_price, unit_cost,
                                  available_quantity, expiration_date, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.unit_of_measure.as_str())
        .bind(product.base_price)
        .bind(product.unit_cost)
        .bind(product.available_quantity)
        .bind(product.expiration_date)
        .bind(product.active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "Product"))?;

        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $1, unit_of_measure = $2, base_price = $3, unit_cost = $4,
                expiration_date = $5, active = $6, updated_at = $7
            WHERE id = $8
            "#,
        )
        .bind(&product.name)
        .bind(product.unit_of_measure.as_str())
        .bind(product.base_price)
        .bind(product.unit_cost)
        .bind(product.expiration_date)
        .bind(product.active)
        .bind(product.updated_at)
        .bind(product.id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "Product"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }

    async fn delete_product(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_write_error(e, "Product"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn product_name_taken(&mut self, name: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE LOWER(name) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(taken)
    }

    async fn product_has_sales(&mut self, id: Uuid) -> AppResult<bool> {
        let referenced = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM sale_line_items WHERE product_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(referenced)
    }
}

#[async_trait]
impl SaleRepository for PgUnitOfWork {
    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        let Some(row) = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales WHERE id = $1 FOR UPDATE",
            SALE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, LineItemRow>(&format!(
            "SELECT {} FROM sale_line_items WHERE sale_id = $1 ORDER BY position",
            LINE_ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;

        row.into_sale(items.into_iter().map(SaleLineItem::from).collect())
            .map(Some)
    }

    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (id, customer_name, customer_document, status, total, notes,
                               cancellation_reason, cancelled_at, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(sale.id)
        .bind(&sale.customer_name)
        .bind(&sale.customer_document)
        .bind(sale.status.as_str())
        .bind(sale.total)
        .bind(&sale.notes)
        .bind(&sale.cancellation_reason)
        .bind(sale.cancelled_at)
        .bind(sale.created_at)
        .bind(sale.modified_at)
        .execute(&mut *self.tx)
        .await?;

        self.insert_items(&sale.line_items, 0).await
    }

    async fn update_sale(&mut self, sale: &Sale) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales
            SET customer_name = $1, customer_document = $2, status = $3, total = $4, notes = $5,
                cancellation_reason = $6, cancelled_at = $7, modified_at = $8
            WHERE id = $9
            "#,
        )
        .bind(&sale.customer_name)
        .bind(&sale.customer_document)
        .bind(sale.status.as_str())
        .bind(sale.total)
        .bind(&sale.notes)
        .bind(&sale.cancellation_reason)
        .bind(sale.cancelled_at)
        .bind(sale.modified_at)
        .bind(sale.id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Sale".to_string()));
        }
        Ok(())
    }

    async fn delete_line_items(&mut self, sale_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sale_line_items WHERE sale_id = $1")
            .bind(sale_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_line_items(&mut self, sale_id: Uuid, items: &[SaleLineItem]) -> AppResult<()> {
        let next_position = sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM sale_line_items WHERE sale_id = $1",
        )
        .bind(sale_id)
        .fetch_one(&mut *self.tx)
        .await?;

        self.insert_items(items, next_position).await
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
