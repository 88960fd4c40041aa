//! Storage seam for products and sales
//!
//! Services never talk to a database directly. Writes go through a
//! [`UnitOfWork`] obtained from a [`Store`]; reads that need no atomicity go
//! through the store itself. Two backends exist: PostgreSQL for production
//! and an in-memory store used by tests and local demos.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{Product, ProductFilter, Sale, SaleFilter, SaleLineItem};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Product writes and locked reads inside a unit of work
#[async_trait]
pub trait ProductRepository: Send {
    /// Fetch a product and hold it against concurrent writers until the
    /// unit of work ends.
    async fn lock_product(&mut self, id: Uuid) -> AppResult<Option<Product>>;

    async fn set_available_quantity(&mut self, id: Uuid, quantity: Decimal) -> AppResult<()>;

    async fn insert_product(&mut self, product: &Product) -> AppResult<()>;

    /// Persist descriptive fields; `available_quantity` is left untouched
    async fn update_product(&mut self, product: &Product) -> AppResult<()>;

    async fn delete_product(&mut self, id: Uuid) -> AppResult<bool>;

    /// Case-insensitive name lookup, ignoring `exclude`
    async fn product_name_taken(&mut self, name: &str, exclude: Option<Uuid>) -> AppResult<bool>;

    /// Whether any sale line references the product
    async fn product_has_sales(&mut self, id: Uuid) -> AppResult<bool>;
}

/// Sale writes and locked reads inside a unit of work
#[async_trait]
pub trait SaleRepository: Send {
    /// Fetch a sale with its line items and lock its header row
    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>>;

    /// Insert the header and every line item of a new sale
    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()>;

    /// Persist header fields (status, total, notes, customer, cancellation)
    async fn update_sale(&mut self, sale: &Sale) -> AppResult<()>;

    async fn delete_line_items(&mut self, sale_id: Uuid) -> AppResult<u64>;

    /// Append line items to an existing sale, keeping the given order
    async fn insert_line_items(&mut self, sale_id: Uuid, items: &[SaleLineItem]) -> AppResult<()>;
}

/// An open transaction. Dropping it without `commit` discards every write.
#[async_trait]
pub trait UnitOfWork: ProductRepository + SaleRepository + Send {
    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Transaction factory plus side-effect free queries
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>>;

    async fn list_products(&self, filter: &ProductFilter) -> AppResult<Vec<Product>>;

    async fn find_sale(&self, id: Uuid) -> AppResult<Option<Sale>>;

    /// Newest first
    async fn list_sales(&self, filter: &SaleFilter) -> AppResult<Vec<Sale>>;

    /// Connectivity check used by the health endpoint
    async fn ping(&self) -> AppResult<()>;
}

/// Future returned by the body of [`with_transaction`]
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 't>>;

/// Run `work` inside one unit of work: commit when it returns `Ok`, roll
/// back when it returns `Err`.
pub async fn with_transaction<T, F>(store: &dyn Store, work: F) -> AppResult<T>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn UnitOfWork) -> TxFuture<'t, T> + Send,
{
    let mut uow = store.begin().await?;
    let result = work(uow.as_mut()).await;

    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::error!("Rollback failed after {:?}: {:?}", err, rollback_err);
            }
            Err(err)
        }
    }
}
