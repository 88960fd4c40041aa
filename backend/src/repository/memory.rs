//! In-memory store for tests and local demos
//!
//! A unit of work takes the store's mutex for its whole lifetime and works
//! on a staged copy of the state, so units of work are serialized and a
//! dropped or rolled-back unit leaves nothing behind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{Product, ProductFilter, Sale, SaleFilter, SaleLineItem};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{ProductRepository, SaleRepository, Store, UnitOfWork};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: HashMap<Uuid, Product>,
    sales: HashMap<Uuid, Sale>,
}

/// Store backed by process memory
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product directly, bypassing any unit of work
    pub async fn seed_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn sale_count(&self) -> usize {
        self.state.lock().await.sales.len()
    }
}

fn matches_sale(sale: &Sale, filter: &SaleFilter, query: Option<&str>) -> bool {
    if filter.status.is_some_and(|status| sale.status != status) {
        return false;
    }
    let created = sale.created_at.date_naive();
    if filter.from.is_some_and(|from| created < from) {
        return false;
    }
    if filter.to.is_some_and(|to| created > to) {
        return false;
    }
    match query {
        None => true,
        Some(q) => {
            let contains = |value: Option<&String>| {
                value.is_some_and(|v| v.to_lowercase().contains(q))
            };
            sale.id.to_string().contains(q)
                || contains(sale.notes.as_ref())
                || contains(sale.customer_name.as_ref())
                || contains(sale.customer_document.as_ref())
        }
    }
}

fn matches_product(product: &Product, filter: &ProductFilter, query: Option<&str>) -> bool {
    if filter.active.is_some_and(|active| product.active != active) {
        return false;
    }
    if filter.available_only && !product.is_available() {
        return false;
    }
    query.map_or(true, |q| product.name.to_lowercase().contains(q))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, staged }))
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> AppResult<Vec<Product>> {
        let query = filter.normalized_query();
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| matches_product(p, filter, query.as_deref()))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn find_sale(&self, id: Uuid) -> AppResult<Option<Sale>> {
        Ok(self.state.lock().await.sales.get(&id).cloned())
    }

    async fn list_sales(&self, filter: &SaleFilter) -> AppResult<Vec<Sale>> {
        let query = filter.normalized_query();
        let state = self.state.lock().await;
        let mut sales: Vec<Sale> = state
            .sales
            .values()
            .filter(|s| matches_sale(s, filter, query.as_deref()))
            .cloned()
            .collect();
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sales)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Unit of work over a staged copy of the in-memory state
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

impl MemoryUnitOfWork {
    fn sale_mut(&mut self, id: Uuid) -> AppResult<&mut Sale> {
        self.staged
            .sales
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))
    }
}

#[async_trait]
impl ProductRepository for MemoryUnitOfWork {
    async fn lock_product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn set_available_quantity(&mut self, id: Uuid, quantity: Decimal) -> AppResult<()> {
        let product = self
            .staged
            .products
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        product.available_quantity = quantity;
        Ok(())
    }

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        self.staged.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        let stored = self
            .staged
            .products
            .get_mut(&product.id)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        let available_quantity = stored.available_quantity;
        *stored = Product {
            available_quantity,
            ..product.clone()
        };
        Ok(())
    }

    async fn delete_product(&mut self, id: Uuid) -> AppResult<bool> {
        Ok(self.staged.products.remove(&id).is_some())
    }

    async fn product_name_taken(&mut self, name: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let name = name.to_lowercase();
        Ok(self
            .staged
            .products
            .values()
            .any(|p| Some(p.id) != exclude && p.name.to_lowercase() == name))
    }

    async fn product_has_sales(&mut self, id: Uuid) -> AppResult<bool> {
        Ok(self
            .staged
            .sales
            .values()
            .flat_map(|s| s.line_items.iter())
            .any(|item| item.product_id == id))
    }
}

#[async_trait]
impl SaleRepository for MemoryUnitOfWork {
    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        Ok(self.staged.sales.get(&id).cloned())
    }

    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()> {
        self.staged.sales.insert(sale.id, sale.clone());
        Ok(())
    }

    async fn update_sale(&mut self, sale: &Sale) -> AppResult<()> {
        let stored = self.sale_mut(sale.id)?;
        let line_items = std::mem::take(&mut stored.line_items);
        *stored = Sale {
            line_items,
            ..sale.clone()
        };
        Ok(())
    }

    async fn delete_line_items(&mut self, sale_id: Uuid) -> AppResult<u64> {
        let stored = self.sale_mut(sale_id)?;
        let removed = stored.line_items.len() as u64;
        stored.line_items.clear();
        Ok(removed)
    }

    async fn insert_line_items(&mut self, sale_id: Uuid, items: &[SaleLineItem]) -> AppResult<()> {
        let stored = self.sale_mut(sale_id)?;
        stored.line_items.extend_from_slice(items);
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
