//! Product catalog service

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    margin_percent, validate_product_fields, validate_product_name, validate_stock_quantity,
    Product, ProductFilter, ProductMargin, UnitOfMeasure,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repository::{with_transaction, Store, UnitOfWork};

/// Product service for catalog management
#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn Store>,
}

/// Input for creating a product
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    #[serde(default)]
    pub unit_of_measure: UnitOfMeasure,
    pub base_price: Decimal,
    pub unit_cost: Decimal,
    /// Opening stock
    #[serde(default)]
    pub available_quantity: Decimal,
    pub expiration_date: Option<NaiveDate>,
    pub active: Option<bool>,
}

/// Input for updating a product. Stock is not editable here.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub unit_of_measure: Option<UnitOfMeasure>,
    pub base_price: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
    pub expiration_date: Option<NaiveDate>,
    pub active: Option<bool>,
}

async fn ensure_name_free(
    uow: &mut dyn UnitOfWork,
    name: &str,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    if uow.product_name_taken(name, exclude).await? {
        return Err(AppError::DuplicateEntry("name".to_string()));
    }
    Ok(())
}

async fn create_in_tx(uow: &mut dyn UnitOfWork, product: Product) -> AppResult<Product> {
    ensure_name_free(uow, &product.name, None).await?;
    uow.insert_product(&product).await?;
    Ok(product)
}

async fn update_in_tx(
    uow: &mut dyn UnitOfWork,
    product_id: Uuid,
    input: UpdateProductInput,
) -> AppResult<Product> {
    let mut product = uow
        .lock_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    if let Some(name) = input.name {
        let name = validate_product_name(&name)?;
        ensure_name_free(uow, &name, Some(product_id)).await?;
        product.name = name;
    }
    if let Some(unit) = input.unit_of_measure {
        validate_stock_quantity(product.available_quantity, unit)?;
        product.unit_of_measure = unit;
    }
    product.base_price = input.base_price.unwrap_or(product.base_price);
    product.unit_cost = input.unit_cost.unwrap_or(product.unit_cost);
    validate_product_fields(product.base_price, product.unit_cost)?;
    if input.expiration_date.is_some() {
        product.expiration_date = input.expiration_date;
    }
    product.active = input.active.unwrap_or(product.active);
    product.updated_at = Utc::now();

    uow.update_product(&product).await?;
    Ok(product)
}

async fn delete_in_tx(uow: &mut dyn UnitOfWork, product_id: Uuid) -> AppResult<()> {
    if uow.lock_product(product_id).await?.is_none() {
        return Err(AppError::NotFound("Product".to_string()));
    }
    if uow.product_has_sales(product_id).await? {
        return Err(AppError::Conflict {
            resource: "product".to_string(),
            message: "Product has sales and cannot be deleted; deactivate it instead".to_string(),
            message_es: "El producto tiene ventas y no puede eliminarse; desactívelo".to_string(),
        });
    }
    uow.delete_product(product_id).await?;
    Ok(())
}

impl ProductService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a product with its opening stock
    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        let name = validate_product_name(&input.name)?;
        validate_product_fields(input.base_price, input.unit_cost)?;
        validate_stock_quantity(input.available_quantity, input.unit_of_measure)?;

        let mut product = Product::new(
            name,
            input.unit_of_measure,
            input.base_price,
            input.unit_cost,
            input.available_quantity,
        );
        product.expiration_date = input.expiration_date;
        product.active = input.active.unwrap_or(true);

        let product = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(create_in_tx(uow, product))
        })
        .await?;

        tracing::info!("Product {} created ({})", product.id, product.name);
        Ok(product)
    }

    /// Update descriptive fields of a product
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        let product = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(update_in_tx(uow, product_id, input))
        })
        .await?;

        tracing::info!("Product {} updated", product.id);
        Ok(product)
    }

    pub async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        self.store
            .find_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// List products ordered by name
    pub async fn list_products(&self, filter: ProductFilter) -> AppResult<Vec<Product>> {
        self.store.list_products(&filter).await
    }

    /// Delete a product that no sale references
    pub async fn delete_product(&self, product_id: Uuid) -> AppResult<()> {
        with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(delete_in_tx(uow, product_id))
        })
        .await?;

        tracing::info!("Product {} deleted", product_id);
        Ok(())
    }

    /// Profit margin over purchase cost
    pub async fn product_margin(&self, product_id: Uuid) -> AppResult<ProductMargin> {
        let product = self.get_product(product_id).await?;
        Ok(ProductMargin {
            product_id: product.id,
            base_price: product.base_price,
            unit_cost: product.unit_cost,
            margin_percent: margin_percent(product.base_price, product.unit_cost),
        })
    }
}
