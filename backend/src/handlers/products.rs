//! HTTP handlers for product catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Product, ProductFilter, ProductMargin};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::PERMISSION_DELETE_PRODUCT;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::{CreateProductInput, ProductService, UpdateProductInput};
use crate::AppState;

/// Query parameters for listing products
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub active: Option<bool>,
    /// Only products that can be sold right now
    pub available: Option<bool>,
    pub q: Option<String>,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        ProductFilter {
            active: query.active,
            available_only: query.available.unwrap_or(false),
            q: query.q,
        }
    }
}

/// List products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<Vec<Product>>> {
    let service = ProductService::new(state.store);
    let products = service.list_products(query.into()).await?;
    Ok(Json(products))
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let service = ProductService::new(state.store);
    let product = service.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.store);
    let product = service.get_product(product_id).await?;
    Ok(Json(product))
}

/// Update a product
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.store);
    let product = service.update_product(product_id, input).await?;
    Ok(Json(product))
}

/// Delete a product
pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&current_user.0, PERMISSION_DELETE_PRODUCT)?;

    let service = ProductService::new(state.store);
    service.delete_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Profit margin of a product
pub async fn product_margin(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductMargin>> {
    let service = ProductService::new(state.store);
    let margin = service.product_margin(product_id).await?;
    Ok(Json(margin))
}
