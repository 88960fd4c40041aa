//! Product catalog tests
//!
//! Tests for catalog management including:
//! - Unique, trimmed product names
//! - Updates never touch stock
//! - Deletion refused while sales reference the product
//! - Margin over purchase cost

use std::str::FromStr;
use std::sync::Arc;

use pescaderia_backend::repository::{InMemoryStore, Store};
use pescaderia_backend::services::{
    CreateProductInput, CreateSaleInput, ProductService, SaleService, UpdateProductInput,
};
use pescaderia_backend::AppError;
use rust_decimal::Decimal;
use shared::{LineItemInput, ProductFilter, UnitOfMeasure, ValidationError};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn setup() -> (InMemoryStore, ProductService, SaleService) {
    let store = InMemoryStore::new();
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    (
        store,
        ProductService::new(shared.clone()),
        SaleService::new(shared),
    )
}

fn create_input(name: &str, unit: UnitOfMeasure, stock: &str) -> CreateProductInput {
    CreateProductInput {
        name: name.to_string(),
        unit_of_measure: unit,
        base_price: dec("25000"),
        unit_cost: dec("18000"),
        available_quantity: dec(stock),
        expiration_date: None,
        active: None,
    }
}

fn empty_update() -> UpdateProductInput {
    UpdateProductInput {
        name: None,
        unit_of_measure: None,
        base_price: None,
        unit_cost: None,
        expiration_date: None,
        active: None,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_trims_name_and_keeps_stock() {
        let (_store, products, _sales) = setup();
        let product = products
            .create_product(create_input("  Corvina fresca ", UnitOfMeasure::Kilogram, "12.5"))
            .await
            .unwrap();

        assert_eq!(product.name, "Corvina fresca");
        assert_eq!(product.available_quantity, dec("12.5"));
        assert!(product.active);
        assert!(product.is_available());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected_case_insensitively() {
        let (_store, products, _sales) = setup();
        products
            .create_product(create_input("Corvina", UnitOfMeasure::Kilogram, "1"))
            .await
            .unwrap();

        let result = products
            .create_product(create_input("CORVINA", UnitOfMeasure::Kilogram, "1"))
            .await;
        assert!(matches!(result, Err(AppError::DuplicateEntry(_))));
    }

    #[tokio::test]
    async fn test_create_validates_fields() {
        let (_store, products, _sales) = setup();

        let blank = products
            .create_product(create_input("   ", UnitOfMeasure::Kilogram, "1"))
            .await;
        assert!(matches!(
            blank,
            Err(AppError::Validation(ValidationError::Blank { field: "name" }))
        ));

        let mut free = create_input("Pargo", UnitOfMeasure::Kilogram, "1");
        free.base_price = Decimal::ZERO;
        assert!(matches!(
            products.create_product(free).await,
            Err(AppError::Validation(ValidationError::NonPositiveAmount { field: "base_price" }))
        ));

        let negative = products
            .create_product(create_input("Pargo", UnitOfMeasure::Kilogram, "-1"))
            .await;
        assert!(matches!(
            negative,
            Err(AppError::Validation(ValidationError::Negative { .. }))
        ));

        let half_dozen = products
            .create_product(create_input("Ostras", UnitOfMeasure::Dozen, "0.5"))
            .await;
        assert!(half_dozen.is_err());
    }

    #[tokio::test]
    async fn test_update_never_changes_stock() {
        let (store, products, _sales) = setup();
        let product = products
            .create_product(create_input("Corvina", UnitOfMeasure::Kilogram, "7"))
            .await
            .unwrap();

        let mut update = empty_update();
        update.name = Some("Corvina de altura".to_string());
        update.base_price = Some(dec("27000"));
        update.active = Some(false);

        let updated = products.update_product(product.id, update).await.unwrap();
        assert_eq!(updated.name, "Corvina de altura");
        assert_eq!(updated.base_price, dec("27000"));
        assert!(!updated.active);

        let stored = store.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.available_quantity, dec("7"));
        assert!(!stored.is_available());
    }

    #[tokio::test]
    async fn test_update_to_taken_name_rejected() {
        let (_store, products, _sales) = setup();
        products
            .create_product(create_input("Corvina", UnitOfMeasure::Kilogram, "1"))
            .await
            .unwrap();
        let pargo = products
            .create_product(create_input("Pargo", UnitOfMeasure::Kilogram, "1"))
            .await
            .unwrap();

        let mut update = empty_update();
        update.name = Some("corvina".to_string());
        assert!(matches!(
            products.update_product(pargo.id, update).await,
            Err(AppError::DuplicateEntry(_))
        ));

        // Renaming to its own name in another case is fine
        let mut update = empty_update();
        update.name = Some("PARGO".to_string());
        assert!(products.update_product(pargo.id, update).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_refused_while_sales_reference_product() {
        let (store, products, sales) = setup();
        let sold = products
            .create_product(create_input("Corvina", UnitOfMeasure::Kilogram, "10"))
            .await
            .unwrap();
        let unsold = products
            .create_product(create_input("Pargo", UnitOfMeasure::Kilogram, "10"))
            .await
            .unwrap();

        sales
            .create_sale(CreateSaleInput {
                customer_name: None,
                customer_document: None,
                status: None,
                notes: None,
                line_items: vec![LineItemInput {
                    product_id: sold.id,
                    quantity: dec("1"),
                    unit_price: None,
                }],
            })
            .await
            .unwrap();

        assert!(matches!(
            products.delete_product(sold.id).await,
            Err(AppError::Conflict { .. })
        ));
        assert!(store.find_product(sold.id).await.unwrap().is_some());

        products.delete_product(unsold.id).await.unwrap();
        assert!(matches!(
            products.get_product(unsold.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            products.delete_product(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_available_only() {
        let (_store, products, _sales) = setup();
        products
            .create_product(create_input("Corvina", UnitOfMeasure::Kilogram, "3"))
            .await
            .unwrap();
        products
            .create_product(create_input("Bonito", UnitOfMeasure::Kilogram, "0"))
            .await
            .unwrap();
        let mut inactive = create_input("Atún", UnitOfMeasure::Kilogram, "5");
        inactive.active = Some(false);
        products.create_product(inactive).await.unwrap();

        let all = products.list_products(ProductFilter::default()).await.unwrap();
        let names: Vec<&str> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Atún", "Bonito", "Corvina"]);

        let available = products
            .list_products(ProductFilter {
                available_only: true,
                ..ProductFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].name, "Corvina");

        let searched = products
            .list_products(ProductFilter {
                q: Some("bon".to_string()),
                ..ProductFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);
    }

    #[tokio::test]
    async fn test_margin_over_cost() {
        let (_store, products, _sales) = setup();
        let product = products
            .create_product(create_input("Corvina", UnitOfMeasure::Kilogram, "1"))
            .await
            .unwrap();

        let margin = products.product_margin(product.id).await.unwrap();
        assert_eq!(margin.margin_percent, dec("38.89"));
    }
}
