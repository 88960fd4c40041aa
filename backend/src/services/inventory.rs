//! Inventory adjustment for products touched by a sale
//!
//! Every function here runs inside a caller-owned unit of work and locks the
//! product row before reading its stock. Nothing outside the sale lifecycle
//! should call these directly.
//!
//! A transaction that touches several products must call [`lock_products`]
//! first, so every writer takes its product locks in ascending id order.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use shared::{validate_quantity_for_unit, LineItemInput, Product, SaleLineItem, ValidationError};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repository::UnitOfWork;

async fn lock(uow: &mut dyn UnitOfWork, product_id: Uuid) -> AppResult<Product> {
    uow.lock_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

/// Lock every product in `ids` in ascending id order, each row once.
/// Later [`reserve`] and [`release`] calls re-read rows this transaction
/// already holds.
pub async fn lock_products(
    uow: &mut dyn UnitOfWork,
    ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<Vec<Product>> {
    let ordered: BTreeSet<Uuid> = ids.into_iter().collect();
    let mut products = Vec::with_capacity(ordered.len());
    for id in ordered {
        products.push(lock(uow, id).await?);
    }
    Ok(products)
}

/// Apply `delta` to an already locked product. `line` is the 1-based sale
/// line being applied, when there is one.
async fn apply(
    uow: &mut dyn UnitOfWork,
    mut product: Product,
    delta: Decimal,
    line: Option<usize>,
) -> AppResult<Product> {
    if delta < Decimal::ZERO && !product.active {
        return Err(ValidationError::InactiveProduct {
            line: line.unwrap_or(0),
        }
        .into());
    }

    let updated = product
        .available_quantity
        .checked_add(delta)
        .ok_or(ValidationError::AmountOverflow {
            field: "available_quantity",
        })?;
    if updated < Decimal::ZERO {
        tracing::warn!(
            "Rejected stock change for {}: requested {}, available {}",
            product.id,
            -delta,
            product.available_quantity
        );
        return Err(AppError::InsufficientStock {
            product: product.name,
            requested: -delta,
            available: product.available_quantity,
        });
    }

    uow.set_available_quantity(product.id, updated).await?;
    tracing::debug!(
        "Stock of {} moved {} -> {}",
        product.id,
        product.available_quantity,
        updated
    );

    product.available_quantity = updated;
    Ok(product)
}

/// Add `delta` (negative to take stock) to a product's available quantity.
/// Fails without writing when the result would be negative.
pub async fn adjust(
    uow: &mut dyn UnitOfWork,
    product_id: Uuid,
    delta: Decimal,
) -> AppResult<Product> {
    let product = lock(uow, product_id).await?;
    apply(uow, product, delta, None).await
}

/// Take stock for one requested sale line and return the product as it is
/// after the decrement.
pub async fn reserve(
    uow: &mut dyn UnitOfWork,
    line: usize,
    item: &LineItemInput,
) -> AppResult<Product> {
    let product = lock(uow, item.product_id).await?;
    validate_quantity_for_unit(line, item.quantity, product.unit_of_measure)?;
    apply(uow, product, -item.quantity, Some(line)).await
}

/// Put back the stock a persisted line item took. Always allowed, even for
/// products deactivated since the sale.
pub async fn release(uow: &mut dyn UnitOfWork, item: &SaleLineItem) -> AppResult<Product> {
    let product = lock(uow, item.product_id).await?;
    apply(uow, product, item.quantity, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{with_transaction, InMemoryStore, Store};
    use shared::UnitOfMeasure;

    async fn store_with(product: Product) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed_product(product).await;
        store
    }

    fn fish(qty: i64) -> Product {
        Product::new(
            "Corvina",
            UnitOfMeasure::Kilogram,
            Decimal::new(25, 0),
            Decimal::new(18, 0),
            Decimal::new(qty, 0),
        )
    }

    async fn stock(store: &InMemoryStore, id: Uuid) -> Decimal {
        store
            .find_product(id)
            .await
            .unwrap()
            .unwrap()
            .available_quantity
    }

    #[tokio::test]
    async fn test_adjust_decrements_and_increments() {
        let product = fish(10);
        let id = product.id;
        let store = store_with(product).await;

        let updated = with_transaction(&store, move |uow| {
            Box::pin(async move { adjust(uow, id, Decimal::new(-4, 0)).await })
        })
        .await
        .unwrap();
        assert_eq!(updated.available_quantity, Decimal::new(6, 0));

        with_transaction(&store, move |uow| {
            Box::pin(async move { adjust(uow, id, Decimal::new(4, 0)).await })
        })
        .await
        .unwrap();
        assert_eq!(stock(&store, id).await, Decimal::new(10, 0));
    }

    #[tokio::test]
    async fn test_taking_exact_stock_leaves_zero() {
        let product = fish(10);
        let id = product.id;
        let store = store_with(product).await;

        let updated = with_transaction(&store, move |uow| {
            Box::pin(async move { adjust(uow, id, Decimal::new(-10, 0)).await })
        })
        .await
        .unwrap();
        assert_eq!(updated.available_quantity, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_overdraw_is_rejected_without_writing() {
        let product = fish(10);
        let id = product.id;
        let store = store_with(product).await;

        let result = with_transaction(&store, move |uow| {
            Box::pin(async move { adjust(uow, id, Decimal::new(-11, 0)).await })
        })
        .await;

        match result {
            Err(AppError::InsufficientStock {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, Decimal::new(11, 0));
                assert_eq!(available, Decimal::new(10, 0));
            }
            other => panic!("expected insufficient stock, got {:?}", other),
        }
        assert_eq!(stock(&store, id).await, Decimal::new(10, 0));
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let store = InMemoryStore::new();
        let result = with_transaction(&store, |uow| {
            Box::pin(async move { adjust(uow, Uuid::new_v4(), Decimal::ONE).await })
        })
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_inactive_product_can_be_released_but_not_reserved() {
        let mut product = fish(10);
        product.active = false;
        let id = product.id;
        let store = store_with(product).await;

        let reserve_result = with_transaction(&store, move |uow| {
            Box::pin(async move {
                let item = LineItemInput {
                    product_id: id,
                    quantity: Decimal::ONE,
                    unit_price: None,
                };
                reserve(uow, 1, &item).await
            })
        })
        .await;
        assert!(matches!(
            reserve_result,
            Err(AppError::Validation(ValidationError::InactiveProduct { line: 1 }))
        ));

        let item =
            SaleLineItem::new(Uuid::new_v4(), id, Decimal::new(3, 0), Decimal::ONE).unwrap();
        with_transaction(&store, move |uow| {
            Box::pin(async move { release(uow, &item).await })
        })
        .await
        .unwrap();
        assert_eq!(stock(&store, id).await, Decimal::new(13, 0));
    }

    #[tokio::test]
    async fn test_counted_units_reject_fractions() {
        let mut product = fish(10);
        product.unit_of_measure = UnitOfMeasure::Dozen;
        let id = product.id;
        let store = store_with(product).await;

        let result = with_transaction(&store, move |uow| {
            Box::pin(async move {
                let item = LineItemInput {
                    product_id: id,
                    quantity: Decimal::new(15, 1),
                    unit_price: None,
                };
                reserve(uow, 2, &item).await
            })
        })
        .await;
        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::FractionalQuantity { line: 2, .. }))
        ));
        assert_eq!(stock(&store, id).await, Decimal::new(10, 0));
    }

    #[tokio::test]
    async fn test_lock_products_orders_and_dedups_ids() {
        let a = fish(1);
        let b = fish(2);
        let (a_id, b_id) = (a.id, b.id);
        let store = store_with(a).await;
        store.seed_product(b).await;

        let locked = with_transaction(&store, move |uow| {
            Box::pin(async move { lock_products(uow, vec![b_id, a_id, b_id]).await })
        })
        .await
        .unwrap();

        let mut expected = vec![a_id, b_id];
        expected.sort();
        let ids: Vec<Uuid> = locked.iter().map(|p| p.id).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_lock_products_fails_on_unknown_id() {
        let product = fish(1);
        let id = product.id;
        let store = store_with(product).await;

        let result = with_transaction(&store, move |uow| {
            Box::pin(async move { lock_products(uow, vec![id, Uuid::new_v4()]).await })
        })
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stock_overflow_is_rejected() {
        let mut product = fish(0);
        product.available_quantity = Decimal::MAX;
        let id = product.id;
        let store = store_with(product).await;

        let result = with_transaction(&store, move |uow| {
            Box::pin(async move { adjust(uow, id, Decimal::ONE).await })
        })
        .await;
        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::AmountOverflow { .. }))
        ));
        assert_eq!(stock(&store, id).await, Decimal::MAX);
    }
}
