//! HTTP handlers

pub mod health;
pub mod products;
pub mod sales;

pub use health::health_check;
pub use products::{
    create_product, delete_product, get_product, list_products, product_margin, update_product,
};
pub use sales::{
    cancel_sale, create_sale, edit_sale, export_sales, get_sale, list_sales, sale_statistics,
};
