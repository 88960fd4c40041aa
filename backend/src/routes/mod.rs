//! Route definitions for the Pescadería sales backend

use axum::{middleware, routing::get, Router};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - sales
        .nest("/sales", sale_routes(state.clone()))
        // Protected routes - product catalog
        .nest("/products", product_routes(state))
}

/// Sale routes (protected)
fn sale_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/statistics", get(handlers::sale_statistics))
        .route("/export", get(handlers::export_sales))
        .route(
            "/:sale_id",
            get(handlers::get_sale).put(handlers::edit_sale),
        )
        .route("/:sale_id/cancel", axum::routing::post(handlers::cancel_sale))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Product catalog routes (protected)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:product_id/margin", get(handlers::product_margin))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
