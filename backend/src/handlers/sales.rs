//! HTTP handlers for sale endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::{Sale, SaleFilter, SaleStatistics};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::PERMISSION_CANCEL_SALE;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::{
    CancelOutcome, CreateSaleInput, EditSaleInput, ReportingService, SaleService,
};
use crate::AppState;

/// Body of a cancellation request
#[derive(Debug, Deserialize)]
pub struct CancelSaleRequest {
    pub reason: String,
}

/// List sales, newest first
pub async fn list_sales(
    State(state): State<AppState>,
    Query(filter): Query<SaleFilter>,
) -> AppResult<Json<Vec<Sale>>> {
    let service = SaleService::new(state.store);
    let sales = service.list_sales(filter).await?;
    Ok(Json(sales))
}

/// Create a sale
pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<Sale>)> {
    let service = SaleService::new(state.store);
    let sale = service.create_sale(input).await?;
    tracing::debug!("Sale {} recorded by {}", sale.id, current_user.0.user_id);
    Ok((StatusCode::CREATED, Json(sale)))
}

/// Get a sale with its line items
pub async fn get_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<Sale>> {
    let service = SaleService::new(state.store);
    let sale = service.get_sale(sale_id).await?;
    Ok(Json(sale))
}

/// Replace the line items of a sale
pub async fn edit_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
    Json(input): Json<EditSaleInput>,
) -> AppResult<Json<Sale>> {
    let service = SaleService::new(state.store);
    let sale = service.edit_sale(sale_id, input).await?;
    tracing::debug!("Sale {} edited by {}", sale.id, current_user.0.user_id);
    Ok(Json(sale))
}

/// Cancel a sale
pub async fn cancel_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
    Json(request): Json<CancelSaleRequest>,
) -> AppResult<Json<CancelOutcome>> {
    check_permission(&current_user.0, PERMISSION_CANCEL_SALE)?;

    let service = SaleService::new(state.store);
    let outcome = service.cancel_sale(sale_id, &request.reason).await?;
    Ok(Json(outcome))
}

/// Completed sale count and revenue
pub async fn sale_statistics(
    State(state): State<AppState>,
    Query(filter): Query<SaleFilter>,
) -> AppResult<Json<SaleStatistics>> {
    let service = SaleService::new(state.store);
    let stats = service.sale_statistics(filter).await?;
    Ok(Json(stats))
}

/// Export filtered sales as CSV
pub async fn export_sales(
    State(state): State<AppState>,
    Query(filter): Query<SaleFilter>,
) -> AppResult<impl IntoResponse> {
    let service = ReportingService::new(state.store);
    let csv = service.export_sales_csv(filter).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"sales.csv\"",
            ),
        ],
        csv,
    ))
}
