use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{
    created_response, success_response, validate_input, PaginatedResponse, PaginationParams,
};
use crate::{
    errors::ServiceError,
    services::transfers::{NewTransfer, NewTransferItem},
    tenant::TenantContext,
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTransferRequest {
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub reference: String,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<TransferItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct TransferItemRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Pin the source location; otherwise the processor picks the first one
    /// with enough available stock
    pub from_location_id: Option<Uuid>,
    /// Pin the destination; otherwise the first active location of the
    /// target warehouse
    pub to_location_id: Option<Uuid>,
    pub batch: Option<String>,
}

/// Create a pending transfer
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 201, description = "Transfer created", body = serde_json::Value),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateTransferRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let items = payload
        .items
        .into_iter()
        .map(|item| NewTransferItem {
            product_id: item.product_id,
            quantity: item.quantity,
            from_location_id: item.from_location_id,
            to_location_id: item.to_location_id,
            batch: item.batch,
        })
        .collect();

    let transfer = state
        .services
        .transfers
        .create(
            ctx,
            NewTransfer {
                from_warehouse_id: payload.from_warehouse_id,
                to_warehouse_id: payload.to_warehouse_id,
                reference: payload.reference,
                notes: payload.notes,
                items,
            },
        )
        .await?;

    Ok(created_response(transfer))
}

/// List transfers
#[utoipa::path(
    get,
    path = "/api/v1/transfers",
    params(PaginationParams),
    responses(
        (status = 200, description = "Transfers", body = serde_json::Value)
    ),
    tag = "transfers"
)]
pub async fn list_transfers(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let (transfers, total) = state
        .services
        .transfers
        .list(ctx, pagination.page, pagination.per_page)
        .await?;

    Ok(success_response(PaginatedResponse::new(
        transfers,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Fetch one transfer with items
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    responses(
        (status = 200, description = "Transfer", body = serde_json::Value),
        (status = 404, description = "Unknown transfer", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn get_transfer(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let (transfer, items) = state.services.transfers.get(ctx, id).await?;
    Ok(success_response(
        json!({ "transfer": transfer, "items": items }),
    ))
}

/// Process a pending transfer, moving stock between warehouses
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/process",
    responses(
        (status = 200, description = "Transfer completed", body = serde_json::Value),
        (status = 409, description = "Already processed", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn process_transfer(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.services.transfers.process(ctx, id).await?;
    Ok(success_response(transfer))
}

/// Cancel a pending transfer
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/cancel",
    responses(
        (status = 200, description = "Transfer cancelled", body = serde_json::Value),
        (status = 409, description = "Already processed", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn cancel_transfer(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.services.transfers.cancel(ctx, id).await?;
    Ok(success_response(transfer))
}

pub fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/transfers", get(list_transfers).post(create_transfer))
        .route("/transfers/:id", get(get_transfer))
        .route("/transfers/:id/process", post(process_transfer))
        .route("/transfers/:id/cancel", post(cancel_transfer))
}
