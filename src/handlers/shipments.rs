use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;
use uuid::Uuid;

use super::common::{success_response, PaginatedResponse, PaginationParams};
use crate::{errors::ServiceError, tenant::TenantContext, AppState};

/// List shipments
#[utoipa::path(
    get,
    path = "/api/v1/shipments",
    params(PaginationParams),
    responses(
        (status = 200, description = "Shipments", body = serde_json::Value)
    ),
    tag = "shipments"
)]
pub async fn list_shipments(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let (shipments, total) = state
        .services
        .shipping
        .list(ctx, pagination.page, pagination.per_page)
        .await?;

    Ok(success_response(PaginatedResponse::new(
        shipments,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Fetch one shipment with items
#[utoipa::path(
    get,
    path = "/api/v1/shipments/{id}",
    responses(
        (status = 200, description = "Shipment", body = serde_json::Value),
        (status = 404, description = "Unknown shipment", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn get_shipment(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let (shipment, items) = state.services.shipping.get(ctx, id).await?;
    Ok(success_response(
        json!({ "shipment": shipment, "items": items }),
    ))
}

/// Mark a shipped parcel as delivered
#[utoipa::path(
    post,
    path = "/api/v1/shipments/{id}/deliver",
    responses(
        (status = 200, description = "Shipment delivered", body = serde_json::Value),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn deliver_shipment(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let shipment = state.services.shipping.deliver(ctx, id).await?;
    Ok(success_response(shipment))
}

pub fn shipment_routes() -> Router<AppState> {
    Router::new()
        .route("/shipments", get(list_shipments))
        .route("/shipments/:id", get(get_shipment))
        .route("/shipments/:id/deliver", post(deliver_shipment))
}
